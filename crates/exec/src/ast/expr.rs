//! Expression AST node and builder methods.
//!
//! Expressions arrive from a planner fully qualified: every column
//! reference names both its table and its column. The executor never
//! resolves bare column names.

use strata_core::Value;

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Column reference, qualified by table name.
    Column { table: String, name: String },
    /// Literal value.
    Literal(Value),
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation.
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// CAST expression; the target type is carried as written.
    Cast { expr: Box<Expr>, to: String },
    /// INTERVAL literal with a unit.
    Interval { value: Box<Expr>, unit: String },
    /// LIKE pattern match.
    Like { expr: Box<Expr>, pattern: String },
    /// Sort direction wrapper used in sort and join keys.
    Ordered { expr: Box<Expr>, desc: bool },
    /// Function call, aggregate or scalar.
    Call { name: String, args: Vec<Expr> },
    /// `*` projection placeholder.
    Star,
    /// Aliased expression; the alias names the output column.
    Alias { expr: Box<Expr>, name: String },
}

impl Expr {
    /// Creates a qualified column reference.
    pub fn column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::Column {
            table: table.into(),
            name: name.into(),
        }
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Eq, self, other)
    }

    pub fn ne(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Ne, self, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, self, other)
    }

    pub fn le(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Le, self, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, self, other)
    }

    pub fn ge(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Ge, self, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Or, self, other)
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Add, self, other)
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Sub, self, other)
    }

    pub fn mul(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Mul, self, other)
    }

    pub fn div(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::Div, self, other)
    }

    pub fn not(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(self),
        }
    }

    pub fn neg(self) -> Self {
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(self),
        }
    }

    /// Wraps this expression in a CAST to the named type.
    pub fn cast(self, to: impl Into<String>) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to: to.into(),
        }
    }

    /// Creates an interval literal with the given unit.
    pub fn interval(value: Expr, unit: impl Into<String>) -> Self {
        Expr::Interval {
            value: Box::new(value),
            unit: unit.into(),
        }
    }

    /// Wraps this expression in a LIKE match against `pattern`.
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
        }
    }

    /// Marks this expression as an ascending sort key.
    pub fn asc(self) -> Self {
        Expr::Ordered {
            expr: Box::new(self),
            desc: false,
        }
    }

    /// Marks this expression as a descending sort key.
    pub fn desc(self) -> Self {
        Expr::Ordered {
            expr: Box::new(self),
            desc: true,
        }
    }

    /// Creates a function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn sum(arg: Expr) -> Self {
        Expr::call("SUM", vec![arg])
    }

    pub fn avg(arg: Expr) -> Self {
        Expr::call("AVG", vec![arg])
    }

    pub fn count(arg: Expr) -> Self {
        Expr::call("COUNT", vec![arg])
    }

    pub fn min(arg: Expr) -> Self {
        Expr::call("MIN", vec![arg])
    }

    pub fn max(arg: Expr) -> Self {
        Expr::call("MAX", vec![arg])
    }

    /// Gives this expression an output alias.
    pub fn alias(self, name: impl Into<String>) -> Self {
        Expr::Alias {
            expr: Box::new(self),
            name: name.into(),
        }
    }

    /// Returns the output name of this expression: the alias if present,
    /// the column name for bare column references, looking through sort
    /// direction wrappers.
    pub fn alias_or_name(&self) -> Option<&str> {
        match self {
            Expr::Alias { name, .. } => Some(name),
            Expr::Column { name, .. } => Some(name),
            Expr::Ordered { expr, .. } => expr.alias_or_name(),
            _ => None,
        }
    }

    /// Splits a conjunction into its AND-ed parts. A non-AND expression
    /// yields itself.
    pub fn flatten_and(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let mut parts = left.flatten_and();
                parts.extend(right.flatten_and());
                parts
            }
            other => vec![other],
        }
    }

    /// Collects every column reference in this expression, in source
    /// order.
    pub fn find_columns(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<(&'a str, &'a str)>) {
        match self {
            Expr::Column { table, name } => out.push((table, name)),
            Expr::Literal(_) | Expr::Star => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Unary { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::Like { expr, .. }
            | Expr::Ordered { expr, .. }
            | Expr::Alias { expr, .. } => expr.collect_columns(out),
            Expr::Interval { value, .. } => value.collect_columns(out),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}
