//! Expression compilation.
//!
//! The compiler lowers planner `Expr` trees into `CompiledExpr` trees the
//! evaluation context can interpret directly. All name resolution that can
//! fail at plan time fails here: unknown functions, unsupported cast
//! targets, and unsupported interval units are rejected before any row is
//! read.

use hashbrown::HashMap;

use strata_core::Value;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{CompileError, EvalError};

/// Built-in functions known to the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Pow,
}

impl Builtin {
    /// Returns true for functions that reduce a range of rows to one
    /// value.
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Builtin::Pow)
    }

    /// Reduces a column of values to a single aggregate value.
    ///
    /// Null values do not contribute: COUNT counts non-null values, SUM
    /// skips nulls (an empty or all-null input sums to `Int(0)`), and
    /// AVG/MIN/MAX of no non-null values is Null. An integer SUM that
    /// exceeds the `i64` range is an error, like the rest of the
    /// integer arithmetic.
    pub fn reduce(&self, values: &[Value]) -> Result<Value, EvalError> {
        match self {
            Builtin::Count => {
                let n = values.iter().filter(|v| !v.is_null()).count();
                Ok(Value::Int(n as i64))
            }
            Builtin::Sum => {
                let mut int_sum: i64 = 0;
                let mut float_sum: f64 = 0.0;
                let mut all_int = true;
                for value in values {
                    match value {
                        Value::Null => {}
                        Value::Int(v) => {
                            int_sum = int_sum.checked_add(*v).ok_or_else(|| {
                                EvalError::TypeMismatch("integer overflow in SUM".to_string())
                            })?;
                            float_sum += *v as f64;
                        }
                        Value::Float(v) => {
                            all_int = false;
                            float_sum += v;
                        }
                        other => {
                            return Err(EvalError::TypeMismatch(format!(
                                "SUM over non-numeric value {other}"
                            )))
                        }
                    }
                }
                if all_int {
                    Ok(Value::Int(int_sum))
                } else {
                    Ok(Value::Float(float_sum))
                }
            }
            Builtin::Avg => {
                let mut mean = 0.0;
                let mut count = 0u64;
                for value in values {
                    let v = match value {
                        Value::Null => continue,
                        Value::Int(v) => *v as f64,
                        Value::Float(v) => *v,
                        other => {
                            return Err(EvalError::TypeMismatch(format!(
                                "AVG over non-numeric value {other}"
                            )))
                        }
                    };
                    count += 1;
                    mean += (v - mean) / count as f64;
                }
                if count == 0 {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Float(mean))
                }
            }
            Builtin::Min => Ok(values
                .iter()
                .filter(|v| !v.is_null())
                .min()
                .cloned()
                .unwrap_or(Value::Null)),
            Builtin::Max => Ok(values
                .iter()
                .filter(|v| !v.is_null())
                .max()
                .cloned()
                .unwrap_or(Value::Null)),
            Builtin::Pow => Err(EvalError::TypeMismatch(
                "POW is not an aggregate".to_string(),
            )),
        }
    }
}

/// Registry mapping function names to built-ins. Lookup is
/// case-insensitive. An empty registry (`new`/`default`) accepts no
/// functions at all; `standard` provides the built-ins.
#[derive(Clone, Debug, Default)]
pub struct Functions {
    by_name: HashMap<String, Builtin>,
}

impl Functions {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Functions {
            by_name: HashMap::new(),
        }
    }

    /// Creates a registry with the standard built-ins.
    pub fn standard() -> Self {
        let mut functions = Functions::new();
        functions.register("SUM", Builtin::Sum);
        functions.register("AVG", Builtin::Avg);
        functions.register("COUNT", Builtin::Count);
        functions.register("MIN", Builtin::Min);
        functions.register("MAX", Builtin::Max);
        functions.register("POW", Builtin::Pow);
        functions.register("POWER", Builtin::Pow);
        functions
    }

    /// Registers a function under the given name.
    pub fn register(&mut self, name: &str, builtin: Builtin) {
        self.by_name.insert(name.to_uppercase(), builtin);
    }

    /// Looks up a function by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Builtin> {
        self.by_name.get(&name.to_uppercase()).copied()
    }
}

/// A compiled expression, interpreted against an evaluation context.
#[derive(Clone, Debug)]
pub enum CompiledExpr {
    /// Read a column from a bound table.
    Column { table: String, column: String },
    /// Constant value.
    Literal(Value),
    /// Binary operation.
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    /// Logical negation.
    Not(Box<CompiledExpr>),
    /// Arithmetic negation.
    Neg(Box<CompiledExpr>),
    /// LIKE pattern match.
    Like {
        expr: Box<CompiledExpr>,
        pattern: String,
    },
    /// CAST to date.
    CastDate(Box<CompiledExpr>),
    /// Interval of whole or fractional days.
    IntervalDays(Box<CompiledExpr>),
    /// Descending sort key marker.
    Desc(Box<CompiledExpr>),
    /// Function call. `name` is kept for error messages.
    Call {
        func: Builtin,
        name: String,
        args: Vec<CompiledExpr>,
    },
}

/// Compiles planner expressions against a function registry.
#[derive(Clone, Debug)]
pub struct Compiler {
    functions: Functions,
}

impl Compiler {
    /// Creates a compiler with the given function registry.
    pub fn new(functions: Functions) -> Self {
        Compiler { functions }
    }

    /// Compiles an expression tree.
    pub fn compile(&self, expr: &Expr) -> Result<CompiledExpr, CompileError> {
        match expr {
            Expr::Column { table, name } => Ok(CompiledExpr::Column {
                table: table.clone(),
                column: name.clone(),
            }),
            Expr::Literal(value) => Ok(CompiledExpr::Literal(value.clone())),
            Expr::Binary { op, left, right } => Ok(CompiledExpr::Binary {
                op: *op,
                left: Box::new(self.compile(left)?),
                right: Box::new(self.compile(right)?),
            }),
            Expr::Unary { op, expr } => {
                let inner = Box::new(self.compile(expr)?);
                Ok(match op {
                    UnaryOp::Not => CompiledExpr::Not(inner),
                    UnaryOp::Neg => CompiledExpr::Neg(inner),
                })
            }
            Expr::Cast { expr, to } => {
                if to.eq_ignore_ascii_case("date") {
                    Ok(CompiledExpr::CastDate(Box::new(self.compile(expr)?)))
                } else {
                    Err(CompileError::UnsupportedCast(to.clone()))
                }
            }
            Expr::Interval { value, unit } => {
                if unit.eq_ignore_ascii_case("day") || unit.eq_ignore_ascii_case("days") {
                    Ok(CompiledExpr::IntervalDays(Box::new(self.compile(value)?)))
                } else {
                    Err(CompileError::UnsupportedInterval(unit.clone()))
                }
            }
            Expr::Like { expr, pattern } => Ok(CompiledExpr::Like {
                expr: Box::new(self.compile(expr)?),
                pattern: pattern.clone(),
            }),
            Expr::Ordered { expr, desc } => {
                let inner = self.compile(expr)?;
                if *desc {
                    Ok(CompiledExpr::Desc(Box::new(inner)))
                } else {
                    Ok(inner)
                }
            }
            Expr::Call { name, args } => {
                let func = self
                    .functions
                    .get(name)
                    .ok_or_else(|| CompileError::UnknownFunction(name.clone()))?;
                let args = args
                    .iter()
                    .map(|arg| self.compile(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledExpr::Call {
                    func,
                    name: name.clone(),
                    args,
                })
            }
            // A bare star only survives planning inside COUNT(*); it
            // counts rows, so any non-null constant serves.
            Expr::Star => Ok(CompiledExpr::Literal(Value::Int(1))),
            Expr::Alias { expr, .. } => self.compile(expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiler() -> Compiler {
        Compiler::new(Functions::standard())
    }

    #[test]
    fn test_compile_column_and_literal() {
        let compiled = compiler().compile(&Expr::column("t", "a")).unwrap();
        match compiled {
            CompiledExpr::Column { table, column } => {
                assert_eq!(table, "t");
                assert_eq!(column, "a");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_registry_knows_nothing() {
        assert!(Functions::new().get("SUM").is_none());
        assert!(Functions::default().get("SUM").is_none());
        assert_eq!(Functions::standard().get("sum"), Some(Builtin::Sum));
    }

    #[test]
    fn test_compile_rejects_unknown_function() {
        let err = compiler()
            .compile(&Expr::call("FROBNICATE", vec![]))
            .unwrap_err();
        assert_eq!(err, CompileError::UnknownFunction("FROBNICATE".into()));
    }

    #[test]
    fn test_compile_cast() {
        assert!(compiler()
            .compile(&Expr::column("t", "a").cast("DATE"))
            .is_ok());
        let err = compiler()
            .compile(&Expr::column("t", "a").cast("decimal"))
            .unwrap_err();
        assert_eq!(err, CompileError::UnsupportedCast("decimal".into()));
    }

    #[test]
    fn test_compile_interval_unit() {
        assert!(compiler()
            .compile(&Expr::interval(Expr::literal(3i64), "DAY"))
            .is_ok());
        let err = compiler()
            .compile(&Expr::interval(Expr::literal(3i64), "month"))
            .unwrap_err();
        assert_eq!(err, CompileError::UnsupportedInterval("month".into()));
    }

    #[test]
    fn test_compile_ordered_desc() {
        let compiled = compiler().compile(&Expr::column("t", "a").desc()).unwrap();
        assert!(matches!(compiled, CompiledExpr::Desc(_)));
        let compiled = compiler().compile(&Expr::column("t", "a").asc()).unwrap();
        assert!(matches!(compiled, CompiledExpr::Column { .. }));
    }

    #[test]
    fn test_compile_star_counts_rows() {
        let compiled = compiler().compile(&Expr::Star).unwrap();
        assert!(matches!(compiled, CompiledExpr::Literal(Value::Int(1))));
    }

    #[test]
    fn test_sum_reduce() {
        let out = Builtin::Sum
            .reduce(&[Value::Int(1), Value::Null, Value::Int(2)])
            .unwrap();
        assert_eq!(out, Value::Int(3));

        let out = Builtin::Sum
            .reduce(&[Value::Int(1), Value::Float(0.5)])
            .unwrap();
        assert_eq!(out, Value::Float(1.5));

        assert_eq!(Builtin::Sum.reduce(&[]).unwrap(), Value::Int(0));
        assert_eq!(Builtin::Sum.reduce(&[Value::Null]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_sum_overflow_is_an_error() {
        let err = Builtin::Sum
            .reduce(&[Value::Int(i64::MAX), Value::Int(1)])
            .unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch(_)));
    }

    #[test]
    fn test_count_reduce_skips_nulls() {
        let out = Builtin::Count
            .reduce(&[Value::Int(1), Value::Null, Value::from("x")])
            .unwrap();
        assert_eq!(out, Value::Int(2));
    }

    #[test]
    fn test_avg_reduce() {
        let out = Builtin::Avg
            .reduce(&[Value::Int(1), Value::Int(2), Value::Null])
            .unwrap();
        assert_eq!(out, Value::Float(1.5));
        assert_eq!(Builtin::Avg.reduce(&[]).unwrap(), Value::Null);
    }

    #[test]
    fn test_min_max_reduce() {
        let values = [Value::Int(3), Value::Null, Value::Int(1), Value::Int(2)];
        assert_eq!(Builtin::Min.reduce(&values).unwrap(), Value::Int(1));
        assert_eq!(Builtin::Max.reduce(&values).unwrap(), Value::Int(3));
        assert_eq!(Builtin::Min.reduce(&[Value::Null]).unwrap(), Value::Null);
    }
}
