//! Error types for plan validation, expression compilation, and execution.

use thiserror::Error;

/// Result type alias for executor operations.
pub type ExecResult<T> = core::result::Result<T, ExecError>;

/// Errors raised while building or validating a plan DAG.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A step name was registered twice.
    #[error("duplicate step name: {0}")]
    DuplicateStep(String),
    /// A step depends on a name no step produces.
    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },
    /// The dependency graph contains a cycle through the named step.
    #[error("plan contains a cycle through step {0}")]
    Cycle(String),
    /// The requested root step does not exist.
    #[error("unknown root step: {0}")]
    UnknownRoot(String),
    /// An inner join was declared without a join condition.
    #[error("step {step} joins {table} without a condition")]
    MissingJoinCondition { step: String, table: String },
}

/// Errors raised while compiling an expression.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CompileError {
    /// CAST to a type the executor does not support.
    #[error("unsupported cast target: {0}")]
    UnsupportedCast(String),
    /// INTERVAL with a unit the executor does not support.
    #[error("unsupported interval unit: {0}")]
    UnsupportedInterval(String),
    /// Call to a function not present in the registry.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

/// Errors raised while evaluating a compiled expression or reading the
/// evaluation context.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvalError {
    /// No table with this name is bound in the context.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// The bound table has no such column.
    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: String, column: String },
    /// A column was read before a row or range was selected on its table.
    #[error("no row or range selected on table {0}")]
    ModeNotSet(String),
    /// A row or range position is outside the table.
    #[error("position {position} out of range for table {table} with {rows} rows")]
    PositionOutOfRange {
        table: String,
        position: usize,
        rows: usize,
    },
    /// An operation needed a bound table but the context holds none.
    #[error("evaluation context holds no tables")]
    EmptyContext,
    /// An aggregate was called on a single row instead of a range.
    #[error("{function} requires a range of rows")]
    NotASequence { function: String },
    /// Operand types do not fit the operator.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A string could not be parsed as a date.
    #[error("invalid date: {0}")]
    BadDate(String),
}

/// Top-level executor error.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Table(#[from] strata_core::Error),
    /// A table source failed to produce a table.
    #[error("source error: {0}")]
    Source(String),
    /// An error that occurred while executing a named plan node.
    #[error("in step {node}: {source}")]
    AtNode {
        node: String,
        #[source]
        source: Box<ExecError>,
    },
}

impl ExecError {
    /// Wraps this error with the plan node it occurred in. Already
    /// attributed errors keep their original node.
    pub fn at_node(self, node: &str) -> Self {
        match self {
            ExecError::AtNode { .. } => self,
            other => ExecError::AtNode {
                node: node.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::UnknownDependency {
            step: "join".into(),
            dependency: "missing".into(),
        };
        assert_eq!(err.to_string(), "step join depends on unknown step missing");
    }

    #[test]
    fn test_at_node_wraps_once() {
        let err = ExecError::from(EvalError::DivisionByZero).at_node("scan");
        let err = err.at_node("outer");
        match err {
            ExecError::AtNode { node, .. } => assert_eq!(node, "scan"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_eval_error_display() {
        let err = EvalError::UnknownColumn {
            table: "t".into(),
            column: "x".into(),
        };
        assert_eq!(err.to_string(), "unknown column t.x");
    }
}
