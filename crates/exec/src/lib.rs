//! Strata Exec - physical plan executor for the strata query engine.
//!
//! This crate takes a DAG of physical plan steps and runs it over
//! columnar tables:
//!
//! - `ast`: expression AST produced by a planner
//! - `compile`: expression compiler and built-in function registry
//! - `plan`: plan steps, plan nodes, and the validating plan builder
//! - `context`: evaluation context binding tables for expression evaluation
//! - `executor`: the scheduler and the scan/join/aggregate/sort operators
//!
//! # Example
//!
//! ```rust
//! use strata_core::Value;
//! use strata_exec::ast::Expr;
//! use strata_exec::executor::{execute, MemorySource};
//! use strata_exec::plan::{PlanBuilder, Step};
//!
//! let mut source = MemorySource::new();
//! source.add_table(
//!     "users",
//!     vec!["id".into(), "age".into()],
//!     vec![
//!         vec![Value::Int(1), Value::Int(17)],
//!         vec![Value::Int(2), Value::Int(30)],
//!     ],
//! );
//!
//! let plan = PlanBuilder::new()
//!     .step(
//!         "users",
//!         Step::Scan {
//!             source: "users".into(),
//!             filter: Some(Expr::column("users", "age").ge(Expr::literal(Value::Int(18)))),
//!             projections: vec![Expr::column("users", "id")],
//!             limit: None,
//!         },
//!         &[],
//!     )
//!     .build("users")
//!     .unwrap();
//!
//! let result = execute(&plan, &source).unwrap();
//! assert_eq!(result.len(), 1);
//! assert_eq!(result.row(0).unwrap().get("id"), Some(&Value::Int(2)));
//! ```

pub mod ast;
pub mod compile;
pub mod context;
pub mod error;
pub mod executor;
pub mod plan;
pub mod sort_key;

pub use compile::{Builtin, CompiledExpr, Compiler, Functions};
pub use context::Context;
pub use error::{CompileError, EvalError, ExecError, ExecResult, PlanError};
pub use executor::{execute, MemorySource, PlanRunner, TableSource};
pub use plan::{JoinKind, JoinSpec, Plan, PlanBuilder, PlanNode, Step};
pub use sort_key::SortKey;
