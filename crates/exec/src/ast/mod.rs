//! Expression AST definitions.

mod expr;

pub use expr::{BinaryOp, Expr, UnaryOp};
