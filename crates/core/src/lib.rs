//! Strata Core - foundational types for the strata plan executor.
//!
//! This crate provides the building blocks shared by every physical
//! operator:
//!
//! - `Value`: dynamically typed cell values (null, boolean, integer,
//!   float, string, date, interval)
//! - `DataTable`: an in-memory columnar table with row handles and
//!   permutation-based in-place sorting
//! - `pattern`: SQL `LIKE` pattern matching
//! - `Error`: error types for table construction and column access
//!
//! # Example
//!
//! ```rust
//! use strata_core::{DataTable, Value};
//!
//! let mut table = DataTable::new(["id", "name"]).unwrap();
//! table.push_row(vec![Value::Int(1), Value::from("Alice")]);
//! table.push_row(vec![Value::Int(2), Value::from("Bob")]);
//!
//! assert_eq!(table.len(), 2);
//! assert_eq!(table.row(1).unwrap().get("name"), Some(&Value::from("Bob")));
//! ```

mod error;
pub mod pattern;
mod table;
mod value;

pub use error::{Error, Result};
pub use table::{DataTable, RowHandle, Rows};
pub use value::Value;
