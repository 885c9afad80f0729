//! Plan execution: the scheduler and the physical operators.

use std::rc::Rc;

use hashbrown::HashMap;

use strata_core::DataTable;

use crate::ast::Expr;

mod aggregate;
mod join;
mod runner;
mod scan;
mod sort;

pub use runner::{execute, MemorySource, PlanRunner, TableSource};

/// Tables produced by one plan step, keyed by the names downstream steps
/// use to reference them. Several names may share one table.
pub(crate) type Bindings = HashMap<String, Rc<DataTable>>;

/// Output column names for a projection list: the alias or column name of
/// each expression, with a positional fallback for anonymous expressions.
fn output_columns(projections: &[Expr]) -> Vec<String> {
    projections
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.alias_or_name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("_col_{i}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_columns() {
        let projections = vec![
            Expr::column("t", "a"),
            Expr::sum(Expr::column("t", "b")).alias("total"),
            Expr::literal(1i64),
        ];
        assert_eq!(output_columns(&projections), vec!["a", "total", "_col_2"]);
    }
}
