//! Scan operator.
//!
//! A scan reads rows either from an external table source or from a table
//! a dependency step already produced, applying an optional filter,
//! projections, and a row limit.

use std::rc::Rc;

use strata_core::DataTable;

use crate::ast::Expr;
use crate::compile::Compiler;
use crate::context::Context;
use crate::error::{ExecError, ExecResult};

use super::{output_columns, Bindings, TableSource};

#[allow(clippy::too_many_arguments)]
pub(super) fn scan<S: TableSource + ?Sized>(
    ctx: &mut Context,
    node_name: &str,
    source: &str,
    filter: Option<&Expr>,
    projections: &[Expr],
    limit: Option<usize>,
    compiler: &Compiler,
    table_source: &S,
) -> ExecResult<Bindings> {
    // A scan of an already materialized table with no projections passes
    // the table through untouched.
    if projections.is_empty() && ctx.contains(source) {
        let table = Rc::clone(ctx.table(source)?);
        let mut bindings = Bindings::new();
        bindings.insert(node_name.to_string(), table);
        return Ok(bindings);
    }

    let filter = filter.map(|f| compiler.compile(f)).transpose()?;
    let compiled: Vec<_> = projections
        .iter()
        .map(|p| compiler.compile(p))
        .collect::<Result<_, _>>()?;

    let output = if ctx.contains(source) {
        let names = if projections.is_empty() {
            ctx.table(source)?.column_names().to_vec()
        } else {
            output_columns(projections)
        };
        let mut output = DataTable::new(names)?;
        for position in ctx.positions(source)? {
            if Some(output.len()) == limit {
                break;
            }
            ctx.set_row(source, position)?;
            if let Some(filter) = &filter {
                if !ctx.eval_bool(filter)? {
                    continue;
                }
            }
            let row = if compiled.is_empty() {
                ctx.row_values(source)?
            } else {
                ctx.eval_tuple(&compiled)?
            };
            output.push_row(row);
        }
        output
    } else {
        let columns = table_source.columns(source)?;
        let names = if projections.is_empty() {
            columns.clone()
        } else {
            output_columns(projections)
        };
        ctx.bind_source(source, columns.clone());
        let mut output = DataTable::new(names)?;
        for row in table_source.rows(source)? {
            if Some(output.len()) == limit {
                break;
            }
            if row.len() != columns.len() {
                return Err(ExecError::Source(format!(
                    "table {source} produced a row of {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            ctx.set_source_row(source, row.clone())?;
            if let Some(filter) = &filter {
                if !ctx.eval_bool(filter)? {
                    continue;
                }
            }
            let row = if compiled.is_empty() {
                row
            } else {
                ctx.eval_tuple(&compiled)?
            };
            output.push_row(row);
        }
        output
    };

    let mut bindings = Bindings::new();
    bindings.insert(node_name.to_string(), Rc::new(output));
    Ok(bindings)
}
