//! Sort operator.

use std::rc::Rc;

use strata_core::DataTable;

use crate::ast::Expr;
use crate::compile::Compiler;
use crate::context::Context;
use crate::error::ExecResult;

use super::{output_columns, Bindings};

pub(super) fn sort(
    ctx: &mut Context,
    node_name: &str,
    key: &[Expr],
    projections: &[Expr],
    limit: Option<usize>,
    compiler: &Compiler,
) -> ExecResult<Bindings> {
    let table = ctx.sole_table_name()?.to_string();

    let keys: Vec<_> = key
        .iter()
        .map(|k| compiler.compile(k))
        .collect::<Result<_, _>>()?;
    ctx.sort(&table, &keys)?;

    let compiled: Vec<_> = projections
        .iter()
        .map(|p| compiler.compile(p))
        .collect::<Result<_, _>>()?;
    let names = if projections.is_empty() {
        ctx.table(&table)?.column_names().to_vec()
    } else {
        output_columns(projections)
    };

    let mut output = DataTable::new(names)?;
    for position in ctx.positions(&table)? {
        if Some(output.len()) == limit {
            break;
        }
        ctx.set_row(&table, position)?;
        let row = if compiled.is_empty() {
            ctx.row_values(&table)?
        } else {
            ctx.eval_tuple(&compiled)?
        };
        output.push_row(row);
    }

    let mut bindings = Bindings::new();
    bindings.insert(node_name.to_string(), Rc::new(output));
    Ok(bindings)
}
