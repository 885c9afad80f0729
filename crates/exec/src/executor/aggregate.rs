//! Aggregate operator.
//!
//! The input is sorted by the group expressions so that each group is a
//! contiguous run of rows; the operator then walks the rows once, closing
//! a group whenever the key changes and evaluating the aggregate
//! expressions over the group's row range.

use std::rc::Rc;

use strata_core::{DataTable, Value};

use crate::ast::Expr;
use crate::compile::{CompiledExpr, Compiler};
use crate::context::Context;
use crate::error::ExecResult;

use super::{output_columns, Bindings};

pub(super) fn aggregate(
    ctx: &mut Context,
    node_name: &str,
    group: &[Expr],
    aggregations: &[Expr],
    operands: &[Expr],
    compiler: &Compiler,
) -> ExecResult<Bindings> {
    let table = ctx.sole_table_name()?.to_string();

    let group_compiled: Vec<_> = group
        .iter()
        .map(|g| compiler.compile(g))
        .collect::<Result<_, _>>()?;
    let agg_compiled: Vec<_> = aggregations
        .iter()
        .map(|a| compiler.compile(a))
        .collect::<Result<_, _>>()?;

    if !group_compiled.is_empty() {
        ctx.sort(&table, &group_compiled)?;
    }

    // Aggregate arguments are plain column reads; expressions inside
    // aggregates were hoisted into operands by the planner and are
    // materialized here as extra columns, after the sort so they line up
    // with the sorted rows.
    if !operands.is_empty() {
        let operand_compiled: Vec<_> = operands
            .iter()
            .map(|o| compiler.compile(o))
            .collect::<Result<_, _>>()?;
        let mut columns = DataTable::new(output_columns(operands))?;
        for position in ctx.positions(&table)? {
            ctx.set_row(&table, position)?;
            columns.push_row(ctx.eval_tuple(&operand_compiled)?);
        }
        ctx.merge_columns(&table, columns)?;
    }

    let mut names = output_columns(group);
    names.extend(output_columns(aggregations));
    let mut output = DataTable::new(names)?;

    let rows = ctx.row_count(&table)?;
    let mut start = 0;
    let mut current: Option<Vec<Value>> = None;
    for position in 0..rows {
        ctx.set_row(&table, position)?;
        let key = ctx.eval_tuple(&group_compiled)?;
        match &current {
            Some(open) if *open == key => {}
            Some(open) => {
                let row = close_group(ctx, &table, start, position, open, &agg_compiled)?;
                output.push_row(row);
                start = position;
                current = Some(key);
            }
            None => current = Some(key),
        }
    }
    if let Some(open) = &current {
        let row = close_group(ctx, &table, start, rows, open, &agg_compiled)?;
        output.push_row(row);
    }

    let mut bindings = Bindings::new();
    bindings.insert(node_name.to_string(), Rc::new(output));
    Ok(bindings)
}

/// Evaluates the aggregates over `[start, end)` and returns the output
/// row: group key values followed by aggregate values.
fn close_group(
    ctx: &mut Context,
    table: &str,
    start: usize,
    end: usize,
    key: &[Value],
    aggregations: &[CompiledExpr],
) -> ExecResult<Vec<Value>> {
    ctx.set_range(table, start, end)?;
    let mut row = key.to_vec();
    row.extend(ctx.eval_tuple(aggregations)?);
    Ok(row)
}
