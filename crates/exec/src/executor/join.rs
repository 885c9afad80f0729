//! Join operators.
//!
//! Joins fold one table at a time into a growing sink: inner equality
//! joins run as a sort-merge over the condition's key columns, cross
//! joins as a nested loop. After each fold every participating name is
//! rebound to the sink, so later conditions and projections can keep
//! using the original qualifiers.

use std::rc::Rc;

use strata_core::DataTable;

use crate::ast::{BinaryOp, Expr};
use crate::compile::{CompiledExpr, Compiler};
use crate::context::Context;
use crate::error::{EvalError, ExecResult};
use crate::plan::{JoinKind, JoinSpec};

use super::{output_columns, Bindings};

pub(super) fn join(
    ctx: &mut Context,
    node_name: &str,
    source: &str,
    joins: &[JoinSpec],
    projections: &[Expr],
    compiler: &Compiler,
) -> ExecResult<Bindings> {
    let mut work = Context::new();
    work.bind_table(source, Rc::clone(ctx.table(source)?));
    let mut names: Vec<String> = vec![source.to_string()];

    for spec in joins {
        work.bind_table(&spec.table, Rc::clone(ctx.table(&spec.table)?));

        let combined = match spec.kind {
            JoinKind::Cross => nested_loop(&work, source, &spec.table)?,
            JoinKind::Inner => {
                // Validated at plan build time.
                let condition = spec.condition.as_ref().ok_or_else(|| {
                    EvalError::TypeMismatch(format!("join with {} has no condition", spec.table))
                })?;
                sort_merge(&mut work, source, &spec.table, condition, compiler)?
            }
        };

        names.push(spec.table.clone());
        let sink = Rc::new(combined);
        for name in &names {
            work.bind_table(name.clone(), Rc::clone(&sink));
        }
    }

    let mut bindings = Bindings::new();
    if projections.is_empty() {
        let sink = Rc::clone(work.table(source)?);
        bindings.insert(node_name.to_string(), Rc::clone(&sink));
        for name in names {
            bindings.insert(name, Rc::clone(&sink));
        }
        return Ok(bindings);
    }

    let compiled: Vec<_> = projections
        .iter()
        .map(|p| compiler.compile(p))
        .collect::<Result<_, _>>()?;
    let mut output = DataTable::new(output_columns(projections))?;
    for position in work.positions(source)? {
        work.set_row(source, position)?;
        output.push_row(work.eval_tuple(&compiled)?);
    }
    let output = Rc::new(output);
    bindings.insert(node_name.to_string(), Rc::clone(&output));
    bindings.insert(source.to_string(), output);
    Ok(bindings)
}

/// Cartesian product of the sink and the newly joined table.
fn nested_loop(work: &Context, base: &str, other: &str) -> ExecResult<DataTable> {
    let a = Rc::clone(work.table(base)?);
    let b = Rc::clone(work.table(other)?);

    let mut output = DataTable::new(joined_columns(&a, &b))?;
    for left in a.iter() {
        for right in b.iter() {
            let mut row = left.to_vec();
            row.extend(right.to_vec());
            output.push_row(row);
        }
    }
    Ok(output)
}

/// Sort-merge equality join of the sink and the newly joined table.
///
/// The condition must be a conjunction of equalities between one side
/// and the other; both sides are sorted by their key expressions, then
/// merged with a two-pointer pass emitting the cross product of each
/// matching key group.
fn sort_merge(
    work: &mut Context,
    base: &str,
    other: &str,
    condition: &Expr,
    compiler: &Compiler,
) -> ExecResult<DataTable> {
    let (base_keys, other_keys) = split_condition(condition, other, compiler)?;

    work.sort(base, &base_keys)?;
    work.sort(other, &other_keys)?;

    let a = Rc::clone(work.table(base)?);
    let b = Rc::clone(work.table(other)?);
    let mut output = DataTable::new(joined_columns(&a, &b))?;

    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        work.set_row(base, i)?;
        let a_key = work.eval_tuple(&base_keys)?;
        work.set_row(other, j)?;
        let b_key = work.eval_tuple(&other_keys)?;

        match a_key.cmp(&b_key) {
            core::cmp::Ordering::Less => i += 1,
            core::cmp::Ordering::Greater => j += 1,
            core::cmp::Ordering::Equal => {
                // Gather the full group of equal keys on both sides.
                let mut a_end = i + 1;
                while a_end < a.len() {
                    work.set_row(base, a_end)?;
                    if work.eval_tuple(&base_keys)? != a_key {
                        break;
                    }
                    a_end += 1;
                }
                let mut b_end = j + 1;
                while b_end < b.len() {
                    work.set_row(other, b_end)?;
                    if work.eval_tuple(&other_keys)? != b_key {
                        break;
                    }
                    b_end += 1;
                }
                for left in a.iter().skip(i).take(a_end - i) {
                    for right in b.iter().skip(j).take(b_end - j) {
                        let mut row = left.to_vec();
                        row.extend(right.to_vec());
                        output.push_row(row);
                    }
                }
                i = a_end;
                j = b_end;
            }
        }
    }
    Ok(output)
}

/// Splits an equi-join condition into key expression lists for the sink
/// side and the newly joined side. A side belongs to the new table when
/// every column it references is qualified by that table's name.
fn split_condition(
    condition: &Expr,
    other: &str,
    compiler: &Compiler,
) -> ExecResult<(Vec<CompiledExpr>, Vec<CompiledExpr>)> {
    let mut base_keys = Vec::new();
    let mut other_keys = Vec::new();
    for part in condition.flatten_and() {
        let (left, right) = match part {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => (left.as_ref(), right.as_ref()),
            other_expr => {
                return Err(EvalError::TypeMismatch(format!(
                    "join condition is not an equality: {other_expr:?}"
                ))
                .into())
            }
        };
        let left_is_other = references_only(left, other);
        let right_is_other = references_only(right, other);
        let (base_side, other_side) = match (left_is_other, right_is_other) {
            (false, true) => (left, right),
            (true, false) => (right, left),
            _ => {
                return Err(EvalError::TypeMismatch(format!(
                    "join condition does not separate {other} from the joined tables: {part:?}"
                ))
                .into())
            }
        };
        base_keys.push(compiler.compile(base_side)?);
        other_keys.push(compiler.compile(other_side)?);
    }
    Ok((base_keys, other_keys))
}

fn references_only(expr: &Expr, table: &str) -> bool {
    let columns = expr.find_columns();
    !columns.is_empty() && columns.iter().all(|(t, _)| *t == table)
}

fn joined_columns(a: &DataTable, b: &DataTable) -> Vec<String> {
    let mut columns = a.column_names().to_vec();
    columns.extend(b.column_names().iter().cloned());
    columns
}
