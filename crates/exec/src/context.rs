//! Evaluation context.
//!
//! A `Context` binds tables by name and evaluates compiled expressions
//! against them. Each bound table carries an addressing mode: a single
//! row for row-at-a-time evaluation, or a half-open row range for
//! aggregate evaluation. Binding the same underlying table under a second
//! name aliases the two names to one slot, so selecting a row through one
//! name is visible through the other.

use core::cmp::Ordering;
use core::ops::Range;
use std::rc::Rc;

use hashbrown::HashMap;

use strata_core::{pattern, DataTable, Value};

use crate::ast::BinaryOp;
use crate::compile::{Builtin, CompiledExpr};
use crate::error::{EvalError, ExecResult};
use crate::sort_key::SortKey;

/// Row addressing mode of a bound table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Unset,
    Row(usize),
    Range(usize, usize),
}

enum Slot {
    /// A materialized table with its current addressing mode.
    Table { table: Rc<DataTable>, mode: Mode },
    /// A streaming row source: only the current row is addressable.
    Source {
        columns: Vec<String>,
        current: Option<Vec<Value>>,
    },
}

/// Result of evaluating a subexpression: one value, or one value per row
/// of a range.
enum Evaluated {
    Scalar(Value),
    Series(Vec<Value>),
}

/// Binds tables for compiled expression evaluation.
#[derive(Default)]
pub struct Context {
    slots: Vec<Slot>,
    by_name: HashMap<String, usize>,
    order: Vec<String>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Context::default()
    }

    /// Binds `table` under `name`.
    ///
    /// If the same underlying table (by pointer identity) is already
    /// bound, the new name becomes an alias sharing the existing slot and
    /// its addressing mode.
    pub fn bind_table(&mut self, name: impl Into<String>, table: Rc<DataTable>) {
        let name = name.into();
        let slot = self
            .slots
            .iter()
            .position(|s| matches!(s, Slot::Table { table: t, .. } if Rc::ptr_eq(t, &table)));
        let slot = match slot {
            Some(i) => i,
            None => {
                self.slots.push(Slot::Table {
                    table,
                    mode: Mode::Unset,
                });
                self.slots.len() - 1
            }
        };
        if self.by_name.insert(name.clone(), slot).is_none() {
            self.order.push(name);
        }
    }

    /// Binds a streaming source under `name` with the given column
    /// layout. Rows are supplied one at a time via `set_source_row`.
    pub fn bind_source(&mut self, name: impl Into<String>, columns: Vec<String>) {
        let name = name.into();
        self.slots.push(Slot::Source {
            columns,
            current: None,
        });
        let slot = self.slots.len() - 1;
        if self.by_name.insert(name.clone(), slot).is_none() {
            self.order.push(name);
        }
    }

    /// Returns true if `name` is bound to a materialized table.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .is_some_and(|&i| matches!(self.slots[i], Slot::Table { .. }))
    }

    /// Returns the table bound under `name`.
    pub fn table(&self, name: &str) -> Result<&Rc<DataTable>, EvalError> {
        match self.slot(name)? {
            Slot::Table { table, .. } => Ok(table),
            Slot::Source { .. } => Err(EvalError::UnknownTable(name.to_string())),
        }
    }

    /// Number of rows in the table bound under `name`.
    pub fn row_count(&self, name: &str) -> Result<usize, EvalError> {
        Ok(self.table(name)?.len())
    }

    /// Row positions of the table bound under `name`.
    pub fn positions(&self, name: &str) -> Result<Range<usize>, EvalError> {
        Ok(0..self.row_count(name)?)
    }

    /// Selects a single row on the table bound under `name`.
    pub fn set_row(&mut self, name: &str, position: usize) -> Result<(), EvalError> {
        let slot = self.slot_index(name)?;
        match &mut self.slots[slot] {
            Slot::Table { table, mode } => {
                if position >= table.len() {
                    return Err(EvalError::PositionOutOfRange {
                        table: name.to_string(),
                        position,
                        rows: table.len(),
                    });
                }
                *mode = Mode::Row(position);
                Ok(())
            }
            Slot::Source { .. } => Err(EvalError::UnknownTable(name.to_string())),
        }
    }

    /// Selects a half-open row range on the table bound under `name`.
    pub fn set_range(&mut self, name: &str, start: usize, end: usize) -> Result<(), EvalError> {
        let slot = self.slot_index(name)?;
        match &mut self.slots[slot] {
            Slot::Table { table, mode } => {
                if start > end || end > table.len() {
                    return Err(EvalError::PositionOutOfRange {
                        table: name.to_string(),
                        position: end,
                        rows: table.len(),
                    });
                }
                *mode = Mode::Range(start, end);
                Ok(())
            }
            Slot::Source { .. } => Err(EvalError::UnknownTable(name.to_string())),
        }
    }

    /// Supplies the current row of a streaming source.
    pub fn set_source_row(&mut self, name: &str, row: Vec<Value>) -> Result<(), EvalError> {
        let slot = self.slot_index(name)?;
        match &mut self.slots[slot] {
            Slot::Source { current, .. } => {
                *current = Some(row);
                Ok(())
            }
            Slot::Table { .. } => Err(EvalError::UnknownTable(name.to_string())),
        }
    }

    /// Copies out the currently selected row of `name` in column order.
    pub fn row_values(&self, name: &str) -> Result<Vec<Value>, EvalError> {
        match self.slot(name)? {
            Slot::Table { table, mode } => match mode {
                Mode::Row(position) => Ok(table
                    .row(*position)
                    .map(|r| r.to_vec())
                    .unwrap_or_default()),
                _ => Err(EvalError::ModeNotSet(name.to_string())),
            },
            Slot::Source { current, .. } => current
                .clone()
                .ok_or_else(|| EvalError::ModeNotSet(name.to_string())),
        }
    }

    /// Returns the name of the first bound table. Single-input operators
    /// use this to find their input.
    pub fn sole_table_name(&self) -> Result<&str, EvalError> {
        self.order
            .iter()
            .find(|name| self.contains(name))
            .map(String::as_str)
            .ok_or(EvalError::EmptyContext)
    }

    /// Sorts the table bound under `name` in place by the given keys.
    ///
    /// The sort is stable. Shared tables are copied on write, so other
    /// holders of the same `Rc` observe no change.
    pub fn sort(&mut self, name: &str, keys: &[CompiledExpr]) -> Result<(), EvalError> {
        let rows = self.row_count(name)?;
        let mut key_tuples: Vec<Vec<SortKey>> = Vec::with_capacity(rows);
        for position in 0..rows {
            self.set_row(name, position)?;
            key_tuples.push(self.eval_key_tuple(keys)?);
        }

        let mut permutation: Vec<usize> = (0..rows).collect();
        permutation.sort_by(|&a, &b| key_tuples[a].cmp(&key_tuples[b]));

        let slot = self.slot_index(name)?;
        if let Slot::Table { table, mode } = &mut self.slots[slot] {
            Rc::make_mut(table).apply_permutation(&permutation);
            *mode = Mode::Unset;
        }
        Ok(())
    }

    /// Merges the columns of `other` into the table bound under `name`.
    pub fn merge_columns(&mut self, name: &str, other: DataTable) -> ExecResult<()> {
        let slot = self.slot_index(name)?;
        match &mut self.slots[slot] {
            Slot::Table { table, .. } => {
                Rc::make_mut(table).merge_columns(other)?;
                Ok(())
            }
            Slot::Source { .. } => Err(EvalError::UnknownTable(name.to_string()).into()),
        }
    }

    /// Evaluates an expression to a single value against the current row
    /// selections.
    pub fn eval(&self, expr: &CompiledExpr) -> Result<Value, EvalError> {
        match self.eval_inner(expr)? {
            Evaluated::Scalar(value) => Ok(value),
            Evaluated::Series(_) => Err(EvalError::TypeMismatch(
                "range-valued expression outside an aggregate".to_string(),
            )),
        }
    }

    /// Evaluates an expression to a boolean, treating Null as false.
    pub fn eval_bool(&self, expr: &CompiledExpr) -> Result<bool, EvalError> {
        truthy(&self.eval(expr)?)
    }

    /// Evaluates a sort key, preserving its direction.
    pub fn eval_key(&self, expr: &CompiledExpr) -> Result<SortKey, EvalError> {
        match expr {
            CompiledExpr::Desc(inner) => Ok(SortKey::Desc(self.eval(inner)?)),
            other => Ok(SortKey::Asc(self.eval(other)?)),
        }
    }

    /// Evaluates a list of expressions into a row tuple.
    pub fn eval_tuple(&self, exprs: &[CompiledExpr]) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    /// Evaluates a list of sort keys into a key tuple.
    pub fn eval_key_tuple(&self, exprs: &[CompiledExpr]) -> Result<Vec<SortKey>, EvalError> {
        exprs.iter().map(|e| self.eval_key(e)).collect()
    }

    fn slot_index(&self, name: &str) -> Result<usize, EvalError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EvalError::UnknownTable(name.to_string()))
    }

    fn slot(&self, name: &str) -> Result<&Slot, EvalError> {
        Ok(&self.slots[self.slot_index(name)?])
    }

    fn eval_inner(&self, expr: &CompiledExpr) -> Result<Evaluated, EvalError> {
        match expr {
            CompiledExpr::Column { table, column } => self.eval_column(table, column),
            CompiledExpr::Literal(value) => Ok(Evaluated::Scalar(value.clone())),
            CompiledExpr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            CompiledExpr::Not(inner) => {
                let value = self.eval(inner)?;
                Ok(Evaluated::Scalar(Value::Boolean(!truthy(&value)?)))
            }
            CompiledExpr::Neg(inner) => {
                let value = match self.eval(inner)? {
                    Value::Int(v) => Value::Int(v.checked_neg().ok_or_else(|| {
                        EvalError::TypeMismatch("integer overflow in negation".to_string())
                    })?),
                    Value::Float(v) => Value::Float(-v),
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot negate {other}"
                        )))
                    }
                };
                Ok(Evaluated::Scalar(value))
            }
            CompiledExpr::Like { expr, pattern: p } => {
                let value = match self.eval(expr)? {
                    Value::Str(s) => Value::Boolean(pattern::like(&s, p)),
                    Value::Null => Value::Boolean(false),
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "LIKE over non-string value {other}"
                        )))
                    }
                };
                Ok(Evaluated::Scalar(value))
            }
            CompiledExpr::CastDate(inner) => {
                let value = match self.eval(inner)? {
                    Value::Date(d) => Value::Date(d),
                    Value::Str(s) => {
                        let date = chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                            .map_err(|_| EvalError::BadDate(s.clone()))?;
                        Value::Date(date)
                    }
                    Value::Null => Value::Null,
                    other => {
                        return Err(EvalError::TypeMismatch(format!(
                            "cannot cast {other} to date"
                        )))
                    }
                };
                Ok(Evaluated::Scalar(value))
            }
            CompiledExpr::IntervalDays(inner) => {
                let value = self.eval(inner)?;
                let days = value.as_number().ok_or_else(|| {
                    EvalError::TypeMismatch(format!("interval of non-numeric value {value}"))
                })?;
                let millis = (days * 86_400_000.0).round();
                // Reject magnitudes the i64 millisecond clock cannot hold
                // instead of letting the cast saturate.
                if !millis.is_finite() || millis.abs() >= 9.2e18 {
                    return Err(EvalError::TypeMismatch(format!(
                        "interval of {days} days out of range"
                    )));
                }
                Ok(Evaluated::Scalar(Value::Interval(
                    chrono::Duration::milliseconds(millis as i64),
                )))
            }
            CompiledExpr::Desc(inner) => self.eval_inner(inner),
            CompiledExpr::Call { func, name, args } => self.eval_call(*func, name, args),
        }
    }

    fn eval_column(&self, table: &str, column: &str) -> Result<Evaluated, EvalError> {
        match self.slot(table)? {
            Slot::Table { table: t, mode } => {
                let values = t.column(column).ok_or_else(|| EvalError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })?;
                match mode {
                    Mode::Row(position) => Ok(Evaluated::Scalar(values[*position].clone())),
                    Mode::Range(start, end) => {
                        Ok(Evaluated::Series(values[*start..*end].to_vec()))
                    }
                    Mode::Unset => Err(EvalError::ModeNotSet(table.to_string())),
                }
            }
            Slot::Source { columns, current } => {
                let row = current
                    .as_ref()
                    .ok_or_else(|| EvalError::ModeNotSet(table.to_string()))?;
                let index = columns.iter().position(|c| c == column).ok_or_else(|| {
                    EvalError::UnknownColumn {
                        table: table.to_string(),
                        column: column.to_string(),
                    }
                })?;
                Ok(Evaluated::Scalar(row[index].clone()))
            }
        }
    }

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &CompiledExpr,
        right: &CompiledExpr,
    ) -> Result<Evaluated, EvalError> {
        // Logical operators short-circuit.
        match op {
            BinaryOp::And => {
                if !self.eval_bool(left)? {
                    return Ok(Evaluated::Scalar(Value::Boolean(false)));
                }
                return Ok(Evaluated::Scalar(Value::Boolean(self.eval_bool(right)?)));
            }
            BinaryOp::Or => {
                if self.eval_bool(left)? {
                    return Ok(Evaluated::Scalar(Value::Boolean(true)));
                }
                return Ok(Evaluated::Scalar(Value::Boolean(self.eval_bool(right)?)));
            }
            _ => {}
        }

        let a = self.eval(left)?;
        let b = self.eval(right)?;
        let value = match op {
            BinaryOp::Eq => Value::Boolean(a == b),
            BinaryOp::Ne => Value::Boolean(a != b),
            BinaryOp::Lt => Value::Boolean(a.cmp(&b) == Ordering::Less),
            BinaryOp::Le => Value::Boolean(a.cmp(&b) != Ordering::Greater),
            BinaryOp::Gt => Value::Boolean(a.cmp(&b) == Ordering::Greater),
            BinaryOp::Ge => Value::Boolean(a.cmp(&b) != Ordering::Less),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arith(op, a, b)?,
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(Evaluated::Scalar(value))
    }

    fn eval_call(
        &self,
        func: Builtin,
        name: &str,
        args: &[CompiledExpr],
    ) -> Result<Evaluated, EvalError> {
        if func == Builtin::Pow {
            let base = self.eval(args.first().ok_or_else(|| missing_arg(name))?)?;
            let exponent = self.eval(args.get(1).ok_or_else(|| missing_arg(name))?)?;
            return Ok(Evaluated::Scalar(pow(&base, &exponent)?));
        }

        let arg = args.first().ok_or_else(|| missing_arg(name))?;
        match self.eval_inner(arg)? {
            Evaluated::Series(values) => Ok(Evaluated::Scalar(func.reduce(&values)?)),
            Evaluated::Scalar(_) => Err(EvalError::NotASequence {
                function: name.to_string(),
            }),
        }
    }
}

fn missing_arg(function: &str) -> EvalError {
    EvalError::TypeMismatch(format!("{function} called with too few arguments"))
}

fn truthy(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EvalError::TypeMismatch(format!(
            "expected a boolean, got {other}"
        ))),
    }
}

fn pow(base: &Value, exponent: &Value) -> Result<Value, EvalError> {
    match (base, exponent) {
        (Value::Int(b), Value::Int(e)) if *e >= 0 && *e <= u32::MAX as i64 => b
            .checked_pow(*e as u32)
            .map(Value::Int)
            .ok_or_else(|| EvalError::TypeMismatch("integer overflow in POW".to_string())),
        _ => {
            let b = base
                .as_number()
                .ok_or_else(|| EvalError::TypeMismatch(format!("POW of {base}")))?;
            let e = exponent
                .as_number()
                .ok_or_else(|| EvalError::TypeMismatch(format!("POW by {exponent}")))?;
            Ok(Value::Float(b.powf(e)))
        }
    }
}

fn arith(op: BinaryOp, a: Value, b: Value) -> Result<Value, EvalError> {
    let overflow = || EvalError::TypeMismatch("integer overflow".to_string());
    let out_of_range = || EvalError::TypeMismatch("date out of range".to_string());
    match (op, a, b) {
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => {
            a.checked_add(b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => {
            a.checked_sub(b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => {
            a.checked_mul(b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (BinaryOp::Add, Value::Date(d), Value::Interval(i))
        | (BinaryOp::Add, Value::Interval(i), Value::Date(d)) => d
            .checked_add_signed(i)
            .map(Value::Date)
            .ok_or_else(out_of_range),
        (BinaryOp::Sub, Value::Date(d), Value::Interval(i)) => d
            .checked_sub_signed(i)
            .map(Value::Date)
            .ok_or_else(out_of_range),
        (BinaryOp::Sub, Value::Date(a), Value::Date(b)) => {
            Ok(Value::Interval(a.signed_duration_since(b)))
        }
        (BinaryOp::Add, Value::Interval(a), Value::Interval(b)) => Ok(Value::Interval(a + b)),
        (BinaryOp::Sub, Value::Interval(a), Value::Interval(b)) => Ok(Value::Interval(a - b)),
        (BinaryOp::Div, a, b) => {
            let (x, y) = numeric_pair(op, &a, &b)?;
            if y == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Value::Float(x / y))
            }
        }
        (op, a, b) => {
            let (x, y) = numeric_pair(op, &a, &b)?;
            let out = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                _ => unreachable!("arith called with non-arithmetic operator"),
            };
            Ok(Value::Float(out))
        }
    }
}

fn numeric_pair(op: BinaryOp, a: &Value, b: &Value) -> Result<(f64, f64), EvalError> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(EvalError::TypeMismatch(format!(
            "cannot apply {op:?} to {a} and {b}"
        ))),
    }
}
