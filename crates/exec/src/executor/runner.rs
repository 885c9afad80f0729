//! Plan scheduler.
//!
//! Executes a validated plan with a ready queue: leaves are enqueued
//! first, and a step is enqueued as soon as every step it depends on has
//! finished. Each finished step publishes its output tables; a dependent
//! step's evaluation context is built from the outputs of its
//! dependencies alone.

use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

use strata_core::{DataTable, Value};

use crate::compile::{Compiler, Functions};
use crate::context::Context;
use crate::error::{EvalError, ExecError, ExecResult};
use crate::plan::{NodeId, Plan, Step};

use super::{aggregate, join, scan, sort, Bindings};

/// Supplies base tables to scan steps.
pub trait TableSource {
    /// Column names of `table`, in storage order.
    fn columns(&self, table: &str) -> ExecResult<Vec<String>>;

    /// Rows of `table`, each in the order given by `columns`.
    fn rows(&self, table: &str) -> ExecResult<Box<dyn Iterator<Item = Vec<Value>> + '_>>;
}

/// A table source backed by in-memory rows.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    tables: hashbrown::HashMap<String, (Vec<String>, Vec<Vec<Value>>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        MemorySource::default()
    }

    /// Registers a table with its column names and rows.
    pub fn add_table(
        &mut self,
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) {
        self.tables.insert(name.into(), (columns, rows));
    }

    fn table(&self, name: &str) -> ExecResult<&(Vec<String>, Vec<Vec<Value>>)> {
        self.tables
            .get(name)
            .ok_or_else(|| ExecError::Source(format!("no table named {name}")))
    }
}

impl TableSource for MemorySource {
    fn columns(&self, table: &str) -> ExecResult<Vec<String>> {
        Ok(self.table(table)?.0.clone())
    }

    fn rows(&self, table: &str) -> ExecResult<Box<dyn Iterator<Item = Vec<Value>> + '_>> {
        Ok(Box::new(self.table(table)?.1.iter().cloned()))
    }
}

/// Runs plans against a table source.
pub struct PlanRunner<'a, S: TableSource + ?Sized> {
    source: &'a S,
    compiler: Compiler,
}

impl<'a, S: TableSource + ?Sized> PlanRunner<'a, S> {
    /// Creates a runner with the standard function registry.
    pub fn new(source: &'a S) -> Self {
        PlanRunner {
            source,
            compiler: Compiler::new(Functions::standard()),
        }
    }

    /// Creates a runner with a custom function registry.
    pub fn with_functions(source: &'a S, functions: Functions) -> Self {
        PlanRunner {
            source,
            compiler: Compiler::new(functions),
        }
    }

    /// Executes the plan and returns the root step's table.
    pub fn execute(&self, plan: &Plan) -> ExecResult<DataTable> {
        let started = Instant::now();
        let node_count = plan.nodes().len();
        let mut outputs: Vec<Option<Bindings>> = (0..node_count).map(|_| None).collect();
        let mut queued = vec![false; node_count];
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for &leaf in plan.leaves() {
            queued[leaf] = true;
            queue.push_back(leaf);
        }

        while let Some(id) = queue.pop_front() {
            let node = plan.node(id);
            debug!(step = %node.name, kind = node.step.kind_name(), "executing plan step");

            let mut ctx = Context::new();
            for &dep in &node.dependencies {
                if let Some(bindings) = &outputs[dep] {
                    for (name, table) in bindings {
                        ctx.bind_table(name.clone(), Rc::clone(table));
                    }
                }
            }

            let result = match &node.step {
                Step::Scan {
                    source,
                    filter,
                    projections,
                    limit,
                } => scan::scan(
                    &mut ctx,
                    &node.name,
                    source,
                    filter.as_ref(),
                    projections,
                    *limit,
                    &self.compiler,
                    self.source,
                ),
                Step::Join {
                    source,
                    joins,
                    projections,
                } => join::join(&mut ctx, &node.name, source, joins, projections, &self.compiler),
                Step::Aggregate {
                    group,
                    aggregations,
                    operands,
                } => aggregate::aggregate(
                    &mut ctx,
                    &node.name,
                    group,
                    aggregations,
                    operands,
                    &self.compiler,
                ),
                Step::Sort {
                    key,
                    projections,
                    limit,
                } => sort::sort(&mut ctx, &node.name, key, projections, *limit, &self.compiler),
            };
            outputs[id] = Some(result.map_err(|e| e.at_node(&node.name))?);

            for &dependent in &node.dependents {
                if queued[dependent] {
                    continue;
                }
                let ready = plan
                    .node(dependent)
                    .dependencies
                    .iter()
                    .all(|&d| outputs[d].is_some());
                if ready {
                    queued[dependent] = true;
                    queue.push_back(dependent);
                }
            }
        }

        let root = plan.root();
        let root_name = &plan.node(root).name;
        let mut bindings = outputs[root]
            .take()
            .ok_or_else(|| EvalError::UnknownTable(root_name.clone()))?;
        // Drop every other reference so the result can be taken without
        // a copy when nothing else shares it.
        outputs.clear();
        let table = bindings
            .remove(root_name)
            .ok_or_else(|| EvalError::UnknownTable(root_name.clone()))?;
        drop(bindings);
        let table = Rc::try_unwrap(table).unwrap_or_else(|shared| (*shared).clone());

        debug!(elapsed = ?started.elapsed(), rows = table.len(), "plan finished");
        Ok(table)
    }
}

/// Executes `plan` against `source` with the standard function registry.
pub fn execute<S: TableSource + ?Sized>(plan: &Plan, source: &S) -> ExecResult<DataTable> {
    PlanRunner::new(source).execute(plan)
}
