//! Physical plan representation.
//!
//! A plan is a DAG of named steps. Each step names the steps it consumes;
//! the builder validates the graph (unique names, known dependencies, no
//! cycles) and computes the reverse edges and leaves the scheduler needs.

use hashbrown::{HashMap, HashSet};

use crate::ast::Expr;
use crate::error::PlanError;

/// Index of a node within a plan.
pub type NodeId = usize;

/// How a table participates in a join.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Equality join; requires a condition.
    Inner,
    /// Cartesian product; no condition.
    Cross,
}

/// One joined table within a join step.
#[derive(Clone, Debug)]
pub struct JoinSpec {
    /// Name of the dependency step producing the joined table.
    pub table: String,
    pub kind: JoinKind,
    /// Join condition; required for inner joins.
    pub condition: Option<Expr>,
}

/// A physical plan step.
#[derive(Clone, Debug)]
pub enum Step {
    /// Reads a table from the source (or from a finished dependency),
    /// applying an optional filter, projections, and a row limit.
    Scan {
        source: String,
        filter: Option<Expr>,
        projections: Vec<Expr>,
        limit: Option<usize>,
    },
    /// Joins the `source` table with one or more others, in order.
    Join {
        source: String,
        joins: Vec<JoinSpec>,
        projections: Vec<Expr>,
    },
    /// Groups its input and evaluates aggregate expressions per group.
    /// `operands` are materialized as columns before grouping so that
    /// aggregate arguments are simple column reads.
    Aggregate {
        group: Vec<Expr>,
        aggregations: Vec<Expr>,
        operands: Vec<Expr>,
    },
    /// Sorts its input by `key`, then projects and limits.
    Sort {
        key: Vec<Expr>,
        projections: Vec<Expr>,
        limit: Option<usize>,
    },
}

impl Step {
    /// Name of this step kind, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Step::Scan { .. } => "scan",
            Step::Join { .. } => "join",
            Step::Aggregate { .. } => "aggregate",
            Step::Sort { .. } => "sort",
        }
    }
}

/// A named step with its graph edges resolved to node ids.
#[derive(Clone, Debug)]
pub struct PlanNode {
    pub name: String,
    pub step: Step,
    pub dependencies: Vec<NodeId>,
    pub dependents: Vec<NodeId>,
}

/// A validated plan DAG.
#[derive(Clone, Debug)]
pub struct Plan {
    nodes: Vec<PlanNode>,
    root: NodeId,
    leaves: Vec<NodeId>,
}

impl Plan {
    /// All nodes, indexed by `NodeId`.
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// The node at `id`.
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id]
    }

    /// The step whose output is the query result.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Nodes with no dependencies; execution starts here.
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }
}

/// Builds and validates a `Plan`.
#[derive(Default)]
pub struct PlanBuilder {
    steps: Vec<(String, Step, Vec<String>)>,
}

impl PlanBuilder {
    pub fn new() -> Self {
        PlanBuilder::default()
    }

    /// Adds a named step with the names of the steps it depends on.
    pub fn step(mut self, name: impl Into<String>, step: Step, dependencies: &[&str]) -> Self {
        self.steps.push((
            name.into(),
            step,
            dependencies.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    /// Validates the graph and returns the plan rooted at `root`.
    pub fn build(self, root: &str) -> Result<Plan, PlanError> {
        let mut ids: HashMap<String, NodeId> = HashMap::with_capacity(self.steps.len());
        for (name, _, _) in &self.steps {
            if ids.insert(name.clone(), ids.len()).is_some() {
                return Err(PlanError::DuplicateStep(name.clone()));
            }
        }

        let mut nodes = Vec::with_capacity(self.steps.len());
        for (name, step, dependencies) in self.steps {
            let dependencies = dependencies
                .iter()
                .map(|dep| {
                    ids.get(dep).copied().ok_or_else(|| PlanError::UnknownDependency {
                        step: name.clone(),
                        dependency: dep.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if let Step::Join { joins, .. } = &step {
                for join in joins {
                    if join.kind == JoinKind::Inner && join.condition.is_none() {
                        return Err(PlanError::MissingJoinCondition {
                            step: name.clone(),
                            table: join.table.clone(),
                        });
                    }
                }
            }
            nodes.push(PlanNode {
                name,
                step,
                dependencies,
                dependents: Vec::new(),
            });
        }

        let root = *ids
            .get(root)
            .ok_or_else(|| PlanError::UnknownRoot(root.to_string()))?;

        // Reverse edges, deduplicated.
        for id in 0..nodes.len() {
            let mut seen = HashSet::new();
            for i in 0..nodes[id].dependencies.len() {
                let dep = nodes[id].dependencies[i];
                if seen.insert(dep) {
                    nodes[dep].dependents.push(id);
                }
            }
        }

        let leaves: Vec<NodeId> = (0..nodes.len())
            .filter(|&id| nodes[id].dependencies.is_empty())
            .collect();

        // Kahn's algorithm detects cycles.
        let mut remaining: Vec<usize> = nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut queue: Vec<NodeId> = leaves.clone();
        let mut visited = 0usize;
        while let Some(id) = queue.pop() {
            visited += 1;
            for &dependent in &nodes[id].dependents {
                // dependents are deduplicated; subtract every edge.
                let edges = nodes[dependent]
                    .dependencies
                    .iter()
                    .filter(|&&d| d == id)
                    .count();
                remaining[dependent] -= edges;
                if remaining[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }
        if visited != nodes.len() {
            let stuck = nodes
                .iter()
                .enumerate()
                .find(|(id, _)| remaining[*id] > 0)
                .map(|(_, n)| n.name.clone())
                .unwrap_or_default();
            return Err(PlanError::Cycle(stuck));
        }

        Ok(Plan { nodes, root, leaves })
    }
}
