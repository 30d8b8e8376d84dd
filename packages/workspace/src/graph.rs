//! Compiled graphs and the registry that owns them.
//!
//! Compiling and executing graphs is the job of an external engine. This
//! module only fixes the seams: a [`GraphDef`] goes into a [`GraphFactory`],
//! the resulting [`Graph`] is owned by the workspace that compiled it, and
//! running it hands the graph that same workspace so it can create, fetch
//! and pool tensors while it executes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::tensor::{StorageCell, Tensor};
use crate::workspace::Workspace;

/// One operator of a graph definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// A graph definition as produced by a frontend.
///
/// Only `name` means anything to the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    pub name: String,
    #[serde(default)]
    pub operators: Vec<OperatorDef>,
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,
}

impl GraphDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, op: OperatorDef) -> Self {
        self.operators.push(op);
        self
    }
}

/// Include/exclude filters passed to [`Graph::run`].
///
/// Empty strings disable the respective filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunFilter<'a> {
    pub include: &'a str,
    pub exclude: &'a str,
}

impl<'a> RunFilter<'a> {
    pub fn new(include: &'a str, exclude: &'a str) -> Self {
        Self { include, exclude }
    }

    /// Whether an operator of type `op_type` should run.
    ///
    /// Exclusion wins over inclusion; both match by substring.
    pub fn admits(&self, op_type: &str) -> bool {
        if !self.exclude.is_empty() && op_type.contains(self.exclude) {
            return false;
        }
        self.include.is_empty() || op_type.contains(self.include)
    }
}

/// A compiled, runnable graph.
pub trait Graph<C: StorageCell = Tensor>: Send + Sync {
    /// Execute the operators admitted by `filter`.
    ///
    /// Returns `false` if execution failed.
    fn run(&mut self, workspace: &mut Workspace<C>, filter: &RunFilter<'_>) -> bool;
}

/// Builds graphs from definitions.
pub trait GraphFactory<C: StorageCell = Tensor> {
    /// Compile `def`, creating whatever tensors it needs in `workspace`.
    fn compile(&self, def: &GraphDef, workspace: &mut Workspace<C>) -> Result<Box<dyn Graph<C>>>;
}

/// Index of a graph slot in a [`GraphRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(usize);

/// Owns a workspace's compiled graphs.
///
/// A graph's slot is empty while the graph is checked out for a run.
pub struct GraphRegistry<C: StorageCell> {
    slots: Vec<Option<Box<dyn Graph<C>>>>,
    index: BTreeMap<String, GraphId>,
}

impl<C: StorageCell> Default for GraphRegistry<C> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<C: StorageCell> GraphRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Register `graph` under `name`; an existing name is never replaced.
    pub fn insert(&mut self, name: &str, graph: Box<dyn Graph<C>>) -> Result<GraphId> {
        if self.contains(name) {
            return Err(WorkspaceError::GraphExists {
                name: name.to_string(),
            });
        }
        let id = GraphId(self.slots.len());
        self.slots.push(Some(graph));
        self.index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Take the graph out of its slot so it can run against its workspace.
    pub fn checkout(&mut self, name: &str) -> Result<(GraphId, Box<dyn Graph<C>>)> {
        let id = *self
            .index
            .get(name)
            .ok_or_else(|| WorkspaceError::GraphNotFound {
                name: name.to_string(),
            })?;
        let graph = self.slots[id.0]
            .take()
            .ok_or_else(|| WorkspaceError::GraphRunning {
                name: name.to_string(),
            })?;
        Ok((id, graph))
    }

    /// Put a checked-out graph back.
    pub fn checkin(&mut self, id: GraphId, graph: Box<dyn Graph<C>>) {
        self.slots[id.0] = Some(graph);
    }

    /// Graph names in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
