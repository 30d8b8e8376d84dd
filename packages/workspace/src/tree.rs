//! Shared workspace handles and the adoption edges between workspaces.
//!
//! A workspace can adopt other workspaces to extend its lookups. Adoption is
//! a weak edge: the adopting workspace never keeps an adopted one alive, and
//! an edge whose target has been dropped is skipped.
//!
//! Edges may form cycles (a workspace may even adopt itself). Every walk over
//! the edges carries the set of workspaces on the current path and skips
//! those, so lookups always terminate and never lock a workspace twice.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, WorkspaceError};
use crate::tensor::{StorageCell, Tensor};
use crate::workspace::Workspace;

/// Identity of one workspace instance.
///
/// Names are not unique: two live workspaces may share a name, and adoption
/// keys edges by name. Lookups track the workspaces on their path by this id
/// instead, so a replacement workspace under an old name is a different scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    /// Draw the id for a workspace being constructed.
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workspaces on the current lookup path.
pub(crate) type Ancestry = HashSet<WorkspaceId>;

/// Shared ownership of a workspace.
///
/// This is what other workspaces adopt. The id and name are kept outside the
/// lock so edges can be compared without touching the workspace itself.
pub struct WorkspaceHandle<C: StorageCell = Tensor> {
    id: WorkspaceId,
    name: Arc<str>,
    inner: Arc<RwLock<Workspace<C>>>,
}

impl<C: StorageCell> WorkspaceHandle<C> {
    pub fn new(workspace: Workspace<C>) -> Self {
        Self {
            id: workspace.id(),
            name: Arc::from(workspace.name()),
            inner: Arc::new(RwLock::new(workspace)),
        }
    }

    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, Workspace<C>>> {
        self.inner
            .read()
            .map_err(|_| WorkspaceError::poisoned(format!("workspace '{}'", self.name)))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Workspace<C>>> {
        self.inner
            .write()
            .map_err(|_| WorkspaceError::poisoned(format!("workspace '{}'", self.name)))
    }

    /// A non-owning reference to this workspace.
    pub fn downgrade(&self) -> WeakWorkspace<C> {
        WeakWorkspace {
            id: self.id,
            name: self.name.clone(),
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same workspace.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<C: StorageCell> Clone for WorkspaceHandle<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<C: StorageCell> fmt::Debug for WorkspaceHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Non-owning reference to a workspace.
pub struct WeakWorkspace<C: StorageCell = Tensor> {
    id: WorkspaceId,
    name: Arc<str>,
    inner: Weak<RwLock<Workspace<C>>>,
}

impl<C: StorageCell> WeakWorkspace<C> {
    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The workspace, if it is still alive.
    pub fn upgrade(&self) -> Option<WorkspaceHandle<C>> {
        self.inner.upgrade().map(|inner| WorkspaceHandle {
            id: self.id,
            name: self.name.clone(),
            inner,
        })
    }
}

impl<C: StorageCell> Clone for WeakWorkspace<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<C: StorageCell> fmt::Debug for WeakWorkspace<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakWorkspace")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Adoption edges of one workspace, in adoption order.
pub(crate) struct Adoptions<C: StorageCell> {
    edges: Vec<WeakWorkspace<C>>,
}

impl<C: StorageCell> Default for Adoptions<C> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

impl<C: StorageCell> Adoptions<C> {
    /// Add an edge to `other` unless a live workspace of the same name is
    /// already adopted, in which case that one is returned.
    ///
    /// An edge whose workspace has been dropped is replaced in place, keeping
    /// its position in the lookup order.
    pub fn adopt(&mut self, other: &WeakWorkspace<C>) -> Result<WorkspaceHandle<C>> {
        let adopted = other.upgrade().ok_or_else(|| WorkspaceError::DeadWorkspace {
            name: other.name().to_string(),
        })?;

        match self.edges.iter().position(|edge| edge.name() == other.name()) {
            Some(pos) => match self.edges[pos].upgrade() {
                Some(existing) => Ok(existing),
                None => {
                    debug!(workspace = other.name(), "replacing dropped adoption");
                    self.edges[pos] = other.clone();
                    Ok(adopted)
                }
            },
            None => {
                self.edges.push(other.clone());
                Ok(adopted)
            }
        }
    }

    /// Live adopted workspaces not already on the lookup path, in adoption
    /// order.
    pub fn walk(&self, ancestry: &Ancestry) -> Vec<WorkspaceHandle<C>> {
        self.edges
            .iter()
            .filter(|edge| !ancestry.contains(&edge.id()))
            .filter_map(|edge| {
                let live = edge.upgrade();
                if live.is_none() {
                    debug!(workspace = edge.name(), "skipping dropped adoption");
                }
                live
            })
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.edges.iter().map(WeakWorkspace::name)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }
}
