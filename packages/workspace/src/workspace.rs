//! The workspace facade.
//!
//! A [`Workspace`] composes the per-scope registries over one name
//! namespace. Tensor names pass through the alias table once, at the scope
//! the caller addressed; adopted scopes are then probed with the canonical
//! name as is. Graph and filler names are never aliased.

use std::fmt;

use tracing::{debug, error, warn};

use crate::buffer::{BufferPool, BufferRelease};
use crate::config::WorkspaceConfig;
use crate::error::{Result, WorkspaceError};
use crate::filler::{FillerRegistry, FillerSpec};
use crate::graph::{GraphDef, GraphFactory, GraphId, GraphRegistry, RunFilter};
use crate::lock::{LockRegistry, TensorGuard, TensorLock};
use crate::name::NameResolver;
use crate::registry::{TensorId, TensorRegistry};
use crate::tensor::{StorageCell, Tensor, TensorRef};
use crate::tree::{Adoptions, Ancestry, WeakWorkspace, WorkspaceHandle, WorkspaceId};

/// Which scopes a tensor lookup may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupScope {
    /// Only the addressed workspace.
    Local,
    /// The addressed workspace, then its adopted workspaces in adoption
    /// order, transitively.
    #[default]
    Delegated,
}

/// A named scope of tensors, buffers, locks, fillers and graphs.
///
/// Everything except adopted workspaces is owned exclusively and dropped
/// together with the workspace.
pub struct Workspace<C: StorageCell = Tensor> {
    id: WorkspaceId,
    name: String,
    names: NameResolver,
    tensors: TensorRegistry<C>,
    buffers: BufferPool<C>,
    locks: LockRegistry,
    fillers: FillerRegistry,
    graphs: GraphRegistry<C>,
    adopted: Adoptions<C>,
}

impl Workspace<Tensor> {
    /// Create a host-memory workspace with the default config.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, WorkspaceConfig::default())
    }
}

impl<C: StorageCell> Workspace<C> {
    /// Create a workspace, reserving the sentinel tensor and populating the
    /// configured buffer categories.
    pub fn with_config(name: impl Into<String>, config: WorkspaceConfig) -> Self {
        let mut workspace = Self {
            id: WorkspaceId::new(),
            name: name.into(),
            names: NameResolver::new(),
            tensors: TensorRegistry::new(),
            buffers: BufferPool::new(),
            locks: LockRegistry::new(),
            fillers: FillerRegistry::new(),
            graphs: GraphRegistry::new(),
            adopted: Adoptions::default(),
        };

        if !config.sentinel.is_empty() {
            workspace.tensors.get_or_create(&config.sentinel);
        }
        for (category, capacity) in &config.buffers {
            workspace
                .buffers
                .populate(&mut workspace.tensors, category, *capacity);
        }

        debug!(
            workspace = %workspace.name,
            id = %workspace.id,
            tensors = workspace.tensors.len(),
            "created workspace"
        );
        workspace
    }

    pub fn id(&self) -> WorkspaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move this workspace behind a shared handle so others can adopt it.
    pub fn into_handle(self) -> WorkspaceHandle<C> {
        WorkspaceHandle::new(self)
    }

    fn fatal(&self, err: WorkspaceError) -> WorkspaceError {
        error!(workspace = %self.name, "{}", err);
        err
    }

    // ---- names -------------------------------------------------------------

    /// Canonical name for `name` in this workspace.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.names.resolve(name)
    }

    /// Make `old` resolve to `new`. The last registration for `old` wins.
    pub fn register_alias(&mut self, old: &str, new: &str) -> Result<()> {
        self.names.register(old, new).map_err(|e| self.fatal(e))?;
        debug!(workspace = %self.name, old, new, "registered alias");
        Ok(())
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.aliases()
    }

    // ---- adoption ----------------------------------------------------------

    /// Extend lookups of this workspace into `other`.
    ///
    /// Returns the workspace that is adopted under `other`'s name, which is
    /// an earlier one if that name was taken first. `other` is never kept
    /// alive by this workspace.
    pub fn adopt(&mut self, other: &WorkspaceHandle<C>) -> Result<WorkspaceHandle<C>> {
        self.adopt_weak(&other.downgrade())
    }

    /// Like [`Workspace::adopt`], from a weak reference.
    pub fn adopt_weak(&mut self, other: &WeakWorkspace<C>) -> Result<WorkspaceHandle<C>> {
        let adopted = self.adopted.adopt(other).map_err(|e| self.fatal(e))?;
        if adopted.id() == other.id() {
            debug!(workspace = %self.name, adopted = other.name(), "adopted workspace");
        } else {
            warn!(
                workspace = %self.name,
                adopted = other.name(),
                "a workspace with this name is already adopted, keeping the first"
            );
        }
        Ok(adopted)
    }

    /// Names of adopted workspaces in adoption order, dropped ones included.
    pub fn adopted_names(&self) -> impl Iterator<Item = &str> {
        self.adopted.names()
    }

    fn ancestry(&self) -> Ancestry {
        let mut ancestry = Ancestry::new();
        ancestry.insert(self.id);
        ancestry
    }

    fn find_local_or_adopted(
        &self,
        canonical: &str,
        ancestry: &mut Ancestry,
    ) -> Result<Option<TensorRef<C>>> {
        if let Some(tensor) = self.tensors.get(canonical) {
            return Ok(Some(tensor.clone()));
        }
        self.find_in_adopted(canonical, ancestry)
    }

    fn find_in_adopted(
        &self,
        canonical: &str,
        ancestry: &mut Ancestry,
    ) -> Result<Option<TensorRef<C>>> {
        for scope in self.adopted.walk(ancestry) {
            ancestry.insert(scope.id());
            let found = scope
                .read()
                .and_then(|ws| ws.find_local_or_adopted(canonical, ancestry));
            ancestry.remove(&scope.id());
            if let Some(tensor) = found? {
                return Ok(Some(tensor));
            }
        }
        Ok(None)
    }

    fn collect_names(&self, ancestry: &mut Ancestry, out: &mut Vec<String>) -> Result<()> {
        out.extend(self.tensors.names().map(str::to_string));
        for scope in self.adopted.walk(ancestry) {
            ancestry.insert(scope.id());
            let result = scope
                .read()
                .and_then(|ws| ws.collect_names(ancestry, out));
            ancestry.remove(&scope.id());
            result?;
        }
        Ok(())
    }

    fn lookup(&self, canonical: &str, scope: LookupScope) -> Result<Option<TensorRef<C>>> {
        if let Some(tensor) = self.tensors.get(canonical) {
            return Ok(Some(tensor.clone()));
        }
        match scope {
            LookupScope::Local => Ok(None),
            LookupScope::Delegated => self.find_in_adopted(canonical, &mut self.ancestry()),
        }
    }

    // ---- tensors -----------------------------------------------------------

    /// Whether `name` exists here or in an adopted workspace.
    pub fn has_tensor(&self, name: &str) -> Result<bool> {
        self.has_tensor_in(name, LookupScope::Delegated)
    }

    pub fn has_tensor_in(&self, name: &str, scope: LookupScope) -> Result<bool> {
        Ok(self.lookup(self.resolve(name), scope)?.is_some())
    }

    /// The tensor for `name`, created locally unless some scope already has
    /// it.
    ///
    /// A tensor found only in an adopted workspace is returned as is; no
    /// local copy shadows it.
    pub fn create_tensor(&mut self, name: &str) -> Result<TensorRef<C>> {
        let canonical = self.names.resolve(name).to_string();
        if let Some(tensor) = self.lookup(&canonical, LookupScope::Delegated)? {
            return Ok(tensor);
        }
        debug!(workspace = %self.name, tensor = %canonical, "created tensor");
        Ok(self.tensors.get_or_create(&canonical).clone())
    }

    /// The tensor for `name`, searching adopted workspaces after this one.
    pub fn get_tensor(&self, name: &str) -> Result<TensorRef<C>> {
        self.get_tensor_in(name, LookupScope::Delegated)
    }

    pub fn get_tensor_in(&self, name: &str, scope: LookupScope) -> Result<TensorRef<C>> {
        self.lookup(self.resolve(name), scope)?.ok_or_else(|| {
            self.fatal(WorkspaceError::TensorNotFound {
                name: name.to_string(),
                workspace: self.name.clone(),
            })
        })
    }

    /// Reset the content of a tensor owned by this workspace.
    ///
    /// The entry survives: `has_tensor` stays true afterwards.
    pub fn release_tensor(&self, name: &str) -> Result<()> {
        let canonical = self.resolve(name);
        match self.tensors.get(canonical) {
            Some(tensor) => tensor.reset(),
            None => Err(self.fatal(WorkspaceError::NotLocal {
                name: canonical.to_string(),
                workspace: self.name.clone(),
            })),
        }
    }

    /// Arena index of a local tensor.
    pub fn tensor_id(&self, name: &str) -> Option<TensorId> {
        self.tensors.id(self.resolve(name))
    }

    /// Local tensor names in key order, followed by each adopted
    /// workspace's listing in adoption order. Names are not deduplicated.
    pub fn list_tensors(&self) -> Result<Vec<String>> {
        self.list_tensors_in(LookupScope::Delegated)
    }

    pub fn list_tensors_in(&self, scope: LookupScope) -> Result<Vec<String>> {
        match scope {
            LookupScope::Local => Ok(self.tensors.names().map(str::to_string).collect()),
            LookupScope::Delegated => {
                let mut names = Vec::new();
                self.collect_names(&mut self.ancestry(), &mut names)?;
                Ok(names)
            }
        }
    }

    /// Number of tensors owned by this workspace.
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    // ---- locks -------------------------------------------------------------

    /// The advisory lock of `name`, detached from this workspace.
    pub fn tensor_lock(&mut self, name: &str) -> TensorLock {
        let canonical = self.names.resolve(name);
        self.locks.handle(canonical)
    }

    /// Block until the lock of `name` is held. Not reentrant.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context; take
    /// [`Workspace::tensor_lock`] and await [`TensorLock::lock_async`] there.
    pub fn lock_tensor(&mut self, name: &str) -> TensorGuard {
        self.tensor_lock(name).lock()
    }

    // ---- fillers -----------------------------------------------------------

    /// Store an initializer; returns `false` if its tensor already had one.
    pub fn register_filler(&mut self, spec: FillerSpec) -> Result<bool> {
        self.fillers.register(spec).map_err(|e| self.fatal(e))
    }

    pub fn filler(&self, tensor: &str) -> Option<&FillerSpec> {
        self.fillers.lookup(tensor)
    }

    // ---- buffers -----------------------------------------------------------

    pub fn create_buffer_category(&mut self, category: &str, capacity: usize) -> Result<()> {
        self.buffers
            .create_category(&mut self.tensors, category, capacity)
            .map_err(|e| self.fatal(e))
    }

    pub fn acquire_buffer(&mut self, category: &str) -> Result<TensorRef<C>> {
        let buffer = self.buffers.acquire(category).map_err(|e| self.fatal(e))?;
        debug!(workspace = %self.name, category, tensor = buffer.name(), "acquired buffer");
        Ok(buffer)
    }

    /// Give a buffer back to `category`.
    ///
    /// Fails for tensors this workspace does not own, including same-named
    /// tensors of adopted workspaces.
    pub fn release_buffer(
        &mut self,
        tensor: &TensorRef<C>,
        category: &str,
        enforce: bool,
    ) -> Result<BufferRelease> {
        if self.tensors.owns(tensor).is_none() {
            return Err(self.fatal(WorkspaceError::NotLocal {
                name: tensor.name().to_string(),
                workspace: self.name.clone(),
            }));
        }
        self.buffers
            .release(tensor, category, enforce)
            .map_err(|e| self.fatal(e))
    }

    pub fn available_buffers(&self, category: &str) -> Option<usize> {
        self.buffers.available(category)
    }

    pub fn buffer_capacity(&self, category: &str) -> Option<usize> {
        self.buffers.capacity(category)
    }

    pub fn buffer_categories(&self) -> impl Iterator<Item = &str> {
        self.buffers.categories()
    }

    // ---- graphs ------------------------------------------------------------

    /// Compile `def` with `factory` and register the result under its
    /// declared name.
    pub fn compile_graph<F>(&mut self, factory: &F, def: &GraphDef) -> Result<GraphId>
    where
        F: GraphFactory<C> + ?Sized,
    {
        if self.graphs.contains(&def.name) {
            return Err(self.fatal(WorkspaceError::GraphExists {
                name: def.name.clone(),
            }));
        }
        let graph = factory.compile(def, self).map_err(|e| self.fatal(e))?;
        let id = self
            .graphs
            .insert(&def.name, graph)
            .map_err(|e| self.fatal(e))?;
        debug!(workspace = %self.name, graph = %def.name, "compiled graph");
        Ok(id)
    }

    /// Run the graph registered as `name`.
    ///
    /// Returns `false` without touching any state if no such graph exists or
    /// it is already running; otherwise returns the graph's own result.
    pub fn run_graph(&mut self, name: &str, include: &str, exclude: &str) -> bool {
        let (id, mut graph) = match self.graphs.checkout(name) {
            Ok(checked_out) => checked_out,
            Err(err) => {
                error!(workspace = %self.name, "{}", err);
                return false;
            }
        };
        let succeeded = graph.run(self, &RunFilter::new(include, exclude));
        self.graphs.checkin(id, graph);
        if !succeeded {
            warn!(workspace = %self.name, graph = name, "graph run failed");
        }
        succeeded
    }

    pub fn has_graph(&self, name: &str) -> bool {
        self.graphs.contains(name)
    }

    /// Graph names in key order.
    pub fn list_graphs(&self) -> Vec<String> {
        self.graphs.names().map(str::to_string).collect()
    }
}

impl<C: StorageCell> fmt::Debug for Workspace<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tensors", &self.tensors.len())
            .field("graphs", &self.graphs.len())
            .field("adopted", &self.adopted.len())
            .finish()
    }
}
