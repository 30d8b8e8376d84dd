//! Arena of storage cells addressed by canonical name.
//!
//! The registry never resolves aliases or looks outside its own workspace;
//! callers hand it canonical names.

use std::collections::BTreeMap;

use crate::tensor::{StorageCell, TensorRef};

/// Index of a cell in a [`TensorRegistry`].
///
/// Ids are never reused: cells live as long as the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(usize);

impl TensorId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Exclusive owner of a workspace's cells.
pub struct TensorRegistry<C> {
    cells: Vec<TensorRef<C>>,
    index: BTreeMap<String, TensorId>,
}

impl<C> Default for TensorRegistry<C> {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            index: BTreeMap::new(),
        }
    }
}

impl<C: StorageCell> TensorRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn id(&self, name: &str) -> Option<TensorId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&TensorRef<C>> {
        self.id(name).and_then(|id| self.by_id(id))
    }

    pub fn by_id(&self, id: TensorId) -> Option<&TensorRef<C>> {
        self.cells.get(id.0)
    }

    /// Return the cell for `name`, creating it if needed.
    pub fn get_or_create(&mut self, name: &str) -> &TensorRef<C> {
        let id = match self.id(name) {
            Some(id) => id,
            None => {
                let id = TensorId(self.cells.len());
                self.cells.push(TensorRef::new(C::with_name(name)));
                self.index.insert(name.to_string(), id);
                id
            }
        };
        &self.cells[id.0]
    }

    /// Id of `tensor` if it is one of this registry's cells.
    ///
    /// A handle from another workspace with the same name does not match.
    pub fn owns(&self, tensor: &TensorRef<C>) -> Option<TensorId> {
        let id = self.id(tensor.name())?;
        let cell = self.by_id(id)?;
        TensorRef::ptr_eq(cell, tensor).then_some(id)
    }

    /// Canonical names in key order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
