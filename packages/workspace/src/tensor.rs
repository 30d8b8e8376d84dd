//! Storage cells and the handles the registry lends out for them.
//!
//! The registry does not care what a cell holds. Anything implementing
//! [`StorageCell`] can be owned by a [`Workspace`](crate::Workspace); the
//! [`Tensor`] type here is a plain host-memory cell used by default.

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bytes::Bytes;

use crate::error::{Result, WorkspaceError};

/// A named, mutable unit of storage.
///
/// Cells are constructed by name the first time a workspace sees that name
/// and live until the workspace is dropped. Releasing a cell only clears its
/// content.
pub trait StorageCell: Send + Sync + 'static {
    /// Construct an empty cell carrying the given canonical name.
    fn with_name(name: &str) -> Self
    where
        Self: Sized;

    /// The canonical name this cell was created under.
    fn name(&self) -> &str;

    /// Drop the cell's content in place.
    fn reset(&mut self);
}

/// Host-memory tensor: a shape and a raw byte payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tensor {
    name: String,
    shape: Vec<usize>,
    data: Bytes,
}

impl Tensor {
    /// The current shape. Empty for a reset tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The current payload.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Replace shape and payload.
    pub fn set(&mut self, shape: Vec<usize>, data: impl Into<Bytes>) {
        self.shape = shape;
        self.data = data.into();
    }

    /// True if the tensor holds no content.
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty() && self.data.is_empty()
    }
}

impl StorageCell for Tensor {
    fn with_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.shape.clear();
        self.data = Bytes::new();
    }
}

/// Shared handle to a cell owned by some workspace's tensor registry.
///
/// Cloning the handle does not clone the cell. Two handles refer to the same
/// cell iff [`TensorRef::ptr_eq`] holds.
pub struct TensorRef<C = Tensor> {
    name: Arc<str>,
    cell: Arc<RwLock<C>>,
}

impl<C: StorageCell> TensorRef<C> {
    pub(crate) fn new(cell: C) -> Self {
        Self {
            name: Arc::from(cell.name()),
            cell: Arc::new(RwLock::new(cell)),
        }
    }

    /// Canonical name of the cell.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared access to the cell.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, C>> {
        self.cell
            .read()
            .map_err(|_| WorkspaceError::poisoned(format!("tensor '{}'", self.name)))
    }

    /// Exclusive access to the cell.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, C>> {
        self.cell
            .write()
            .map_err(|_| WorkspaceError::poisoned(format!("tensor '{}'", self.name)))
    }

    /// Clear the cell's content, keeping its identity.
    pub fn reset(&self) -> Result<()> {
        self.write()?.reset();
        Ok(())
    }

    /// True if both handles point at the same cell.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }
}

impl<C> Clone for TensorRef<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            cell: self.cell.clone(),
        }
    }
}

impl<C> fmt::Debug for TensorRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorRef").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_with_name_is_empty() {
        let t = Tensor::with_name("weights");
        assert_eq!(StorageCell::name(&t), "weights");
        assert!(t.is_empty());
    }

    #[test]
    fn reset_clears_content_but_not_name() {
        let mut t = Tensor::with_name("weights");
        t.set(vec![2, 2], vec![0u8; 16]);
        assert!(!t.is_empty());

        t.reset();
        assert!(t.is_empty());
        assert_eq!(StorageCell::name(&t), "weights");
    }

    #[test]
    fn clones_share_the_cell() {
        let a = TensorRef::new(Tensor::with_name("x"));
        let b = a.clone();
        assert!(TensorRef::ptr_eq(&a, &b));

        a.write().unwrap().set(vec![1], vec![7u8]);
        assert_eq!(b.read().unwrap().shape(), &[1]);

        let other = TensorRef::new(Tensor::with_name("x"));
        assert!(!TensorRef::ptr_eq(&a, &other));
    }

    #[test]
    fn handle_reset() {
        let t = TensorRef::new(Tensor::with_name("x"));
        t.write().unwrap().set(vec![3], vec![1u8, 2, 3]);
        t.reset().unwrap();
        assert!(t.read().unwrap().is_empty());
        assert_eq!(t.name(), "x");
    }

    #[test]
    fn debug_shows_name() {
        let t = TensorRef::new(Tensor::with_name("grad"));
        assert!(format!("{:?}", t).contains("grad"));
    }
}
