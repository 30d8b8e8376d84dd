//! Fixed-capacity pools of scratch tensors.
//!
//! Each category pre-creates its cells when it is created and then only ever
//! hands those cells out again. Exhaustion is an error, not a reason to grow.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, WorkspaceError};
use crate::registry::TensorRegistry;
use crate::tensor::{StorageCell, TensorRef};

/// Name of the `index`-th pre-created buffer of `category` (1-based).
pub fn buffer_name(category: &str, index: usize) -> String {
    format!("_t_{}_buffer_{}", category, index)
}

/// What a buffer release did with the tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRelease {
    /// Pushed back onto the category's stack; the next acquire returns it.
    Pooled,
    /// Content reset and not returned to the pool.
    Reset,
    /// The tensor was already available; nothing changed.
    AlreadyPooled,
}

struct Category<C> {
    capacity: usize,
    available: Vec<TensorRef<C>>,
}

/// Buffer categories of one workspace.
///
/// Every handle on a stack is a cell of the same workspace's
/// [`TensorRegistry`]; the registry never drops cells, so pooled handles stay
/// live.
pub struct BufferPool<C> {
    categories: BTreeMap<String, Category<C>>,
}

impl<C> Default for BufferPool<C> {
    fn default() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }
}

impl<C: StorageCell> BufferPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `category` with `capacity` fresh buffers.
    pub fn create_category(
        &mut self,
        tensors: &mut TensorRegistry<C>,
        category: &str,
        capacity: usize,
    ) -> Result<()> {
        if self.categories.contains_key(category) {
            return Err(WorkspaceError::CategoryExists {
                category: category.to_string(),
            });
        }
        self.populate(tensors, category, capacity);
        Ok(())
    }

    pub(crate) fn populate(
        &mut self,
        tensors: &mut TensorRegistry<C>,
        category: &str,
        capacity: usize,
    ) {
        let available = (1..=capacity)
            .map(|i| tensors.get_or_create(&buffer_name(category, i)).clone())
            .collect();
        debug!(category, capacity, "created buffer category");
        self.categories
            .insert(category.to_string(), Category { capacity, available });
    }

    /// Pop the most recently released (or last created) buffer.
    pub fn acquire(&mut self, category: &str) -> Result<TensorRef<C>> {
        self.category_mut(category)?
            .available
            .pop()
            .ok_or_else(|| WorkspaceError::BufferExhausted {
                category: category.to_string(),
            })
    }

    /// Give a buffer back.
    ///
    /// The caller guarantees `tensor` is a cell of the workspace owning this
    /// pool. When the category is already at capacity, or `enforce` is set,
    /// the tensor's content is reset instead of pooling it. A tensor already
    /// waiting on any category's stack is never pooled a second time.
    pub fn release(
        &mut self,
        tensor: &TensorRef<C>,
        category: &str,
        enforce: bool,
    ) -> Result<BufferRelease> {
        let holder = self.pooled_in(tensor);
        let entry = self.category_mut(category)?;

        if entry.available.len() >= entry.capacity || enforce {
            tensor.reset()?;
            return Ok(BufferRelease::Reset);
        }
        if let Some(holder) = holder {
            warn!(
                category,
                holder = %holder,
                tensor = tensor.name(),
                "buffer released twice, ignoring"
            );
            return Ok(BufferRelease::AlreadyPooled);
        }
        entry.available.push(tensor.clone());
        Ok(BufferRelease::Pooled)
    }

    /// Buffers currently available in `category`.
    pub fn available(&self, category: &str) -> Option<usize> {
        self.categories.get(category).map(|c| c.available.len())
    }

    /// Fixed capacity of `category`.
    pub fn capacity(&self, category: &str) -> Option<usize> {
        self.categories.get(category).map(|c| c.capacity)
    }

    /// Category names in key order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Category whose stack currently holds `tensor`, if any.
    fn pooled_in(&self, tensor: &TensorRef<C>) -> Option<String> {
        self.categories
            .iter()
            .find(|(_, entry)| {
                entry
                    .available
                    .iter()
                    .any(|pooled| TensorRef::ptr_eq(pooled, tensor))
            })
            .map(|(name, _)| name.clone())
    }

    fn category_mut(&mut self, category: &str) -> Result<&mut Category<C>> {
        self.categories
            .get_mut(category)
            .ok_or_else(|| WorkspaceError::UnknownCategory {
                category: category.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Tensor};

    fn pool_with(category: &str, capacity: usize) -> (BufferPool<Tensor>, TensorRegistry<Tensor>) {
        let mut tensors = TensorRegistry::new();
        let mut pool = BufferPool::new();
        pool.create_category(&mut tensors, category, capacity)
            .unwrap();
        (pool, tensors)
    }

    #[test]
    fn buffer_names_are_one_based() {
        assert_eq!(buffer_name("Common", 1), "_t_Common_buffer_1");
        assert_eq!(buffer_name("Grad", 3), "_t_Grad_buffer_3");
    }

    #[test]
    fn create_populates_registry() {
        let (pool, tensors) = pool_with("Common", 3);
        assert_eq!(tensors.len(), 3);
        assert!(tensors.contains("_t_Common_buffer_1"));
        assert!(tensors.contains("_t_Common_buffer_3"));
        assert_eq!(pool.available("Common"), Some(3));
        assert_eq!(pool.capacity("Common"), Some(3));
        assert_eq!(pool.categories().collect::<Vec<_>>(), vec!["Common"]);
    }

    #[test]
    fn duplicate_category_fails_without_overwriting() {
        let (mut pool, mut tensors) = pool_with("Common", 2);
        pool.acquire("Common").unwrap();

        let err = pool
            .create_category(&mut tensors, "Common", 5)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(pool.available("Common"), Some(1));
        assert_eq!(pool.capacity("Common"), Some(2));
        assert_eq!(tensors.len(), 2);
    }

    #[test]
    fn acquire_hands_out_last_created_first() {
        let (mut pool, _tensors) = pool_with("Common", 2);
        assert_eq!(pool.acquire("Common").unwrap().name(), "_t_Common_buffer_2");
        assert_eq!(pool.acquire("Common").unwrap().name(), "_t_Common_buffer_1");

        let err = pool.acquire("Common").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhausted);
    }

    #[test]
    fn unknown_category() {
        let (mut pool, _tensors) = pool_with("Common", 1);
        let err = pool.acquire("Grad").unwrap_err();
        assert!(matches!(err, WorkspaceError::UnknownCategory { .. }));
    }

    #[test]
    fn zero_capacity_category_is_always_exhausted() {
        let (mut pool, tensors) = pool_with("Empty", 0);
        assert!(tensors.is_empty());
        assert_eq!(pool.acquire("Empty").unwrap_err().kind(), ErrorKind::Exhausted);
    }

    #[test]
    fn release_below_capacity_pools_lifo() {
        let (mut pool, _tensors) = pool_with("Common", 2);
        let a = pool.acquire("Common").unwrap();
        let b = pool.acquire("Common").unwrap();

        assert_eq!(
            pool.release(&b, "Common", false).unwrap(),
            BufferRelease::Pooled
        );
        assert_eq!(
            pool.release(&a, "Common", false).unwrap(),
            BufferRelease::Pooled
        );

        let next = pool.acquire("Common").unwrap();
        assert!(TensorRef::ptr_eq(&next, &a));
    }

    #[test]
    fn release_at_capacity_resets() {
        let (mut pool, mut tensors) = pool_with("Common", 1);
        let extra = tensors.get_or_create("scratch").clone();
        extra.write().unwrap().set(vec![1], vec![9u8]);

        assert_eq!(
            pool.release(&extra, "Common", false).unwrap(),
            BufferRelease::Reset
        );
        assert!(extra.read().unwrap().is_empty());
        assert_eq!(pool.available("Common"), Some(1));
    }

    #[test]
    fn enforce_resets_even_with_room() {
        let (mut pool, _tensors) = pool_with("Common", 2);
        let a = pool.acquire("Common").unwrap();
        a.write().unwrap().set(vec![2], vec![1u8, 2]);

        assert_eq!(
            pool.release(&a, "Common", true).unwrap(),
            BufferRelease::Reset
        );
        assert!(a.read().unwrap().is_empty());
        assert_eq!(pool.available("Common"), Some(1));
    }

    #[test]
    fn double_release_does_not_duplicate() {
        let (mut pool, _tensors) = pool_with("Common", 3);
        let a = pool.acquire("Common").unwrap();
        let _b = pool.acquire("Common").unwrap();

        pool.release(&a, "Common", false).unwrap();
        assert_eq!(
            pool.release(&a, "Common", false).unwrap(),
            BufferRelease::AlreadyPooled
        );
        assert_eq!(pool.available("Common"), Some(2));
    }

    #[test]
    fn release_into_other_category_does_not_duplicate() {
        let mut tensors = TensorRegistry::new();
        let mut pool: BufferPool<Tensor> = BufferPool::new();
        pool.create_category(&mut tensors, "Common", 2).unwrap();
        pool.create_category(&mut tensors, "Grad", 1).unwrap();

        let common = pool.acquire("Common").unwrap();
        let _grad = pool.acquire("Grad").unwrap();

        assert_eq!(
            pool.release(&common, "Grad", false).unwrap(),
            BufferRelease::Pooled
        );
        assert_eq!(
            pool.release(&common, "Common", false).unwrap(),
            BufferRelease::AlreadyPooled
        );
        assert_eq!(pool.available("Common"), Some(1));

        let from_common = pool.acquire("Common").unwrap();
        let from_grad = pool.acquire("Grad").unwrap();
        assert!(!TensorRef::ptr_eq(&from_common, &from_grad));
        assert!(TensorRef::ptr_eq(&from_grad, &common));
    }
}
