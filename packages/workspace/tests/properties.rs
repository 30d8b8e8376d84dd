use dataflow_workspace::{
    buffer_name, ErrorKind, FillerSpec, NameResolver, TensorRef, Workspace, WorkspaceConfig,
};
use proptest::prelude::*;

fn tensor_name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z0-9]{1,4}){0,2}"
}

proptest! {
    /// Without aliases every name is its own canonical name.
    #[test]
    fn prop_resolve_identity(name in ".*") {
        let resolver = NameResolver::new();
        prop_assert_eq!(resolver.resolve(&name), name.as_str());
    }

    /// Creating a name twice hands out the same cell.
    #[test]
    fn prop_create_idempotent(names in prop::collection::vec(tensor_name(), 1..20)) {
        let mut ws = Workspace::new("W");
        for name in &names {
            let first = ws.create_tensor(name).unwrap();
            let second = ws.create_tensor(name).unwrap();
            prop_assert!(TensorRef::ptr_eq(&first, &second));
        }
        let distinct: std::collections::BTreeSet<_> =
            names.iter().filter(|n| n.as_str() != "ignore").collect();
        prop_assert_eq!(ws.tensor_count(), 4 + distinct.len());
    }

    /// Released tensors keep their registry entry.
    #[test]
    fn prop_has_after_release(name in tensor_name()) {
        let mut ws = Workspace::new("W");
        ws.create_tensor(&name).unwrap();
        prop_assert!(ws.has_tensor(&name).unwrap());
        ws.release_tensor(&name).unwrap();
        prop_assert!(ws.has_tensor(&name).unwrap());
    }

    /// A category of capacity K hands out K distinct buffers, then fails.
    #[test]
    fn prop_buffer_capacity(capacity in 0usize..16) {
        let config = WorkspaceConfig::default().with_buffer("Pool", capacity);
        let mut ws: Workspace = Workspace::with_config("W", config);

        let mut acquired: Vec<TensorRef> = Vec::new();
        for _ in 0..capacity {
            let buffer = ws.acquire_buffer("Pool").unwrap();
            prop_assert!(!acquired.iter().any(|b| TensorRef::ptr_eq(b, &buffer)));
            acquired.push(buffer);
        }
        let err = ws.acquire_buffer("Pool").unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Exhausted);

        if capacity > 0 {
            prop_assert_eq!(acquired[0].name(), buffer_name("Pool", capacity));
        }
    }

    /// Releases return buffers in LIFO order and never exceed capacity.
    #[test]
    fn prop_buffer_lifo(capacity in 1usize..8, extra_releases in 0usize..4) {
        let config = WorkspaceConfig::default().with_buffer("Pool", capacity);
        let mut ws: Workspace = Workspace::with_config("W", config);

        let acquired: Vec<_> = (0..capacity)
            .map(|_| ws.acquire_buffer("Pool").unwrap())
            .collect();
        for buffer in &acquired {
            ws.release_buffer(buffer, "Pool", false).unwrap();
        }
        for i in 0..extra_releases {
            let t = ws.create_tensor(&format!("scratch{}", i)).unwrap();
            ws.release_buffer(&t, "Pool", false).unwrap();
        }
        prop_assert_eq!(ws.available_buffers("Pool"), Some(capacity));

        let last = acquired.last().unwrap();
        prop_assert!(TensorRef::ptr_eq(&ws.acquire_buffer("Pool").unwrap(), last));
    }

    /// Only the first filler registered for a tensor is kept.
    #[test]
    fn prop_filler_write_once(name in tensor_name(), first in -10.0f32..10.0, second in -10.0f32..10.0) {
        let mut ws = Workspace::new("W");
        prop_assert!(ws.register_filler(FillerSpec::constant(name.clone(), first)).unwrap());
        prop_assert!(!ws.register_filler(FillerSpec::constant(name.clone(), second)).unwrap());
        prop_assert_eq!(ws.filler(&name), Some(&FillerSpec::constant(name.clone(), first)));
    }
}
