//! Dataflow Workspace: a hierarchical registry of named resources
//!
//! A [`Workspace`] backs the execution of dataflow graphs. Within one scope it
//! owns:
//! - storage cells ("tensors"), at most one per canonical name
//! - fixed-capacity pools of scratch buffers, reused before anything new is
//!   handed out
//! - an alias table applied to tensor names
//! - advisory per-tensor locks
//! - initializer specs ("fillers")
//! - compiled graphs, run by name
//!
//! Workspaces can adopt other workspaces through weak edges; tensor lookups
//! then continue into the adopted scopes in adoption order.
//!
//! # Example
//!
//! ```rust
//! use dataflow_workspace::{Workspace, COMMON_CATEGORY};
//!
//! let shared = Workspace::new("shared").into_handle();
//! shared.write().unwrap().create_tensor("embedding").unwrap();
//!
//! let mut ws = Workspace::new("train");
//! ws.adopt(&shared).unwrap();
//! assert!(ws.has_tensor("embedding").unwrap());
//!
//! let scratch = ws.acquire_buffer(COMMON_CATEGORY).unwrap();
//! ws.release_buffer(&scratch, COMMON_CATEGORY, false).unwrap();
//! ```

pub use bytes::Bytes;

mod buffer;
mod config;
mod error;
mod filler;
mod graph;
mod lock;
mod name;
mod registry;
mod tensor;
mod tree;
mod workspace;

pub use buffer::{buffer_name, BufferPool, BufferRelease};
pub use config::{
    WorkspaceConfig, COMMON_BUFFER_CAPACITY, COMMON_CATEGORY, GRAD_BUFFER_CAPACITY,
    GRAD_CATEGORY, SENTINEL_TENSOR,
};
pub use error::{ErrorKind, Result, WorkspaceError};
pub use filler::{FillerKind, FillerRegistry, FillerSpec};
pub use graph::{Graph, GraphDef, GraphFactory, GraphId, GraphRegistry, OperatorDef, RunFilter};
pub use lock::{LockRegistry, TensorGuard, TensorLock};
pub use name::NameResolver;
pub use registry::{TensorId, TensorRegistry};
pub use tensor::{StorageCell, Tensor, TensorRef};
pub use tree::{WeakWorkspace, WorkspaceHandle, WorkspaceId};
pub use workspace::{LookupScope, Workspace};
