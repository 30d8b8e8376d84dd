//! Construction-time configuration for a workspace.

use std::collections::BTreeMap;

use collection_literals::btree;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tensor every workspace reserves on construction.
pub const SENTINEL_TENSOR: &str = "ignore";

/// General-purpose scratch buffers.
pub const COMMON_CATEGORY: &str = "Common";

/// Gradient scratch buffers.
pub const GRAD_CATEGORY: &str = "Grad";

pub const COMMON_BUFFER_CAPACITY: usize = 2;
pub const GRAD_BUFFER_CAPACITY: usize = 1;

/// What a new workspace creates before it is handed to the caller.
///
/// Missing fields fall back to the defaults, so
/// `{"buffers": {"Common": 4, "Grad": 2}}` is a complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Reserved tensor created up front. Empty disables it.
    pub sentinel: String,
    /// Buffer categories and their fixed capacities.
    pub buffers: BTreeMap<String, usize>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            sentinel: SENTINEL_TENSOR.to_string(),
            buffers: btree! {
                COMMON_CATEGORY.to_string() => COMMON_BUFFER_CAPACITY,
                GRAD_CATEGORY.to_string() => GRAD_BUFFER_CAPACITY,
            },
        }
    }
}

impl WorkspaceConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the capacity of one category, adding it if needed.
    pub fn with_buffer(mut self, category: impl Into<String>, capacity: usize) -> Self {
        self.buffers.insert(category.into(), capacity);
        self
    }
}
