//! Initialization specs for tensors.
//!
//! The registry only stores these; whatever materializes tensor content
//! reads them back through [`Workspace::filler`](crate::Workspace::filler).
//!
//! Specs serialize as a flat object tagged by `type`:
//!
//! ```json
//! {"tensor": "conv1/weight", "type": "uniform", "low": -1.0, "high": 1.0}
//! {"tensor": "conv1/bias", "type": "constant", "value": 0.0}
//! {"tensor": "data", "type": "placeholder"}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};

/// How a tensor's content should be initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FillerKind {
    /// A trainable tensor with no particular initializer.
    Variable,
    /// Content is fed from outside before each run.
    Placeholder,
    Constant {
        value: f32,
    },
    Uniform {
        low: f32,
        high: f32,
    },
    Normal {
        mean: f32,
        std: f32,
    },
    /// Normal samples clipped to `[low, high]`.
    TruncatedNormal {
        mean: f32,
        std: f32,
        low: f32,
        high: f32,
    },
    Xavier,
    Msra,
}

/// An initializer bound to its target tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillerSpec {
    pub tensor: String,
    #[serde(flatten)]
    pub kind: FillerKind,
}

impl FillerSpec {
    pub fn new(tensor: impl Into<String>, kind: FillerKind) -> Self {
        Self {
            tensor: tensor.into(),
            kind,
        }
    }

    pub fn variable(tensor: impl Into<String>) -> Self {
        Self::new(tensor, FillerKind::Variable)
    }

    pub fn placeholder(tensor: impl Into<String>) -> Self {
        Self::new(tensor, FillerKind::Placeholder)
    }

    pub fn constant(tensor: impl Into<String>, value: f32) -> Self {
        Self::new(tensor, FillerKind::Constant { value })
    }

    pub fn uniform(tensor: impl Into<String>, low: f32, high: f32) -> Self {
        Self::new(tensor, FillerKind::Uniform { low, high })
    }

    pub fn normal(tensor: impl Into<String>, mean: f32, std: f32) -> Self {
        Self::new(tensor, FillerKind::Normal { mean, std })
    }

    /// Same as [`FillerSpec::normal`].
    pub fn gaussian(tensor: impl Into<String>, mean: f32, std: f32) -> Self {
        Self::normal(tensor, mean, std)
    }

    /// Normal clipped to two standard deviations around the mean.
    pub fn truncated_normal(tensor: impl Into<String>, mean: f32, std: f32) -> Self {
        Self::new(
            tensor,
            FillerKind::TruncatedNormal {
                mean,
                std,
                low: mean - 2.0 * std,
                high: mean + 2.0 * std,
            },
        )
    }

    pub fn xavier(tensor: impl Into<String>) -> Self {
        Self::new(tensor, FillerKind::Xavier)
    }

    pub fn msra(tensor: impl Into<String>) -> Self {
        Self::new(tensor, FillerKind::Msra)
    }

    /// Glorot uniform is Xavier.
    pub fn glorot_uniform(tensor: impl Into<String>) -> Self {
        Self::xavier(tensor)
    }

    /// Glorot normal is MSRA.
    pub fn glorot_normal(tensor: impl Into<String>) -> Self {
        Self::msra(tensor)
    }
}

/// Write-once map from tensor name to its filler.
#[derive(Debug, Default)]
pub struct FillerRegistry {
    fillers: BTreeMap<String, FillerSpec>,
}

impl FillerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `spec` unless its tensor already has one.
    ///
    /// Returns whether the spec was stored. A later spec for the same tensor
    /// is dropped without error.
    pub fn register(&mut self, spec: FillerSpec) -> Result<bool> {
        if spec.tensor.is_empty() {
            return Err(WorkspaceError::EmptyFillerTarget);
        }
        if self.fillers.contains_key(&spec.tensor) {
            debug!(tensor = %spec.tensor, "filler already registered, keeping the first");
            return Ok(false);
        }
        self.fillers.insert(spec.tensor.clone(), spec);
        Ok(true)
    }

    pub fn lookup(&self, tensor: &str) -> Option<&FillerSpec> {
        self.fillers.get(tensor)
    }

    pub fn len(&self) -> usize {
        self.fillers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fillers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn first_registration_wins() {
        let mut registry = FillerRegistry::new();
        assert!(registry.register(FillerSpec::constant("bias", 0.0)).unwrap());
        assert!(!registry.register(FillerSpec::constant("bias", 1.0)).unwrap());

        assert_eq!(
            registry.lookup("bias").unwrap().kind,
            FillerKind::Constant { value: 0.0 }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_target_is_rejected() {
        let mut registry = FillerRegistry::new();
        let err = registry.register(FillerSpec::xavier("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_missing_is_none() {
        let registry = FillerRegistry::new();
        assert!(registry.lookup("weight").is_none());
    }

    #[test]
    fn truncated_normal_bounds() {
        let spec = FillerSpec::truncated_normal("w", 1.0, 0.5);
        assert_eq!(
            spec.kind,
            FillerKind::TruncatedNormal {
                mean: 1.0,
                std: 0.5,
                low: 0.0,
                high: 2.0,
            }
        );
    }

    #[test]
    fn glorot_aliases() {
        assert_eq!(FillerSpec::glorot_uniform("w").kind, FillerKind::Xavier);
        assert_eq!(FillerSpec::glorot_normal("w").kind, FillerKind::Msra);
        assert_eq!(
            FillerSpec::gaussian("w", 0.0, 1.0),
            FillerSpec::normal("w", 0.0, 1.0)
        );
    }

    #[test]
    fn json_shape() {
        let spec = FillerSpec::uniform("conv1/weight", -1.0, 1.0);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tensor": "conv1/weight",
                "type": "uniform",
                "low": -1.0,
                "high": 1.0,
            })
        );

        let parsed: FillerSpec =
            serde_json::from_str(r#"{"tensor": "data", "type": "placeholder"}"#).unwrap();
        assert_eq!(parsed, FillerSpec::placeholder("data"));
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let result = serde_json::from_str::<FillerSpec>(r#"{"tensor": "x", "type": "bogus"}"#);
        assert!(result.is_err());
    }
}
