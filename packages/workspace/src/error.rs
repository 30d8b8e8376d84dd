//! Error types for the workspace registry.

use thiserror::Error;

/// Broad classification of a [`WorkspaceError`].
///
/// Call sites branch on the kind rather than on individual variants when they
/// only care whether something was missing, used up, duplicated, or misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A named entity does not exist where the caller required it.
    NotFound,
    /// A bounded pool has nothing left to hand out.
    Exhausted,
    /// A create-once entity was created a second time.
    AlreadyExists,
    /// The caller broke a precondition of the registry.
    InvariantViolation,
}

/// Errors raised by a [`Workspace`](crate::Workspace).
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No tensor with this canonical name exists locally or in adopted scopes.
    #[error("tensor '{name}' does not exist in workspace '{workspace}' or its adopted workspaces")]
    TensorNotFound { name: String, workspace: String },

    /// The tensor exists, but not in the workspace asked to release it.
    #[error("tensor '{name}' does not belong to workspace '{workspace}', could not release it")]
    NotLocal { name: String, workspace: String },

    /// Every buffer of the category is currently handed out.
    #[error("buffers of category '{category}' are exhausted, add more if necessary")]
    BufferExhausted { category: String },

    /// The buffer category was never created.
    #[error("buffer category '{category}' does not exist")]
    UnknownCategory { category: String },

    /// The buffer category was already created.
    #[error("buffer category '{category}' already exists")]
    CategoryExists { category: String },

    /// A graph with this declared name is already registered.
    #[error("graph '{name}' already exists")]
    GraphExists { name: String },

    /// No graph is registered under this name.
    #[error("graph '{name}' does not exist")]
    GraphNotFound { name: String },

    /// The graph is executing further up the call stack.
    #[error("graph '{name}' is already running")]
    GraphRunning { name: String },

    /// The graph factory refused the definition.
    #[error("failed to compile graph '{name}': {message}")]
    Compile { name: String, message: String },

    /// A filler spec was registered without a target tensor.
    #[error("tensor without a valid name can not be filled")]
    EmptyFillerTarget,

    /// The alias would require more than one hop to resolve.
    #[error("alias '{old}' -> '{new}' would chain through another alias")]
    AliasChain { old: String, new: String },

    /// The workspace offered for adoption has already been dropped.
    #[error("workspace '{name}' is no longer alive")]
    DeadWorkspace { name: String },

    /// A lock guarding shared state was poisoned by a panicking holder.
    #[error("lock poisoned: {what}")]
    Poisoned { what: String },

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl WorkspaceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::TensorNotFound { .. }
            | WorkspaceError::NotLocal { .. }
            | WorkspaceError::UnknownCategory { .. }
            | WorkspaceError::GraphNotFound { .. } => ErrorKind::NotFound,
            WorkspaceError::BufferExhausted { .. } => ErrorKind::Exhausted,
            WorkspaceError::CategoryExists { .. } | WorkspaceError::GraphExists { .. } => {
                ErrorKind::AlreadyExists
            }
            WorkspaceError::GraphRunning { .. }
            | WorkspaceError::Compile { .. }
            | WorkspaceError::EmptyFillerTarget
            | WorkspaceError::AliasChain { .. }
            | WorkspaceError::DeadWorkspace { .. }
            | WorkspaceError::Poisoned { .. }
            | WorkspaceError::Config(_) => ErrorKind::InvariantViolation,
        }
    }

    /// Whether this error marks a caller bug rather than an operational
    /// condition the caller is expected to react to.
    ///
    /// Graph lookups are the only soft failures: a graph may simply not have
    /// been compiled yet.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            WorkspaceError::GraphNotFound { .. } | WorkspaceError::GraphRunning { .. }
        )
    }

    pub(crate) fn poisoned(what: impl Into<String>) -> Self {
        WorkspaceError::Poisoned { what: what.into() }
    }
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_not_found_display() {
        let e = WorkspaceError::TensorNotFound {
            name: "data".to_string(),
            workspace: "W".to_string(),
        };
        let display = format!("{}", e);
        assert!(display.contains("data"));
        assert!(display.contains("'W'"));
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn exhausted_display() {
        let e = WorkspaceError::BufferExhausted {
            category: "Common".to_string(),
        };
        assert!(format!("{}", e).contains("Common"));
        assert_eq!(e.kind(), ErrorKind::Exhausted);
    }

    #[test]
    fn duplicates_are_already_exists() {
        let e = WorkspaceError::CategoryExists {
            category: "Grad".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::AlreadyExists);

        let e = WorkspaceError::GraphExists {
            name: "train".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn only_graph_lookups_are_soft() {
        assert!(!WorkspaceError::GraphNotFound {
            name: "g".to_string()
        }
        .is_fatal());
        assert!(!WorkspaceError::GraphRunning {
            name: "g".to_string()
        }
        .is_fatal());
        assert!(WorkspaceError::EmptyFillerTarget.is_fatal());
        assert!(WorkspaceError::NotLocal {
            name: "t".to_string(),
            workspace: "W".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn config_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let e: WorkspaceError = json_err.into();
        assert!(matches!(e, WorkspaceError::Config(_)));
        assert_eq!(e.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn poisoned_display() {
        let e = WorkspaceError::poisoned("tensor 'x'");
        assert_eq!(format!("{}", e), "lock poisoned: tensor 'x'");
    }
}
