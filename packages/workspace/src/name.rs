//! Alias table applied to every tensor name before lookup.

use std::collections::BTreeMap;

use crate::error::{Result, WorkspaceError};

/// Single-hop alias table.
///
/// `resolve` never chases an alias target further, so registrations that
/// would need a second hop are rejected up front.
#[derive(Debug, Default, Clone)]
pub struct NameResolver {
    aliases: BTreeMap<String, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a requested name to its canonical name.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Point `old` at `new`, replacing any earlier target for `old`.
    ///
    /// Unlike fillers and adoption, the last registration wins here.
    /// Registering `old == new` removes the alias.
    pub fn register(&mut self, old: &str, new: &str) -> Result<()> {
        if old == new {
            self.aliases.remove(old);
            return Ok(());
        }
        let target_is_alias = self.aliases.contains_key(new);
        let key_is_target = self.aliases.values().any(|target| target == old);
        if target_is_alias || key_is_target {
            return Err(WorkspaceError::AliasChain {
                old: old.to_string(),
                new: new.to_string(),
            });
        }
        self.aliases.insert(old.to_string(), new.to_string());
        Ok(())
    }

    /// All `(old, new)` pairs, sorted by `old`.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
