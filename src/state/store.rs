//! Variable store - the host-visible state mirrored from the device
//!
//! Every write funnels through [`VariableStore::bulk_apply`], which only
//! reports entries whose value actually changed. Duplicate state reports from
//! the network are therefore idempotent.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Sentinel for a variable the device has not reported yet
pub const SENTINEL_UNKNOWN: i32 = -1;

/// Sentinel for a level or gain variable the device has not reported yet
pub const SENTINEL_LEVEL: i32 = -99;

/// Whether a value marks a variable as not yet initialized from the device
pub fn is_sentinel(value: i32) -> bool {
    value == SENTINEL_UNKNOWN || value == SENTINEL_LEVEL
}

/// Declaration of a variable the host knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub key: String,
    pub name: String,
    pub initial: i32,
}

impl VariableDefinition {
    pub fn new(key: impl Into<String>, name: impl Into<String>, initial: i32) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            initial,
        }
    }
}

/// Current state of one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Display name, fixed at creation
    pub name: String,
    pub value: i32,
}

/// One changed (key, value) pair, as pushed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableUpdate {
    pub key: String,
    pub value: i32,
}

impl VariableUpdate {
    pub fn new(key: impl Into<String>, value: i32) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Mapping from variable key to display name and current value
#[derive(Debug, Default)]
pub struct VariableStore {
    variables: BTreeMap<String, Variable>,
}

impl VariableStore {
    /// Create a store holding each definition at its initial value
    ///
    /// When a key is defined twice the first definition wins.
    pub fn new(definitions: impl IntoIterator<Item = VariableDefinition>) -> Self {
        let mut store = Self::default();
        store.redefine(definitions);
        store
    }

    /// Replace the set of known variables
    ///
    /// Variables present before and after keep their current value, new ones
    /// start at their initial value and the rest are removed.
    pub fn redefine(&mut self, definitions: impl IntoIterator<Item = VariableDefinition>) {
        let mut previous = std::mem::take(&mut self.variables);
        for def in definitions {
            if self.variables.contains_key(&def.key) {
                continue;
            }
            let value = previous
                .remove(&def.key)
                .map(|v| v.value)
                .unwrap_or(def.initial);
            self.variables.insert(
                def.key,
                Variable {
                    name: def.name,
                    value,
                },
            );
        }
        if !previous.is_empty() {
            debug!("Removed {} variables no longer defined", previous.len());
        }
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.variables.get(key).map(|v| v.value)
    }

    pub fn variable(&self, key: &str) -> Option<&Variable> {
        self.variables.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Write a single variable; returns the change if the value differed
    pub fn set(&mut self, key: &str, value: i32) -> Option<VariableUpdate> {
        self.bulk_apply([(key.to_string(), value)]).pop()
    }

    /// Apply a batch of writes and return the subset that changed
    ///
    /// Unknown keys and writes of the current value are skipped.
    pub fn bulk_apply(
        &mut self,
        updates: impl IntoIterator<Item = (String, i32)>,
    ) -> Vec<VariableUpdate> {
        let mut changed = Vec::new();
        for (key, value) in updates {
            match self.variables.get_mut(&key) {
                Some(var) if var.value != value => {
                    var.value = value;
                    changed.push(VariableUpdate { key, value });
                }
                Some(_) => {}
                None => trace!("Skipping write to undefined variable {}", key),
            }
        }
        changed
    }

    /// Keys still holding a sentinel value
    pub fn sentinel_keys(&self) -> impl Iterator<Item = &str> {
        self.variables
            .iter()
            .filter(|(_, v)| is_sentinel(v.value))
            .map(|(k, _)| k.as_str())
    }

    /// Whether any variable has not been initialized from the device
    pub fn has_sentinels(&self) -> bool {
        self.sentinel_keys().next().is_some()
    }

    /// Copy of every variable, ordered by key
    pub fn snapshot(&self) -> Vec<(String, Variable)> {
        self.variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
