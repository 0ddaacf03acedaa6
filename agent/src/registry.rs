//! Strategy registry keyed by deployment profile type

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::AgentError;
use crate::models::deployment::ProfileType;

/// Maps profile types to strategy objects.
///
/// Filled at construction; lookups of unregistered types fail with
/// [`AgentError::UnsupportedProfileType`] instead of falling back to a default.
pub struct Registry<S: ?Sized> {
    kind: &'static str,
    strategies: BTreeMap<ProfileType, Arc<S>>,
}

impl<S: ?Sized> Registry<S> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            strategies: BTreeMap::new(),
        }
    }

    /// Register a strategy; a second strategy for the same type is rejected
    pub fn register(&mut self, profile_type: ProfileType, strategy: Arc<S>) -> Result<(), AgentError> {
        if self.strategies.contains_key(&profile_type) {
            return Err(AgentError::ConfigError(format!(
                "{} already registered for profile type '{}'",
                self.kind, profile_type
            )));
        }
        self.strategies.insert(profile_type, strategy);
        Ok(())
    }

    pub fn get(&self, profile_type: &ProfileType) -> Result<Arc<S>, AgentError> {
        self.strategies
            .get(profile_type)
            .cloned()
            .ok_or_else(|| AgentError::UnsupportedProfileType {
                requested: profile_type.to_string(),
                available: self.available(),
            })
    }

    /// Registered profile types, sorted
    pub fn available(&self) -> Vec<String> {
        self.strategies.keys().map(|k| k.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
