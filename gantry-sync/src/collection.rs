//! Ordered, name-deduplicated set of components.
//!
//! Every query re-reads the filesystem; remote-aware queries re-query the
//! store. Nothing is cached between calls.

use gantry_core::types::ComponentKind;

use crate::component::{Component, LocalState};
use crate::error::EngineError;
use crate::remote::Reconciler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentCollection {
    items: Vec<Component>,
}

impl ComponentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `component` unless one with the same kind and name is already
    /// present. Returns whether it was added.
    pub fn push(&mut self, component: Component) -> bool {
        let duplicate = self
            .items
            .iter()
            .any(|c| c.kind() == component.kind() && c.name() == component.name());
        if duplicate {
            return false;
        }
        self.items.push(component);
        true
    }

    pub fn extend(&mut self, other: ComponentCollection) {
        for component in other.items {
            self.push(component);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.items.iter()
    }

    /// Only the components of `kind`, order preserved.
    pub fn of_kind(&self, kind: ComponentKind) -> ComponentCollection {
        self.iter().filter(|c| c.kind() == kind).cloned().collect()
    }

    /// Components with edits in progress.
    pub fn unlocked(&self) -> Result<Vec<&Component>, EngineError> {
        self.with_local_state(LocalState::Unlocked)
    }

    pub fn locked(&self) -> Result<Vec<&Component>, EngineError> {
        self.with_local_state(LocalState::Locked)
    }

    /// Locked components whose persisted version is not yet published.
    pub fn deployable(&self, reconciler: &Reconciler) -> Result<Vec<&Component>, EngineError> {
        let mut deployable = Vec::new();
        for component in &self.items {
            if component.status(reconciler)?.is_deployable() {
                deployable.push(component);
            }
        }
        Ok(deployable)
    }

    pub fn are_locked(&self) -> Result<bool, EngineError> {
        Ok(self.unlocked()?.is_empty())
    }

    /// True when every module's artifact matches its sources. Jobs count as
    /// packaged.
    pub fn are_packaged(&self) -> Result<bool, EngineError> {
        Ok(self.not_packaged()?.is_empty())
    }

    pub fn not_packaged(&self) -> Result<Vec<&Component>, EngineError> {
        let mut missing = Vec::new();
        for component in &self.items {
            if !component.is_packaged()? {
                missing.push(component);
            }
        }
        Ok(missing)
    }

    /// True when every component is locked and published at its persisted
    /// version.
    pub fn are_in_sync(&self, reconciler: &Reconciler) -> Result<bool, EngineError> {
        for component in &self.items {
            if !component.status(reconciler)?.is_in_sync() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn with_local_state(&self, state: LocalState) -> Result<Vec<&Component>, EngineError> {
        let mut matching = Vec::new();
        for component in &self.items {
            if component.local_state()? == state {
                matching.push(component);
            }
        }
        Ok(matching)
    }
}

impl FromIterator<Component> for ComponentCollection {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        let mut collection = ComponentCollection::new();
        for component in iter {
            collection.push(component);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a ComponentCollection {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
