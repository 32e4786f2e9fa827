//! # Interface Overlay
//!
//! Per-instance `InterfaceId → bool` map. An absent entry means "ask the
//! parent"; the fallback walk itself lives in [`crate::Registry::supports_interface`].

use crate::InterfaceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Explicit interface-support answers of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceOverlay {
    entries: BTreeMap<InterfaceId, bool>,
}

impl InterfaceOverlay {
    /// Create an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Local answer for an interface id, if any.
    #[must_use]
    pub fn get(&self, id: InterfaceId) -> Option<bool> {
        self.entries.get(&id).copied()
    }

    /// Set or clear one entry, returning the previous value.
    pub fn set(&mut self, id: InterfaceId, value: Option<bool>) -> Option<bool> {
        match value {
            Some(enabled) => self.entries.insert(id, enabled),
            None => self.entries.remove(&id),
        }
    }

    /// Number of explicit entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no explicit entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All explicit entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (InterfaceId, bool)> + '_ {
        self.entries.iter().map(|(id, enabled)| (*id, *enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_false_is_distinct_from_absent() {
        let mut overlay = InterfaceOverlay::new();
        let id = InterfaceId::from_u32(0xdead_beef);

        assert_eq!(overlay.get(id), None);
        overlay.set(id, Some(false));
        assert_eq!(overlay.get(id), Some(false));
        assert_eq!(overlay.set(id, None), Some(false));
        assert!(overlay.is_empty());
    }
}
