//! # Resolver Instances
//!
//! A [`ResolverInstance`] is one node of the fallback chain. It owns its
//! local [`FacetTable`], its [`InterfaceOverlay`] and the [`Storage`] that
//! every facet attached to it reads and writes.
//!
//! Owner and parent are fixed at construction. Instances live in an
//! append-only arena inside the registry and a parent always has a smaller
//! id than its children, so the chain cannot form a cycle.

use crate::interface::InterfaceOverlay;
use crate::table::FacetTable;
use crate::{Address, InstanceId, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// STORAGE
// =============================================================================

/// Byte-keyed state of one instance.
///
/// Facets are shared code; this is the only place their data lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Storage {
    slots: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Storage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one slot.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.slots.get(key).map(Vec::as_slice)
    }

    /// Write or clear one slot, returning the previous value.
    pub fn set(&mut self, key: Vec<u8>, value: Option<Vec<u8>>) -> Option<Vec<u8>> {
        match value {
            Some(bytes) => self.slots.insert(key, bytes),
            None => self.slots.remove(&key),
        }
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no slot is occupied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.slots.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

// =============================================================================
// CALL GUARD
// =============================================================================

/// Per-instance re-entrancy state.
///
/// Volatile: never persisted, always idle between external calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CallGuard {
    /// Dispatches into this instance currently on the stack.
    pub active_calls: u32,
    /// A cut batch for this instance is in progress.
    pub cutting: bool,
}

impl CallGuard {
    /// Whether a cut must be refused right now.
    pub fn is_busy(&self) -> bool {
        self.active_calls > 0 || self.cutting
    }
}

// =============================================================================
// INSTANCE
// =============================================================================

/// One resolver in the fallback chain.
#[derive(Debug, Clone)]
pub struct ResolverInstance {
    id: InstanceId,
    owner: Address,
    parent: Option<InstanceId>,
    pub(crate) table: FacetTable,
    pub(crate) interfaces: InterfaceOverlay,
    pub(crate) storage: Storage,
    pub(crate) guard: CallGuard,
}

impl ResolverInstance {
    /// Create an instance with empty local state.
    pub(crate) fn new(id: InstanceId, owner: Address, parent: Option<InstanceId>) -> Self {
        Self {
            id,
            owner,
            parent,
            table: FacetTable::new(),
            interfaces: InterfaceOverlay::new(),
            storage: Storage::new(),
            guard: CallGuard::default(),
        }
    }

    /// Rebuild an instance from persisted parts.
    pub(crate) fn from_parts(
        id: InstanceId,
        owner: Address,
        parent: Option<InstanceId>,
        table: FacetTable,
        interfaces: InterfaceOverlay,
        storage: Storage,
    ) -> Self {
        Self {
            id,
            owner,
            parent,
            table,
            interfaces,
            storage,
            guard: CallGuard::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The identity that may always mutate this instance.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The fallback parent, if any.
    #[must_use]
    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    /// Resource node handed to the authorization gate for this instance.
    #[must_use]
    pub fn node(&self) -> Node {
        Node::for_instance(self.id)
    }

    #[must_use]
    pub fn table(&self) -> &FacetTable {
        &self.table
    }

    #[must_use]
    pub fn interfaces(&self) -> &InterfaceOverlay {
        &self.interfaces
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_set_returns_previous() {
        let mut storage = Storage::new();
        assert_eq!(storage.set(b"k".to_vec(), Some(b"v1".to_vec())), None);
        assert_eq!(
            storage.set(b"k".to_vec(), Some(b"v2".to_vec())),
            Some(b"v1".to_vec())
        );
        assert_eq!(storage.get(b"k"), Some(&b"v2"[..]));
        assert_eq!(storage.set(b"k".to_vec(), None), Some(b"v2".to_vec()));
        assert!(storage.is_empty());
    }

    #[test]
    fn guard_busy_while_calls_active() {
        let mut guard = CallGuard::default();
        assert!(!guard.is_busy());
        guard.active_calls = 1;
        assert!(guard.is_busy());
        guard.active_calls = 0;
        guard.cutting = true;
        assert!(guard.is_busy());
    }

    #[test]
    fn new_instance_is_empty() {
        let instance = ResolverInstance::new(InstanceId(3), Address::from_low_u64(1), Some(InstanceId(0)));
        assert!(instance.table().is_empty());
        assert!(instance.interfaces().is_empty());
        assert!(instance.storage().is_empty());
        assert_eq!(instance.parent(), Some(InstanceId(0)));
        assert_eq!(instance.node(), Node::for_instance(InstanceId(3)));
    }
}
