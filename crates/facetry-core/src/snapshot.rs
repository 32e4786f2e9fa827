//! # Registry Snapshot
//!
//! Serializable image of the persistent registry state: for every instance
//! its owner, parent, facet table, interface overlay and storage.
//!
//! Module code and the event log are not part of a snapshot. Modules are
//! re-deployed by the host before a snapshot is restored.

use crate::instance::{ResolverInstance, Storage};
use crate::interface::InterfaceOverlay;
use crate::table::FacetTable;
use crate::{Address, FacetHandle, InstanceId, InterfaceId, RegistryError, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persistent state of one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    pub owner: Address,
    pub parent: Option<InstanceId>,
    /// Sorted by selector.
    pub selectors: Vec<(Selector, FacetHandle)>,
    /// Sorted by interface id.
    pub interfaces: Vec<(InterfaceId, bool)>,
    /// Sorted by key.
    pub storage: Vec<(Vec<u8>, Vec<u8>)>,
}

impl From<&ResolverInstance> for InstanceRecord {
    fn from(instance: &ResolverInstance) -> Self {
        Self {
            id: instance.id(),
            owner: instance.owner(),
            parent: instance.parent(),
            selectors: instance.table().iter().collect(),
            interfaces: instance.interfaces().iter().collect(),
            storage: instance
                .storage()
                .iter()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .collect(),
        }
    }
}

impl InstanceRecord {
    /// Rebuild the live instance.
    pub(crate) fn to_instance(&self) -> Result<ResolverInstance, RegistryError> {
        let mut table = FacetTable::new();
        for &(selector, facet) in &self.selectors {
            if facet.is_null() {
                return Err(RegistryError::DeserializationError(format!(
                    "instance {} maps {} to the null facet",
                    self.id, selector
                )));
            }
            if table.set(selector, Some(facet)).is_some() {
                return Err(RegistryError::DeserializationError(format!(
                    "instance {} maps {} twice",
                    self.id, selector
                )));
            }
        }

        let mut interfaces = InterfaceOverlay::new();
        for &(id, enabled) in &self.interfaces {
            interfaces.set(id, Some(enabled));
        }

        let mut storage = Storage::new();
        for (key, value) in &self.storage {
            storage.set(key.clone(), Some(value.clone()));
        }

        Ok(ResolverInstance::from_parts(
            self.id,
            self.owner,
            self.parent,
            table,
            interfaces,
            storage,
        ))
    }
}

/// Persistent state of a whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// In arena order: `instances[i].id == InstanceId(i)`.
    pub instances: Vec<InstanceRecord>,
}

impl RegistrySnapshot {
    /// Check the structural invariants of the arena.
    ///
    /// - ids are dense and in order
    /// - every parent precedes its child
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (index, record) in self.instances.iter().enumerate() {
            if record.id.index() != index {
                return Err(RegistryError::DeserializationError(format!(
                    "instance at position {} has id {}",
                    index, record.id
                )));
            }
            if let Some(parent) = record.parent
                && parent >= record.id
            {
                return Err(RegistryError::DeserializationError(format!(
                    "instance {} has parent {} that does not precede it",
                    record.id, parent
                )));
            }
        }
        Ok(())
    }

    /// Every facet handle referenced by any table.
    #[must_use]
    pub fn referenced_modules(&self) -> BTreeSet<FacetHandle> {
        self.instances
            .iter()
            .flat_map(|r| r.selectors.iter().map(|(_, f)| *f))
            .collect()
    }
}

/// BLAKE3 hash of a snapshot's binary encoding, as lowercase hex.
///
/// Only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
pub fn snapshot_hash(snapshot: &RegistrySnapshot) -> Result<String, RegistryError> {
    let bytes = crate::formats::snapshot_to_bytes(snapshot)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
