//! # redb-backed Registry Storage
//!
//! Persists [`RegistrySnapshot`]s in a redb embedded database:
//! - ACID transactions: a save is one write transaction
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! | Table | Key | Value |
//! |---|---|---|
//! | `instances` | instance id | postcard `(owner, parent)` |
//! | `selectors` | `(instance, selector)` | 20-byte facet handle |
//! | `interfaces` | `(instance, interface id)` | enabled |
//! | `storage` | `(instance, slot key)` | slot value |
//! | `metadata` | name | u64 |

use crate::snapshot::{InstanceRecord, RegistrySnapshot};
use crate::{Address, FacetHandle, InstanceId, InterfaceId, RegistryError, Selector, primitives};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

/// Instance id -> postcard `(Address, Option<InstanceId>)`.
const INSTANCES: TableDefinition<u64, &[u8]> = TableDefinition::new("instances");

/// (instance, selector) -> facet handle bytes.
const SELECTORS: TableDefinition<(u64, u32), &[u8]> = TableDefinition::new("selectors");

/// (instance, interface id) -> enabled.
const INTERFACES: TableDefinition<(u64, u32), bool> = TableDefinition::new("interfaces");

/// (instance, slot key) -> slot value.
const STORAGE: TableDefinition<(u64, &[u8]), &[u8]> = TableDefinition::new("storage");

/// Metadata: key string -> value u64.
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const META_VERSION: &str = "format_version";
const META_INSTANCES: &str = "instance_count";

fn io_err(e: impl std::fmt::Display) -> RegistryError {
    RegistryError::IoError(e.to_string())
}

/// A registry snapshot store backed by redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(INSTANCES).map_err(io_err)?;
            let _ = write_txn.open_table(SELECTORS).map_err(io_err)?;
            let _ = write_txn.open_table(INTERFACES).map_err(io_err)?;
            let _ = write_txn.open_table(STORAGE).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Replace the stored state with `snapshot` in one transaction.
    pub fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut instances = write_txn.open_table(INSTANCES).map_err(io_err)?;
            let mut selectors = write_txn.open_table(SELECTORS).map_err(io_err)?;
            let mut interfaces = write_txn.open_table(INTERFACES).map_err(io_err)?;
            let mut storage = write_txn.open_table(STORAGE).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            instances.retain(|_, _| false).map_err(io_err)?;
            selectors.retain(|_, _| false).map_err(io_err)?;
            interfaces.retain(|_, _| false).map_err(io_err)?;
            storage.retain(|_, _| false).map_err(io_err)?;

            for record in &snapshot.instances {
                let id = record.id.0;
                let header = postcard::to_stdvec(&(record.owner, record.parent))
                    .map_err(|e| RegistryError::SerializationError(e.to_string()))?;
                instances.insert(id, header.as_slice()).map_err(io_err)?;

                for (selector, facet) in &record.selectors {
                    selectors
                        .insert((id, selector.to_u32()), facet.0.0.as_slice())
                        .map_err(io_err)?;
                }
                for (iid, enabled) in &record.interfaces {
                    interfaces
                        .insert((id, iid.to_u32()), *enabled)
                        .map_err(io_err)?;
                }
                for (key, value) in &record.storage {
                    storage
                        .insert((id, key.as_slice()), value.as_slice())
                        .map_err(io_err)?;
                }
            }

            meta.insert(META_VERSION, u64::from(primitives::FORMAT_VERSION))
                .map_err(io_err)?;
            meta.insert(META_INSTANCES, snapshot.instances.len() as u64)
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        tracing::debug!(instances = snapshot.instances.len(), "snapshot saved");
        Ok(())
    }

    /// Load the stored state, or `None` if nothing was ever saved.
    pub fn load(&self) -> Result<Option<RegistrySnapshot>, RegistryError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;

        let meta = read_txn.open_table(METADATA).map_err(io_err)?;
        let Some(version) = meta.get(META_VERSION).map_err(io_err)?.map(|v| v.value()) else {
            return Ok(None);
        };
        if version != u64::from(primitives::FORMAT_VERSION) {
            return Err(RegistryError::DeserializationError(format!(
                "Unsupported store version: {} (expected {})",
                version,
                primitives::FORMAT_VERSION
            )));
        }

        let mut records: Vec<InstanceRecord> = Vec::new();
        let instances = read_txn.open_table(INSTANCES).map_err(io_err)?;
        for entry in instances.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (owner, parent): (Address, Option<InstanceId>) = postcard::from_bytes(value.value())
                .map_err(|e| RegistryError::DeserializationError(e.to_string()))?;
            records.push(InstanceRecord {
                id: InstanceId(key.value()),
                owner,
                parent,
                selectors: Vec::new(),
                interfaces: Vec::new(),
                storage: Vec::new(),
            });
        }

        let selectors = read_txn.open_table(SELECTORS).map_err(io_err)?;
        for entry in selectors.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (id, selector) = key.value();
            let handle: [u8; 20] = value.value().try_into().map_err(|_| {
                RegistryError::DeserializationError(format!(
                    "facet handle of instance {} has wrong width",
                    id
                ))
            })?;
            record_mut(&mut records, id)?
                .selectors
                .push((Selector::from_u32(selector), FacetHandle(Address(handle))));
        }

        let interfaces = read_txn.open_table(INTERFACES).map_err(io_err)?;
        for entry in interfaces.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (id, iid) = key.value();
            record_mut(&mut records, id)?
                .interfaces
                .push((InterfaceId::from_u32(iid), value.value()));
        }

        let storage = read_txn.open_table(STORAGE).map_err(io_err)?;
        for entry in storage.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (id, slot) = key.value();
            record_mut(&mut records, id)?
                .storage
                .push((slot.to_vec(), value.value().to_vec()));
        }

        let snapshot = RegistrySnapshot { instances: records };
        snapshot.validate()?;
        tracing::debug!(instances = snapshot.instances.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }
}

fn record_mut(records: &mut [InstanceRecord], id: u64) -> Result<&mut InstanceRecord, RegistryError> {
    records
        .get_mut(id as usize)
        .filter(|r| r.id.0 == id)
        .ok_or_else(|| {
            RegistryError::DeserializationError(format!("row references unknown instance {}", id))
        })
}

// =============================================================================
// TESTS
// =============================================================================
