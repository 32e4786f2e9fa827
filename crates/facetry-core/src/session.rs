//! # Session Module
//!
//! A [`Session`] couples a [`Registry`] with where its state is kept.
//!
//! ## Storage Backends
//!
//! - `InMemory`: nothing is written anywhere (volatile)
//! - `Persistent`: a [`RedbStore`]; [`Session::persist`] writes a full
//!   snapshot in one ACID transaction
//!
//! [`Session::commit`] runs one registry mutation and writes it out as a
//! unit: calls that change nothing write nothing, and a failed write rolls
//! the registry back.
//!
//! Modules are code and are never persisted. Deploy them into the registry
//! before opening a persistent session so the stored tables can be restored.

use crate::storage::RedbStore;
use crate::{Registry, RegistryError};
use std::path::Path;
use tracing::{info, warn};

/// Storage backend for a Session.
#[derive(Debug, Default)]
pub enum StorageBackend {
    /// Volatile: state lives only in the registry.
    #[default]
    InMemory,
    /// Disk-backed snapshot store using redb.
    Persistent(RedbStore),
}

/// A registry plus its storage backend.
#[derive(Debug, Default)]
pub struct Session {
    registry: Registry,
    backend: StorageBackend,
}

impl Session {
    /// Create an empty in-memory session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing registry in an in-memory session.
    #[must_use]
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            backend: StorageBackend::InMemory,
        }
    }

    /// Open a persistent session.
    ///
    /// `registry` must already have every module deployed that the stored
    /// tables reference. If the database holds a snapshot it replaces the
    /// registry's instances; otherwise the registry is kept as given.
    pub fn with_redb(path: impl AsRef<Path>, mut registry: Registry) -> Result<Self, RegistryError> {
        let store = RedbStore::open(path.as_ref())?;
        if let Some(snapshot) = store.load()? {
            registry.restore(&snapshot)?;
            info!(path = %path.as_ref().display(), instances = registry.instance_count(), "session restored");
        } else {
            info!(path = %path.as_ref().display(), "session opened on empty store");
        }
        Ok(Self {
            registry,
            backend: StorageBackend::Persistent(store),
        })
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Write the current state to the backend. No-op in memory.
    pub fn persist(&self) -> Result<(), RegistryError> {
        match &self.backend {
            StorageBackend::InMemory => Ok(()),
            StorageBackend::Persistent(store) => store.save(&self.registry.snapshot()),
        }
    }

    /// Apply `f` to the registry and persist the result.
    pub fn commit<T>(
        &mut self,
        f: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.commit_with(f, Self::persist)
    }

    fn commit_with<T>(
        &mut self,
        f: impl FnOnce(&mut Registry) -> Result<T, RegistryError>,
        persist: impl FnOnce(&Self) -> Result<(), RegistryError>,
    ) -> Result<T, RegistryError> {
        let revision = self.registry.revision();
        let before = self
            .is_persistent()
            .then(|| (self.registry.snapshot(), self.registry.events().len()));

        let value = f(&mut self.registry)?;
        if self.registry.revision() == revision {
            return Ok(value);
        }

        if let Err(e) = persist(self) {
            if let Some((snapshot, events)) = before {
                if let Err(rollback) = self.registry.rollback(&snapshot, events) {
                    warn!(error = %rollback, "rollback after failed persist failed");
                } else {
                    warn!(error = %e, "persist failed, registry rolled back");
                }
            }
            return Err(e);
        }
        Ok(value)
    }
}

// =============================================================================
// TESTS
// =============================================================================
