//! # Storage
//!
//! Disk-backed persistence of registry snapshots.

pub mod redb_store;

pub use redb_store::RedbStore;
