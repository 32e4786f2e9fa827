//! # Formats
//!
//! Binary encodings of registry state. Pure transformations; file and
//! database I/O live in [`crate::storage`] and the app layer.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes,
};
