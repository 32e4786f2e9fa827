//! # facetry-core
//!
//! The dispatch registry for Facetry - THE LOGIC.
//!
//! A resolver instance exposes a stable call surface of 4-byte selectors.
//! The code behind each selector is a swappable facet module, attached and
//! detached in atomic batches ("cuts"). Instances can be cloned; a clone
//! falls back to its parent for every selector it does not map itself and
//! tracks the parent's mapping live.
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Deterministic: `BTreeMap` ordering everywhere, no randomness
//! - Every external call commits fully or reverts fully
//! - Facets are shared stateless code; state lives in the calling instance

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod cut;
pub mod event;
pub mod facet;
pub mod facets;
pub mod formats;
pub mod instance;
pub mod interface;
mod journal;
pub mod primitives;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod table;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Address, FacetError, FacetHandle, InstanceId, InterfaceId, Node, RegistryError, Selector,
    decode_hex, encode_hex,
};

// =============================================================================
// RE-EXPORTS: Registry
// =============================================================================

pub use codec::{calldata, decode_args, encode_args};
pub use cut::{FacetCut, FacetCutAction, InitCall, InitTarget};
pub use event::RegistryEvent;
pub use facet::{CallContext, Facet};
pub use instance::{ResolverInstance, Storage};
pub use interface::InterfaceOverlay;
pub use registry::{ModuleInfo, Registry, Resolution};
pub use session::{Session, StorageBackend};
pub use snapshot::{InstanceRecord, RegistrySnapshot};
pub use storage::RedbStore;
pub use table::{FacetTable, TableChange};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, snapshot_from_bytes, snapshot_to_bytes};

#[cfg(feature = "crypto-hash")]
pub use snapshot::snapshot_hash;
