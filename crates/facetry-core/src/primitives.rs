//! # Registry Primitives
//!
//! Fixed constants of the Facetry registry. These are compiled in and never
//! change at runtime.

use crate::{InterfaceId, Selector};

/// Magic bytes for the Facetry binary snapshot header.
///
/// - File Header = Magic Bytes ("FCTR") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"FCTR";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum nesting of dispatch calls (facet → dispatch → facet ...).
///
/// Bounds recursion when facets call back into the registry.
pub const MAX_CALL_DEPTH: usize = 64;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of cuts in one batch.
pub const MAX_CUTS_PER_BATCH: usize = 256;

/// Maximum number of selectors in one cut.
pub const MAX_SELECTORS_PER_CUT: usize = 1024;

/// Maximum number of interface ids in one `setMultiSupportsInterface` call.
pub const MAX_INTERFACE_IDS: usize = 1024;

/// Maximum size of a dispatch or init payload (1 MB).
pub const MAX_PAYLOAD_LENGTH: usize = 1024 * 1024;

// =============================================================================
// INTROSPECTION
// =============================================================================

/// ERC-165 `supportsInterface(bytes4)`.
pub const ERC165_INTERFACE_ID: InterfaceId = InterfaceId::from_u32(0x01ff_c9a7);

/// EIP-2535 diamond cut interface.
pub const DIAMOND_CUT_INTERFACE_ID: InterfaceId = InterfaceId::from_u32(0x1f93_1c1c);

/// EIP-2535 diamond loupe interface.
pub const DIAMOND_LOUPE_INTERFACE_ID: InterfaceId = InterfaceId::from_u32(0x48e2_b093);

/// Interface ids every resolver reports as supported when neither it nor any
/// ancestor has an explicit entry.
pub const INTROSPECTION_INTERFACES: [InterfaceId; 3] = [
    ERC165_INTERFACE_ID,
    DIAMOND_CUT_INTERFACE_ID,
    DIAMOND_LOUPE_INTERFACE_ID,
];

// =============================================================================
// CANONICAL SIGNATURES
// =============================================================================

/// Built-in: interface introspection.
pub const SUPPORTS_INTERFACE_SIG: &str = "supportsInterface(bytes4)";

/// Built-in: batch toggle of interface support.
pub const SET_MULTI_SUPPORTS_INTERFACE_SIG: &str = "setMultiSupportsInterface(bytes4[],bool)";

/// Authorization gate query.
pub const IS_AUTHORISED_SIG: &str = "isAuthorised(address,bytes32)";

/// Authorization gate whitelist update.
pub const SET_WHITELISTED_SIG: &str = "setWhitelisted(address,bool)";

/// Selector of [`SUPPORTS_INTERFACE_SIG`].
#[must_use]
pub fn supports_interface_selector() -> Selector {
    Selector::from_signature(SUPPORTS_INTERFACE_SIG)
}

/// Selector of [`SET_MULTI_SUPPORTS_INTERFACE_SIG`].
#[must_use]
pub fn set_multi_supports_interface_selector() -> Selector {
    Selector::from_signature(SET_MULTI_SUPPORTS_INTERFACE_SIG)
}

/// Selector of [`IS_AUTHORISED_SIG`].
#[must_use]
pub fn is_authorised_selector() -> Selector {
    Selector::from_signature(IS_AUTHORISED_SIG)
}

/// Whether the registry answers `selector` itself, ahead of any table.
#[must_use]
pub fn is_builtin_selector(selector: Selector) -> bool {
    selector == supports_interface_selector() || selector == set_multi_supports_interface_selector()
}

/// Selector of [`SET_WHITELISTED_SIG`].
#[must_use]
pub fn set_whitelisted_selector() -> Selector {
    Selector::from_signature(SET_WHITELISTED_SIG)
}
