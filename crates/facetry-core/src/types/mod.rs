//! # Core Type Definitions
//!
//! This module contains the value types every other module builds on:
//! - Call-surface identifiers (`Selector`, `InterfaceId`)
//! - Identities (`Address`, `FacetHandle`, `InstanceId`, `Node`)
//! - Error types (`RegistryError`, `FacetError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers are fixed-width byte arrays compared purely on bits.
//! All of them implement `Ord` so they can key `BTreeMap`/`BTreeSet`.

use crate::cut::{FacetCutAction, InitTarget};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// HEX HELPERS
// =============================================================================

/// Parse a `0x`-prefixed (or bare) hex string into exactly `N` bytes.
fn parse_fixed_hex<const N: usize>(s: &str, what: &str) -> Result<[u8; N], RegistryError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|e| {
        RegistryError::InvalidInput(format!(
            "{} must be {} bytes of hex, got '{}': {}",
            what, N, s, e
        ))
    })?;
    Ok(out)
}

/// Decode an arbitrary-length `0x`-prefixed hex string.
///
/// The empty string and a bare `0x` both decode to an empty payload.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, RegistryError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| RegistryError::InvalidInput(format!("invalid hex: {}", e)))
}

/// Encode bytes as a `0x`-prefixed lowercase hex string.
#[must_use]
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// =============================================================================
// SELECTOR
// =============================================================================

/// A fixed-width identifier naming one operation of the call surface.
///
/// Derived from a canonical signature such as `addr(bytes32)` as the first
/// four bytes of its Keccak-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Wrap raw selector bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Derive the selector of a canonical signature.
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let digest = Keccak256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Self(bytes)
    }

    /// Big-endian integer form, used as a storage key.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Inverse of [`Selector::to_u32`].
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Split calldata into its leading selector and the argument bytes.
    ///
    /// Returns `None` if the data is shorter than a selector.
    #[must_use]
    pub fn split_calldata(data: &[u8]) -> Option<(Self, &[u8])> {
        let (head, rest) = data.split_first_chunk::<4>()?;
        Some((Self(*head), rest))
    }

    /// Get the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.to_u32())
    }
}

impl FromStr for Selector {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<4>(s, "selector").map(Self)
    }
}

// =============================================================================
// INTERFACE ID
// =============================================================================

/// An ERC-165 style interface identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceId(pub [u8; 4]);

impl InterfaceId {
    /// Wrap raw interface id bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The interface id of a set of selectors: their bitwise XOR.
    #[must_use]
    pub fn from_selectors(selectors: &[Selector]) -> Self {
        let value = selectors.iter().fold(0u32, |acc, s| acc ^ s.to_u32());
        Self(value.to_be_bytes())
    }

    /// Big-endian integer form, used as a storage key.
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Inverse of [`InterfaceId::to_u32`].
    #[must_use]
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl From<Selector> for InterfaceId {
    fn from(selector: Selector) -> Self {
        Self(selector.0)
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.to_u32())
    }
}

impl FromStr for InterfaceId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<4>(s, "interface id").map(Self)
    }
}

// =============================================================================
// IDENTITIES
// =============================================================================

/// A 20-byte caller identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Build an address whose last eight bytes hold `value`.
    ///
    /// Handy for tests and configuration fixtures.
    #[must_use]
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Check for the all-zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<20>(s, "address").map(Self)
    }
}

/// Reference to a deployed facet module.
///
/// The registry never owns or inspects the module behind a handle; it only
/// looks the handle up in its module catalog. The zero handle is the null
/// sentinel used by Remove cuts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct FacetHandle(pub Address);

impl FacetHandle {
    /// The null sentinel.
    pub const NULL: Self = Self(Address::ZERO);

    /// Check for the null sentinel.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_zero()
    }

    /// See [`Address::from_low_u64`].
    #[must_use]
    pub fn from_low_u64(value: u64) -> Self {
        Self(Address::from_low_u64(value))
    }
}

impl fmt::Display for FacetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FacetHandle {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(Self)
    }
}

/// Identifier of a resolver instance: its index in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Arena index for this id.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque 32-byte resource identifier handed to the authorization gate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Node(pub [u8; 32]);

impl Node {
    /// The node that scopes mutations of one resolver instance.
    #[must_use]
    pub fn for_instance(instance: InstanceId) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(b"facetry.instance");
        hasher.update(instance.0.to_be_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex(&self.0))
    }
}

impl FromStr for Node {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed_hex::<32>(s, "node").map(Self)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Failure reported by facet code itself.
///
/// Carries the facet's own reason so operators can tell a misbehaving
/// module apart from a registry-level rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct FacetError {
    /// Human-readable failure reason.
    pub reason: String,
}

impl FacetError {
    /// Create a facet error from a reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for FacetError {
    fn from(err: RegistryError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors that can occur in the registry.
///
/// - Every error aborts the enclosing call with no partial state change
/// - The core never panics; all errors are returned
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Add targeted a selector that is already mapped locally.
    #[error("Selector already mapped: {0}")]
    SelectorAlreadyMapped(Selector),

    /// Replace or Remove targeted a selector that is not mapped locally.
    #[error("Selector not mapped: {0}")]
    SelectorNotMapped(Selector),

    /// Replace named the facet the selector already maps to.
    #[error("Replace of {selector} is a no-op: already mapped to {facet}")]
    NoOpReplace {
        selector: Selector,
        facet: FacetHandle,
    },

    /// No instance on the fallback chain maps the selector.
    #[error("Selector not found: {0}")]
    SelectorNotFound(Selector),

    /// The caller may not mutate the instance.
    #[error("Unauthorized: {caller} may not mutate instance {instance}")]
    Unauthorized {
        caller: Address,
        instance: InstanceId,
    },

    /// The init hook of a cut failed; the whole batch was reverted.
    #[error("Init call to {target} failed: {reason}")]
    InitCallFailed { target: InitTarget, reason: String },

    /// The instance id does not exist in the arena.
    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// The handle is not in the module catalog.
    #[error("Module not deployed: {0}")]
    ModuleNotFound(FacetHandle),

    /// A module is already deployed under the handle.
    #[error("Module already deployed: {0}")]
    ModuleAlreadyDeployed(FacetHandle),

    /// The cut target is null where a facet is required, or non-null on Remove.
    #[error("Invalid target {target} for {action:?} cut")]
    InvalidCutTarget {
        action: FacetCutAction,
        target: FacetHandle,
    },

    /// A cut in the batch lists no selectors.
    #[error("Cut {index} lists no selectors")]
    EmptyCut { index: usize },

    /// A numeric cut action outside Add/Replace/Remove.
    #[error("Invalid cut action: {0}")]
    InvalidCutAction(u8),

    /// A cut was attempted while a call into the same instance is in flight.
    #[error("Re-entrant mutation of instance {0}")]
    ReentrantMutation(InstanceId),

    /// Nested dispatch exceeded the call depth limit.
    #[error("Call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// The resolved facet failed.
    #[error("Facet failed: {0}")]
    Facet(#[from] FacetError),

    /// Malformed input at the registry boundary.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl RegistryError {
    /// Stable machine-readable name of the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SelectorAlreadyMapped(_) => "SelectorAlreadyMapped",
            Self::SelectorNotMapped(_) => "SelectorNotMapped",
            Self::NoOpReplace { .. } => "NoOpReplace",
            Self::SelectorNotFound(_) => "SelectorNotFound",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::InitCallFailed { .. } => "InitCallFailed",
            Self::InstanceNotFound(_) => "InstanceNotFound",
            Self::ModuleNotFound(_) => "ModuleNotFound",
            Self::ModuleAlreadyDeployed(_) => "ModuleAlreadyDeployed",
            Self::InvalidCutTarget { .. } => "InvalidCutTarget",
            Self::EmptyCut { .. } => "EmptyCut",
            Self::InvalidCutAction(_) => "InvalidCutAction",
            Self::ReentrantMutation(_) => "ReentrantMutation",
            Self::CallDepthExceeded(_) => "CallDepthExceeded",
            Self::Facet(_) => "FacetFailed",
            Self::InvalidInput(_) => "InvalidInput",
            Self::SerializationError(_) => "SerializationError",
            Self::DeserializationError(_) => "DeserializationError",
            Self::IoError(_) => "IoError",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_evm_abi() {
        assert_eq!(
            Selector::from_signature("addr(bytes32)").to_string(),
            "0x3b3b57de"
        );
        assert_eq!(
            Selector::from_signature("supportsInterface(bytes4)").to_string(),
            "0x01ffc9a7"
        );
    }

    #[test]
    fn selector_parse_and_display_agree() {
        let selector: Selector = "0x3b3b57de".parse().expect("parse");
        assert_eq!(selector, Selector::from_signature("addr(bytes32)"));

        let bare: Selector = "3b3b57de".parse().expect("parse bare");
        assert_eq!(bare, selector);
    }

    #[test]
    fn selector_rejects_wrong_width() {
        assert!("0x3b3b57".parse::<Selector>().is_err());
        assert!("0x3b3b57de00".parse::<Selector>().is_err());
        assert!("0xzzzzzzzz".parse::<Selector>().is_err());
    }

    #[test]
    fn split_calldata_requires_four_bytes() {
        assert!(Selector::split_calldata(&[1, 2, 3]).is_none());

        let (selector, rest) = Selector::split_calldata(&[0, 0, 0, 7, 9]).expect("split");
        assert_eq!(selector, Selector::from_u32(7));
        assert_eq!(rest, &[9]);
    }

    #[test]
    fn interface_id_of_single_selector_is_the_selector() {
        let addr = Selector::from_signature("addr(bytes32)");
        assert_eq!(InterfaceId::from_selectors(&[addr]), InterfaceId::from(addr));
    }

    #[test]
    fn interface_id_is_xor_of_selectors() {
        let a = Selector::from_u32(0xf0f0_0000);
        let b = Selector::from_u32(0x0ff0_00ff);
        assert_eq!(
            InterfaceId::from_selectors(&[a, b]),
            InterfaceId::from_u32(0xff00_00ff)
        );
    }

    #[test]
    fn null_handle_is_zero_address() {
        assert!(FacetHandle::NULL.is_null());
        assert!(!FacetHandle::from_low_u64(1).is_null());
        assert_eq!(
            FacetHandle::from_low_u64(1).to_string(),
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn address_roundtrips_through_display() {
        let address = Address::from_low_u64(0xdead_beef);
        let parsed: Address = address.to_string().parse().expect("parse");
        assert_eq!(parsed, address);
    }

    #[test]
    fn instance_nodes_are_distinct() {
        assert_ne!(
            Node::for_instance(InstanceId(0)),
            Node::for_instance(InstanceId(1))
        );
    }

    #[test]
    fn error_kinds_are_stable() {
        let err = RegistryError::SelectorNotFound(Selector::from_u32(1));
        assert_eq!(err.kind(), "SelectorNotFound");

        let err = RegistryError::from(FacetError::new("boom"));
        assert_eq!(err.kind(), "FacetFailed");
        assert_eq!(err.to_string(), "Facet failed: boom");
    }
}
