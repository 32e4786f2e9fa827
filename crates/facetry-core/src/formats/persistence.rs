//! # Persistence Format
//!
//! Binary serialization for registry snapshots.
//!
//! Format: Header (5 bytes) + postcard-serialized [`RegistrySnapshot`].
//! - 4 bytes: Magic ("FCTR")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded.

use crate::snapshot::RegistrySnapshot;
use crate::{RegistryError, primitives};

/// Maximum accepted encoded snapshot size (256 MB).
///
/// Checked before any allocation driven by the payload.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024;

const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all snapshot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(RegistryError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(RegistryError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RegistryError> {
        let Some((magic, rest)) = bytes.split_first_chunk::<4>() else {
            return Err(RegistryError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        let Some(&version) = rest.first() else {
            return Err(RegistryError::DeserializationError(
                "Header too short".to_string(),
            ));
        };
        Ok(Self {
            magic: *magic,
            version,
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &RegistrySnapshot) -> Result<Vec<u8>, RegistryError> {
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| RegistryError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot from bytes.
///
/// Checks, in order: minimum size, maximum size, header, payload, and the
/// arena invariants of the decoded snapshot.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<RegistrySnapshot, RegistryError> {
    if bytes.len() < HEADER_LEN {
        return Err(RegistryError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(RegistryError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let snapshot: RegistrySnapshot = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        RegistryError::DeserializationError(format!("Failed to decode snapshot: {}", e))
    })?;
    snapshot.validate()?;
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::InstanceRecord;
    use crate::{Address, FacetHandle, InstanceId, Selector};

    fn sample() -> RegistrySnapshot {
        RegistrySnapshot {
            instances: vec![
                InstanceRecord {
                    id: InstanceId(0),
                    owner: Address::from_low_u64(1),
                    parent: None,
                    selectors: vec![(Selector::from_u32(0x3b3b_57de), FacetHandle::from_low_u64(9))],
                    interfaces: vec![],
                    storage: vec![(b"k".to_vec(), b"v".to_vec())],
                },
                InstanceRecord {
                    id: InstanceId(1),
                    owner: Address::from_low_u64(2),
                    parent: Some(InstanceId(0)),
                    selectors: vec![],
                    interfaces: vec![],
                    storage: vec![],
                },
            ],
        }
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, PersistenceHeader::new());
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let bytes1 = snapshot_to_bytes(&sample()).expect("first serialize");
        let restored = snapshot_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = snapshot_to_bytes(&restored).expect("second serialize");

        assert_eq!(restored, sample());
        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        bytes[..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            snapshot_from_bytes(&bytes),
            Err(RegistryError::DeserializationError(_))
        ));
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(snapshot_from_bytes(b"FCT").is_err());
        let bytes = snapshot_to_bytes(&sample()).expect("serialize");
        assert!(snapshot_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
