//! # Argument Codec
//!
//! Calldata is `selector ++ args`; the argument bytes are postcard-encoded.
//! Built-in operations and the bundled facets all use this codec, so any
//! caller that speaks postcard can drive them.

use crate::{RegistryError, Selector};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode call arguments (or a return value).
pub fn encode_args<T: Serialize>(value: &T) -> Result<Vec<u8>, RegistryError> {
    postcard::to_stdvec(value).map_err(|e| RegistryError::SerializationError(e.to_string()))
}

/// Decode call arguments (or a return value).
///
/// Trailing bytes are rejected.
pub fn decode_args<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RegistryError> {
    let (value, rest) = postcard::take_from_bytes(bytes)
        .map_err(|e| RegistryError::DeserializationError(e.to_string()))?;
    if !rest.is_empty() {
        return Err(RegistryError::DeserializationError(format!(
            "{} trailing bytes after arguments",
            rest.len()
        )));
    }
    Ok(value)
}

/// Build full calldata for a selector.
pub fn calldata<T: Serialize>(selector: Selector, args: &T) -> Result<Vec<u8>, RegistryError> {
    let encoded = encode_args(args)?;
    let mut data = Vec::with_capacity(4 + encoded.len());
    data.extend_from_slice(selector.as_bytes());
    data.extend_from_slice(&encoded);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, Node};

    #[test]
    fn calldata_starts_with_selector() {
        let selector = Selector::from_signature("isAuthorised(address,bytes32)");
        let data = calldata(selector, &(Address::from_low_u64(1), Node::default()))
            .expect("calldata");

        let (head, args) = Selector::split_calldata(&data).expect("split");
        assert_eq!(head, selector);
        let (address, node): (Address, Node) = decode_args(args).expect("decode");
        assert_eq!(address, Address::from_low_u64(1));
        assert_eq!(node, Node::default());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_args(&true).expect("encode");
        bytes.push(0);
        assert!(matches!(
            decode_args::<bool>(&bytes),
            Err(RegistryError::DeserializationError(_))
        ));
    }
}
