//! # Record Facet
//!
//! Generic per-instance records keyed by [`Node`]. Writes require the caller
//! to pass the instance's authorization gate; reads are open.
//!
//! | Signature | Args | Returns |
//! |---|---|---|
//! | `setRecord(bytes32,bytes)` | `(Node, Vec<u8>)` | nothing |
//! | `record(bytes32)` | `Node` | `Vec<u8>` (empty if unset) |

use super::unsupported;
use crate::codec::{decode_args, encode_args};
use crate::facet::{CallContext, Facet};
use crate::{FacetError, Node, Selector};

const RECORD_PREFIX: &[u8] = b"record/";

/// Canonical signature of the write operation.
pub const SET_RECORD_SIG: &str = "setRecord(bytes32,bytes)";

/// Canonical signature of the read operation.
pub const RECORD_SIG: &str = "record(bytes32)";

fn slot(node: &Node) -> Vec<u8> {
    let mut key = RECORD_PREFIX.to_vec();
    key.extend_from_slice(&node.0);
    key
}

/// Key/value record store.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFacet;

impl RecordFacet {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Facet for RecordFacet {
    fn name(&self) -> &str {
        "RecordFacet"
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![
            Selector::from_signature(SET_RECORD_SIG),
            Selector::from_signature(RECORD_SIG),
        ]
    }

    fn execute(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        if selector == Selector::from_signature(RECORD_SIG) {
            let node: Node = decode_args(args)?;
            let value = ctx.get(&slot(&node)).unwrap_or_default();
            return Ok(encode_args(&value)?);
        }

        if selector == Selector::from_signature(SET_RECORD_SIG) {
            let (node, value): (Node, Vec<u8>) = decode_args(args)?;
            let caller = ctx.caller();
            if !ctx.is_authorised(caller)? {
                return Err(FacetError::new(format!(
                    "{} is not authorised to set records",
                    caller
                )));
            }
            if value.is_empty() {
                ctx.remove(&slot(&node))?;
            } else {
                ctx.put(&slot(&node), value)?;
            }
            return Ok(Vec::new());
        }

        Err(unsupported(self.name(), selector))
    }
}
