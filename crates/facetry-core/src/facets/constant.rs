//! # Constant Facet
//!
//! Answers a single selector with a fixed byte string, ignoring arguments.
//! Useful as a stand-in implementation and for wiring checks, e.g. an
//! `addr(bytes32)` facet that returns its own handle.

use super::unsupported;
use crate::facet::{CallContext, Facet};
use crate::{FacetError, FacetHandle, Selector};

/// Fixed-answer module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantFacet {
    selector: Selector,
    value: Vec<u8>,
}

impl ConstantFacet {
    #[must_use]
    pub fn new(selector: Selector, value: Vec<u8>) -> Self {
        Self { selector, value }
    }

    /// A facet for `signature` whose answer is the 20 bytes of `handle`.
    #[must_use]
    pub fn returning_handle(signature: &str, handle: FacetHandle) -> Self {
        Self::new(Selector::from_signature(signature), handle.0.0.to_vec())
    }

    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

impl Facet for ConstantFacet {
    fn name(&self) -> &str {
        "ConstantFacet"
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![self.selector]
    }

    fn execute(
        &self,
        _ctx: &mut CallContext<'_>,
        selector: Selector,
        _args: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        if selector != self.selector {
            return Err(unsupported(self.name(), selector));
        }
        Ok(self.value.clone())
    }
}
