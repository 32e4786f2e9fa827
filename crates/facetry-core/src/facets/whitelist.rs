//! # Whitelist Gate
//!
//! The standard authorization gate. Its whitelist lives in the storage of
//! the instance it is called on, so a clone that inherits the gate from its
//! parent starts with an empty whitelist of its own.
//!
//! | Signature | Args | Returns |
//! |---|---|---|
//! | `isAuthorised(address,bytes32)` | `(Address, Node)` | `bool` |
//! | `setWhitelisted(address,bool)` | `(Address, bool)` | nothing |
//!
//! `node` is opaque here: an identity authorised for the instance is
//! authorised for every node.

use super::unsupported;
use crate::codec::{decode_args, encode_args};
use crate::event::RegistryEvent;
use crate::facet::{CallContext, Facet};
use crate::primitives::{is_authorised_selector, set_whitelisted_selector};
use crate::{Address, FacetError, Node, Selector};

const WHITELIST_PREFIX: &[u8] = b"whitelist/";

fn slot(address: Address) -> Vec<u8> {
    let mut key = WHITELIST_PREFIX.to_vec();
    key.extend_from_slice(&address.0);
    key
}

/// Owner-or-whitelisted authorization gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitelistGate;

impl WhitelistGate {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn allows(ctx: &CallContext<'_>, who: Address) -> bool {
        who == ctx.owner() || ctx.get(&slot(who)).is_some()
    }
}

impl Facet for WhitelistGate {
    fn name(&self) -> &str {
        "WhitelistGate"
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![is_authorised_selector(), set_whitelisted_selector()]
    }

    fn execute(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        args: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        if selector == is_authorised_selector() {
            let (who, _node): (Address, Node) = decode_args(args)?;
            return Ok(encode_args(&Self::allows(ctx, who))?);
        }

        if selector == set_whitelisted_selector() {
            let (address, enabled): (Address, bool) = decode_args(args)?;
            if !Self::allows(ctx, ctx.caller()) {
                return Err(FacetError::new(format!(
                    "{} may not change the whitelist",
                    ctx.caller()
                )));
            }
            if enabled {
                ctx.put(&slot(address), vec![1])?;
            } else {
                ctx.remove(&slot(address))?;
            }
            let instance = ctx.instance();
            ctx.emit(RegistryEvent::WhitelistChanged {
                instance,
                address,
                enabled,
            });
            return Ok(Vec::new());
        }

        Err(unsupported(self.name(), selector))
    }
}
