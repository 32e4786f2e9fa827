//! # Built-in Facets
//!
//! Modules shipped with the registry:
//! - [`WhitelistGate`]: the authorization gate
//! - [`RecordFacet`]: per-instance key/value records
//! - [`ConstantFacet`]: answers one selector with a fixed word

pub mod constant;
pub mod record;
pub mod whitelist;

pub use constant::ConstantFacet;
pub use record::RecordFacet;
pub use whitelist::WhitelistGate;

use crate::{FacetError, Selector};

/// Error for a selector a module was invoked with but does not implement.
pub(crate) fn unsupported(module: &str, selector: Selector) -> FacetError {
    FacetError::new(format!("{} does not implement {}", module, selector))
}
