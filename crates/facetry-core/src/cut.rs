//! # Facet Cuts
//!
//! A cut is one instruction to Add, Replace or Remove a set of
//! selector→facet mappings. A batch of cuts is applied as a single atomic
//! unit by [`crate::Registry::apply_cuts`], optionally followed by an init
//! hook ([`InitCall`]) that runs in the resolver's own storage context.

use crate::{FacetHandle, RegistryError, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a cut does to its selectors.
///
/// Numeric codes match the wire encoding used by deployment tooling:
/// `0 = Add`, `1 = Replace`, `2 = Remove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FacetCutAction {
    /// Map selectors that are currently absent.
    Add,
    /// Re-point selectors that are currently present to a different facet.
    Replace,
    /// Unmap selectors that are currently present.
    Remove,
}

impl FacetCutAction {
    /// Wire code of this action.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Replace => 1,
            Self::Remove => 2,
        }
    }
}

impl TryFrom<u8> for FacetCutAction {
    type Error = RegistryError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Add),
            1 => Ok(Self::Replace),
            2 => Ok(Self::Remove),
            other => Err(RegistryError::InvalidCutAction(other)),
        }
    }
}

/// One entry of a cut batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCut {
    /// The facet to map to, or [`FacetHandle::NULL`] for Remove.
    pub target: FacetHandle,
    /// The mutation to perform.
    pub action: FacetCutAction,
    /// Selectors affected, in order.
    pub selectors: Vec<Selector>,
}

impl FacetCut {
    /// Create a cut.
    #[must_use]
    pub fn new(target: FacetHandle, action: FacetCutAction, selectors: Vec<Selector>) -> Self {
        Self {
            target,
            action,
            selectors,
        }
    }

    /// Add `selectors` pointing at `target`.
    #[must_use]
    pub fn add(target: FacetHandle, selectors: Vec<Selector>) -> Self {
        Self::new(target, FacetCutAction::Add, selectors)
    }

    /// Replace `selectors` so they point at `target`.
    #[must_use]
    pub fn replace(target: FacetHandle, selectors: Vec<Selector>) -> Self {
        Self::new(target, FacetCutAction::Replace, selectors)
    }

    /// Remove `selectors`.
    #[must_use]
    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self::new(FacetHandle::NULL, FacetCutAction::Remove, selectors)
    }

    /// Check the target against the action.
    ///
    /// Add and Replace need a real facet; Remove needs the null sentinel.
    pub fn validate_shape(&self, index: usize) -> Result<(), RegistryError> {
        if self.selectors.is_empty() {
            return Err(RegistryError::EmptyCut { index });
        }
        let target_ok = match self.action {
            FacetCutAction::Add | FacetCutAction::Replace => !self.target.is_null(),
            FacetCutAction::Remove => self.target.is_null(),
        };
        if !target_ok {
            return Err(RegistryError::InvalidCutTarget {
                action: self.action,
                target: self.target,
            });
        }
        Ok(())
    }
}

// =============================================================================
// INIT HOOK
// =============================================================================

/// Where the init payload of a cut is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitTarget {
    /// The resolver's own call surface: built-in operations, then its
    /// facet table.
    Resolver,
    /// A specific deployed facet module.
    Facet(FacetHandle),
}

impl fmt::Display for InitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolver => f.write_str("resolver"),
            Self::Facet(handle) => handle.fmt(f),
        }
    }
}

/// One-shot initialization call run after a batch's mapping changes.
///
/// The payload follows the calldata convention: a 4-byte selector followed
/// by the arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    pub target: InitTarget,
    pub payload: Vec<u8>,
}

impl InitCall {
    /// Create an init call.
    #[must_use]
    pub fn new(target: InitTarget, payload: Vec<u8>) -> Self {
        Self { target, payload }
    }

    /// Init call aimed at the resolver's own call surface.
    #[must_use]
    pub fn resolver(payload: Vec<u8>) -> Self {
        Self::new(InitTarget::Resolver, payload)
    }

    /// Build from the `(initTarget, initPayload)` pair of the wire surface.
    ///
    /// A null target means "no init hook".
    #[must_use]
    pub fn from_handle(target: FacetHandle, payload: Vec<u8>) -> Option<Self> {
        if target.is_null() {
            None
        } else {
            Some(Self::new(InitTarget::Facet(target), payload))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
