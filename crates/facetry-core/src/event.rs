//! # Registry Events
//!
//! Ordered log of observable state changes. Events emitted inside a call
//! that later fails are rolled back together with the rest of its effects.

use crate::cut::{FacetCut, InitTarget};
use crate::{Address, InstanceId, InterfaceId};
use serde::{Deserialize, Serialize};

/// An observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A root instance was created.
    Created { instance: InstanceId, owner: Address },
    /// A clone was spawned from `parent`.
    Cloned {
        resolver: InstanceId,
        parent: InstanceId,
        owner: Address,
    },
    /// A cut batch committed.
    FacetsCut {
        instance: InstanceId,
        cuts: Vec<FacetCut>,
        init: Option<InitTarget>,
    },
    /// Interface support was toggled.
    InterfacesChanged {
        instance: InstanceId,
        ids: Vec<InterfaceId>,
        enabled: bool,
    },
    /// The whitelist gate changed an entry.
    WhitelistChanged {
        instance: InstanceId,
        address: Address,
        enabled: bool,
    },
}

impl RegistryEvent {
    /// The instance the event is about.
    #[must_use]
    pub fn instance(&self) -> InstanceId {
        match self {
            Self::Created { instance, .. }
            | Self::FacetsCut { instance, .. }
            | Self::InterfacesChanged { instance, .. }
            | Self::WhitelistChanged { instance, .. } => *instance,
            Self::Cloned { resolver, .. } => *resolver,
        }
    }

    /// Short event name for logs and the HTTP surface.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "Created",
            Self::Cloned { .. } => "Cloned",
            Self::FacetsCut { .. } => "FacetsCut",
            Self::InterfacesChanged { .. } => "InterfacesChanged",
            Self::WhitelistChanged { .. } => "WhitelistChanged",
        }
    }
}
