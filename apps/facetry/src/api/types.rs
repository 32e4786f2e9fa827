//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! Identities and byte strings travel as `0x`-prefixed hex. Selectors may
//! also be given as canonical signatures such as `addr(bytes32)`.

use crate::config::parse_selector;
use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use facetry_core::{
    Address, FacetCut, FacetCutAction, FacetHandle, InitCall, InitTarget, InterfaceId, ModuleInfo,
    RegistryError, RegistryEvent, ResolverInstance, Resolution, Selector, decode_hex, encode_hex,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    /// Stable error kind, e.g. `SelectorNotFound`.
    pub kind: String,
    pub error: String,
}

/// A registry error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub RegistryError);

impl ApiError {
    /// HTTP status for the wrapped error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RegistryError::InstanceNotFound(_)
            | RegistryError::ModuleNotFound(_)
            | RegistryError::SelectorNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            RegistryError::ReentrantMutation(_) | RegistryError::ModuleAlreadyDeployed(_) => {
                StatusCode::CONFLICT
            }
            RegistryError::SelectorAlreadyMapped(_)
            | RegistryError::SelectorNotMapped(_)
            | RegistryError::NoOpReplace { .. }
            | RegistryError::InvalidCutTarget { .. }
            | RegistryError::EmptyCut { .. }
            | RegistryError::InvalidCutAction(_)
            | RegistryError::InitCallFailed { .. }
            | RegistryError::CallDepthExceeded(_)
            | RegistryError::Facet(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RegistryError::InvalidInput(_) | RegistryError::DeserializationError(_) => {
                StatusCode::BAD_REQUEST
            }
            RegistryError::SerializationError(_) | RegistryError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "request failed: {}", self.0);
        }
        let body = ErrorResponse {
            success: false,
            kind: self.0.kind().to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Registry status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub instance_count: usize,
    pub module_count: usize,
    pub event_count: usize,
    pub persistent: bool,
}

// =============================================================================
// INSTANCES
// =============================================================================

/// Root instance creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    pub owner: String,
}

impl CreateInstanceRequest {
    pub fn owner(&self) -> Result<Address, RegistryError> {
        self.owner.parse()
    }
}

/// Clone request. The caller owns the clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneRequest {
    pub caller: String,
}

impl CloneRequest {
    pub fn caller(&self) -> Result<Address, RegistryError> {
        self.caller.parse()
    }
}

/// Response to create and clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub instance: u64,
    pub parent: Option<u64>,
    pub owner: String,
}

/// One instance as seen from outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub id: u64,
    pub owner: String,
    pub parent: Option<u64>,
    /// Nearest first.
    pub ancestors: Vec<u64>,
    pub node: String,
    pub local_selectors: usize,
    pub interface_overrides: usize,
    pub storage_slots: usize,
}

impl InstanceResponse {
    pub fn new(instance: &ResolverInstance, ancestors: Vec<u64>) -> Self {
        Self {
            id: instance.id().0,
            owner: instance.owner().to_string(),
            parent: instance.parent().map(|p| p.0),
            ancestors,
            node: instance.node().to_string(),
            local_selectors: instance.table().len(),
            interface_overrides: instance.interfaces().len(),
            storage_slots: instance.storage().len(),
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// A call routed through an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// 4-byte hex selector or canonical signature.
    pub selector: String,
    /// Hex argument bytes after the selector.
    #[serde(default)]
    pub payload: String,
    pub caller: String,
}

impl DispatchRequest {
    pub fn parse(&self) -> Result<(Selector, Vec<u8>, Address), RegistryError> {
        Ok((
            parse_selector(&self.selector)?,
            decode_hex(&self.payload)?,
            self.caller.parse()?,
        ))
    }
}

/// Dispatch result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    /// Hex bytes returned by the facet.
    pub result: String,
}

impl DispatchResponse {
    pub fn success(result: &[u8]) -> Self {
        Self {
            success: true,
            result: encode_hex(result),
        }
    }
}

// =============================================================================
// CUTS
// =============================================================================

/// One cut as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutJson {
    /// Target facet handle; omit or send the zero handle for Remove.
    #[serde(default)]
    pub facet: Option<String>,
    /// `0 = Add`, `1 = Replace`, `2 = Remove`.
    pub action: u8,
    pub selectors: Vec<String>,
}

impl CutJson {
    pub fn to_cut(&self) -> Result<FacetCut, RegistryError> {
        let action = FacetCutAction::try_from(self.action)?;
        let target = match &self.facet {
            Some(facet) => facet.parse()?,
            None => FacetHandle::NULL,
        };
        let selectors = self
            .selectors
            .iter()
            .map(|s| parse_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FacetCut::new(target, action, selectors))
    }
}

/// A cut batch with an optional init hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutRequest {
    pub cuts: Vec<CutJson>,
    /// `"resolver"`, a facet handle, or omitted / zero for no hook.
    #[serde(default)]
    pub init_target: Option<String>,
    /// Hex calldata of the hook: selector followed by arguments.
    #[serde(default)]
    pub init_payload: String,
    pub caller: String,
}

impl CutRequest {
    pub fn cuts(&self) -> Result<Vec<FacetCut>, RegistryError> {
        self.cuts.iter().map(CutJson::to_cut).collect()
    }

    pub fn init(&self) -> Result<Option<InitCall>, RegistryError> {
        let payload = decode_hex(&self.init_payload)?;
        match self.init_target.as_deref() {
            None => Ok(None),
            Some("resolver") => Ok(Some(InitCall::resolver(payload))),
            Some(handle) => Ok(InitCall::from_handle(handle.parse()?, payload)),
        }
    }

    pub fn caller(&self) -> Result<Address, RegistryError> {
        self.caller.parse()
    }
}

/// Cut result: the instance's local mapping after the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutResponse {
    pub success: bool,
    pub instance: u64,
    pub local_selectors: usize,
}

// =============================================================================
// INTERFACES
// =============================================================================

/// `setMultiSupportsInterface` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacesRequest {
    pub ids: Vec<String>,
    pub enabled: bool,
    pub caller: String,
}

impl InterfacesRequest {
    pub fn ids(&self) -> Result<Vec<InterfaceId>, RegistryError> {
        self.ids.iter().map(|s| s.parse()).collect()
    }

    pub fn caller(&self) -> Result<Address, RegistryError> {
        self.caller.parse()
    }
}

/// Acknowledgement of an interface change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacesResponse {
    pub success: bool,
    pub changed: usize,
}

/// `supportsInterface` answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportsInterfaceResponse {
    pub interface_id: String,
    pub supported: bool,
}

// =============================================================================
// RESOLUTION / LOUPE
// =============================================================================

/// Traced resolution of one selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub selector: String,
    pub facet: String,
    /// Instance whose table produced the hit.
    pub source: u64,
    /// Parent links followed (0 = local).
    pub hops: usize,
}

impl ResolveResponse {
    pub fn new(selector: Selector, resolution: Resolution) -> Self {
        Self {
            selector: selector.to_string(),
            facet: resolution.facet.to_string(),
            source: resolution.source.0,
            hops: resolution.hops,
        }
    }
}

/// One facet and the selectors mapped to it locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetJson {
    pub facet: String,
    pub selectors: Vec<String>,
}

/// Local facet table of an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetsResponse {
    pub instance: u64,
    pub facets: Vec<FacetJson>,
}

impl FacetsResponse {
    pub fn new(instance: u64, facets: Vec<(FacetHandle, Vec<Selector>)>) -> Self {
        Self {
            instance,
            facets: facets
                .into_iter()
                .map(|(facet, selectors)| FacetJson {
                    facet: facet.to_string(),
                    selectors: selectors.iter().map(ToString::to_string).collect(),
                })
                .collect(),
        }
    }
}

/// A deployed module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleJson {
    pub handle: String,
    pub name: String,
    pub selectors: Vec<String>,
}

impl From<ModuleInfo> for ModuleJson {
    fn from(info: ModuleInfo) -> Self {
        Self {
            handle: info.handle.to_string(),
            name: info.name,
            selectors: info.selectors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Module catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesResponse {
    pub modules: Vec<ModuleJson>,
}

// =============================================================================
// EVENTS
// =============================================================================

/// `GET /events` filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    pub instance: Option<u64>,
}

/// One logged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventJson {
    pub index: usize,
    pub name: String,
    pub instance: u64,
    pub data: serde_json::Value,
}

impl EventJson {
    pub fn new(index: usize, event: &RegistryEvent) -> Self {
        let data = match event {
            RegistryEvent::Created { owner, .. } => json!({ "owner": owner.to_string() }),
            RegistryEvent::Cloned { parent, owner, .. } => {
                json!({ "parent": parent.0, "owner": owner.to_string() })
            }
            RegistryEvent::FacetsCut { cuts, init, .. } => json!({
                "cuts": cuts.iter().map(|c| json!({
                    "facet": c.target.to_string(),
                    "action": c.action.code(),
                    "selectors": c.selectors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
                "init": init.map(|t| match t {
                    InitTarget::Resolver => "resolver".to_string(),
                    InitTarget::Facet(handle) => handle.to_string(),
                }),
            }),
            RegistryEvent::InterfacesChanged { ids, enabled, .. } => json!({
                "ids": ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "enabled": enabled,
            }),
            RegistryEvent::WhitelistChanged {
                address, enabled, ..
            } => json!({ "address": address.to_string(), "enabled": enabled }),
        };
        Self {
            index,
            name: event.name().to_string(),
            instance: event.instance().0,
            data,
        }
    }
}

/// Event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<EventJson>,
}

// =============================================================================
// EXPORT / HASH
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    /// Base64 of the binary snapshot.
    pub data: String,
    pub size: usize,
    /// BLAKE3 of the snapshot bytes.
    pub checksum: String,
}

impl ExportResponse {
    pub fn new(data: &[u8], checksum: String) -> Self {
        Self {
            success: true,
            data: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, data),
            size: data.len(),
            checksum,
        }
    }
}

/// Snapshot hash response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    pub success: bool,
    pub algorithm: String,
    pub hash: String,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let sel = Selector::from_u32(1);
        let cases = [
            (RegistryError::SelectorNotFound(sel), StatusCode::NOT_FOUND),
            (
                RegistryError::Unauthorized {
                    caller: Address::ZERO,
                    instance: facetry_core::InstanceId(0),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                RegistryError::ReentrantMutation(facetry_core::InstanceId(0)),
                StatusCode::CONFLICT,
            ),
            (
                RegistryError::SelectorAlreadyMapped(sel),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                RegistryError::InvalidInput("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                RegistryError::IoError("disk".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[test]
    fn test_cut_json_remove_defaults_to_null() {
        let cut: CutJson =
            serde_json::from_str(r#"{"action": 2, "selectors": ["addr(bytes32)"]}"#)
                .expect("parse");
        let cut = cut.to_cut().expect("cut");
        assert_eq!(cut.action, FacetCutAction::Remove);
        assert!(cut.target.is_null());
        assert_eq!(cut.selectors, vec![Selector::from_signature("addr(bytes32)")]);
    }

    #[test]
    fn test_cut_json_bad_action() {
        let cut = CutJson {
            facet: None,
            action: 7,
            selectors: vec!["0x01020304".to_string()],
        };
        assert_eq!(cut.to_cut().expect_err("action").kind(), "InvalidCutAction");
    }

    #[test]
    fn test_init_forms() {
        let mut req = CutRequest {
            cuts: vec![],
            init_target: None,
            init_payload: String::new(),
            caller: Address::ZERO.to_string(),
        };
        assert_eq!(req.init().expect("none"), None);

        req.init_target = Some(FacetHandle::NULL.to_string());
        assert_eq!(req.init().expect("null handle"), None);

        req.init_target = Some("resolver".to_string());
        req.init_payload = "0x01ffc9a7".to_string();
        let init = req.init().expect("resolver").expect("some");
        assert_eq!(init.target, InitTarget::Resolver);
        assert_eq!(init.payload, vec![0x01, 0xff, 0xc9, 0xa7]);
    }
}
