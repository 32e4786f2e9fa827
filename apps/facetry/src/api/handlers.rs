//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Read-only endpoints take the session read lock. Anything that can change
//! registry state, dispatch included, takes the write lock and goes through
//! [`Session::commit`](facetry_core::Session::commit), which persists only
//! real changes and rolls the registry back if the write fails.

use super::{
    AppState,
    types::{
        ApiError, CloneRequest, CreateInstanceRequest, CreatedResponse, CutRequest, CutResponse,
        DispatchRequest, DispatchResponse, EventJson, EventsQuery, EventsResponse, ExportResponse,
        FacetsResponse, HashResponse, HealthResponse, InstanceResponse, InterfacesRequest,
        InterfacesResponse, ModuleJson, ModulesResponse, ResolveResponse, StatusResponse,
        SupportsInterfaceResponse,
    },
};
use crate::config::parse_selector;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use facetry_core::{InstanceId, InterfaceId, snapshot_hash, snapshot_to_bytes};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Registry counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let registry = session.registry();

    Json(StatusResponse {
        instance_count: registry.instance_count(),
        module_count: registry.module_count(),
        event_count: registry.events().len(),
        persistent: session.is_persistent(),
    })
}

// =============================================================================
// INSTANCE HANDLERS
// =============================================================================

/// Create a root instance.
pub async fn create_instance_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateInstanceRequest>,
) -> ApiResult<impl IntoResponse> {
    let owner = request.owner()?;

    let mut session = state.session.write().await;
    let id = session.commit(|reg| reg.create_instance(owner))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            instance: id.0,
            parent: None,
            owner: owner.to_string(),
        }),
    ))
}

/// Clone an instance; the caller owns the clone.
pub async fn clone_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CloneRequest>,
) -> ApiResult<impl IntoResponse> {
    let caller = request.caller()?;

    let mut session = state.session.write().await;
    let clone = session.commit(|reg| reg.clone_instance(InstanceId(id), caller))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            instance: clone.0,
            parent: Some(id),
            owner: caller.to_string(),
        }),
    ))
}

/// Describe one instance.
pub async fn instance_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<InstanceResponse>> {
    let session = state.session.read().await;
    let registry = session.registry();
    let instance = registry.instance(InstanceId(id))?;
    let ancestors = registry
        .ancestors(InstanceId(id))?
        .into_iter()
        .map(|a| a.0)
        .collect();

    Ok(Json(InstanceResponse::new(instance, ancestors)))
}

// =============================================================================
// DISPATCH HANDLER
// =============================================================================

/// Route a call through an instance.
pub async fn dispatch_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DispatchRequest>,
) -> ApiResult<Json<DispatchResponse>> {
    let (selector, payload, caller) = request.parse()?;

    let mut session = state.session.write().await;
    let result = session.commit(|reg| reg.dispatch(InstanceId(id), selector, &payload, caller))?;

    Ok(Json(DispatchResponse::success(&result)))
}

// =============================================================================
// CUT HANDLER
// =============================================================================

/// Apply a cut batch.
pub async fn cut_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<CutRequest>,
) -> ApiResult<Json<CutResponse>> {
    let cuts = request.cuts()?;
    let init = request.init()?;
    let caller = request.caller()?;

    let mut session = state.session.write().await;
    session.commit(|reg| reg.apply_cuts(InstanceId(id), &cuts, init, caller))?;
    let local_selectors = session.registry().instance(InstanceId(id))?.table().len();

    Ok(Json(CutResponse {
        success: true,
        instance: id,
        local_selectors,
    }))
}

// =============================================================================
// INTERFACE HANDLERS
// =============================================================================

/// Toggle interface support.
pub async fn set_interfaces_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<InterfacesRequest>,
) -> ApiResult<Json<InterfacesResponse>> {
    let ids = request.ids()?;
    let caller = request.caller()?;

    let mut session = state.session.write().await;
    session.commit(|reg| {
        reg.set_multi_supports_interface(InstanceId(id), &ids, request.enabled, caller)
    })?;

    Ok(Json(InterfacesResponse {
        success: true,
        changed: ids.len(),
    }))
}

/// `supportsInterface` for one id.
pub async fn supports_interface_handler(
    State(state): State<AppState>,
    Path((id, interface_id)): Path<(u64, String)>,
) -> ApiResult<Json<SupportsInterfaceResponse>> {
    let interface_id: InterfaceId = interface_id.parse()?;

    let session = state.session.read().await;
    let supported = session
        .registry()
        .supports_interface(InstanceId(id), interface_id)?;

    Ok(Json(SupportsInterfaceResponse {
        interface_id: interface_id.to_string(),
        supported,
    }))
}

// =============================================================================
// RESOLUTION / LOUPE HANDLERS
// =============================================================================

/// Resolve a selector through the fallback chain.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path((id, selector)): Path<(u64, String)>,
) -> ApiResult<Json<ResolveResponse>> {
    let selector = parse_selector(&selector)?;

    let session = state.session.read().await;
    let resolution = session
        .registry()
        .resolve_traced(InstanceId(id), selector)?;

    Ok(Json(ResolveResponse::new(selector, resolution)))
}

/// Local facet table of an instance.
pub async fn facets_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<FacetsResponse>> {
    let session = state.session.read().await;
    let facets = session.registry().facets(InstanceId(id))?;

    Ok(Json(FacetsResponse::new(id, facets)))
}

/// Deployed module catalog.
pub async fn modules_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let modules = session
        .registry()
        .modules()
        .into_iter()
        .map(ModuleJson::from)
        .collect();

    Json(ModulesResponse { modules })
}

/// Event log, optionally filtered to one instance.
pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let session = state.session.read().await;
    let events = session
        .registry()
        .events()
        .iter()
        .enumerate()
        .filter(|(_, e)| query.instance.is_none_or(|i| e.instance().0 == i))
        .map(|(index, e)| EventJson::new(index, e))
        .collect();

    Json(EventsResponse { events })
}

// =============================================================================
// EXPORT / HASH HANDLERS
// =============================================================================

/// Export the registry as a binary snapshot.
pub async fn export_handler(State(state): State<AppState>) -> ApiResult<Json<ExportResponse>> {
    let session = state.session.read().await;
    let snapshot = session.registry().snapshot();
    let data = snapshot_to_bytes(&snapshot)?;
    let checksum = snapshot_hash(&snapshot)?;

    Ok(Json(ExportResponse::new(&data, checksum)))
}

/// BLAKE3 hash of the current snapshot.
pub async fn hash_handler(State(state): State<AppState>) -> ApiResult<Json<HashResponse>> {
    let session = state.session.read().await;
    let hash = snapshot_hash(&session.registry().snapshot())?;

    Ok(Json(HashResponse {
        success: true,
        algorithm: "blake3".to_string(),
        hash,
    }))
}
