/// HTTP transport surface, out of scope for the core proper but needed
/// as a caller for the facade. Routes mirror the operation table exactly;
/// handlers do nothing but extract, call the facade, and serialize.
use crate::compatibility::CompatibilityPolicy;
use crate::error::{RegistryError, Result};
use crate::metrics::MetricsRegistry;
use crate::registry::{Registry, VersionSelector};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub registry: Registry,
    pub metrics: MetricsRegistry,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/subjects", get(list_subjects))
        .route("/subjects/:subject", post(lookup))
        .route("/subjects/:subject/versions", post(register).get(list_versions))
        .route("/subjects/:subject/versions/:version", get(get_version))
        .route("/schemas/ids/:id", get(get_schema_by_id))
        .route(
            "/compatibility/subjects/:subject/versions/:version",
            post(test_compatibility),
        )
        .route("/config", get(get_global_config).put(set_global_config))
        .route("/config/:subject", get(get_subject_config).put(set_subject_config))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "up" }))
}

async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}

#[derive(Debug, Deserialize)]
struct SchemaRequest {
    schema: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    id: u32,
}

async fn register(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaRequest>,
) -> Result<Json<RegisterResponse>> {
    let id = state.registry.register(&subject, &body.schema)?;
    state.metrics.schemas_registered_total.inc();
    tracing::info!(subject = %subject, id, "schema registered");
    Ok(Json(RegisterResponse { id }))
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    subject: String,
    version: u32,
    id: u32,
    schema: String,
}

async fn lookup(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
    Json(body): Json<SchemaRequest>,
) -> Result<Json<VersionResponse>> {
    let info = state.registry.lookup(&subject, &body.schema)?;
    state.metrics.lookups_total.inc();
    Ok(Json(VersionResponse {
        subject: info.subject,
        version: info.version_number,
        id: info.schema_id,
        schema: info.canonical_text,
    }))
}

#[derive(Debug, Serialize)]
struct SchemaResponse {
    schema: String,
}

async fn get_schema_by_id(
    State(state): State<SharedState>,
    Path(id): Path<u32>,
) -> Result<Json<SchemaResponse>> {
    let schema = state.registry.get_schema_by_id(id)?;
    state.metrics.lookups_total.inc();
    Ok(Json(SchemaResponse { schema }))
}

async fn list_subjects(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.registry.list_subjects())
}

async fn list_versions(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
) -> Result<Json<Vec<u32>>> {
    Ok(Json(state.registry.list_versions(&subject)?))
}

async fn get_version(
    State(state): State<SharedState>,
    Path((subject, version)): Path<(String, String)>,
) -> Result<Json<VersionResponse>> {
    let selector = VersionSelector::parse(&version)?;
    let info = state.registry.get_version(&subject, selector)?;
    Ok(Json(VersionResponse {
        subject: info.subject,
        version: info.version_number,
        id: info.schema_id,
        schema: info.canonical_text,
    }))
}

#[derive(Debug, Serialize)]
struct CompatibilityResponse {
    is_compatible: bool,
}

async fn test_compatibility(
    State(state): State<SharedState>,
    Path((subject, version)): Path<(String, String)>,
    Json(body): Json<SchemaRequest>,
) -> Result<Json<CompatibilityResponse>> {
    let selector = VersionSelector::parse(&version)?;
    let is_compatible = state.registry.test_compatibility(&subject, &body.schema, selector)?;
    state.metrics.record_compatibility_check(is_compatible);
    Ok(Json(CompatibilityResponse { is_compatible }))
}

#[derive(Debug, Serialize)]
struct ConfigResponse {
    #[serde(rename = "compatibilityLevel")]
    compatibility_level: String,
}

async fn get_global_config(State(state): State<SharedState>) -> Result<Json<ConfigResponse>> {
    let policy = state
        .registry
        .get_config(None)?
        .ok_or_else(|| RegistryError::Fatal("global config must always have a value".to_string()))?;
    Ok(Json(ConfigResponse {
        compatibility_level: policy.to_string(),
    }))
}

async fn get_subject_config(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
) -> Result<Json<ConfigResponse>> {
    let policy = state
        .registry
        .get_config(Some(&subject))?
        .ok_or_else(|| RegistryError::SubjectNotFound(format!("no per-subject config set for '{}'", subject)))?;
    Ok(Json(ConfigResponse {
        compatibility_level: policy.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct SetConfigRequest {
    compatibility: String,
}

#[derive(Debug, Serialize)]
struct SetConfigResponse {
    compatibility: String,
}

async fn set_global_config(
    State(state): State<SharedState>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<SetConfigResponse>> {
    let policy: CompatibilityPolicy = body
        .compatibility
        .parse()
        .map_err(RegistryError::InvalidSchema)?;
    state.registry.set_config(None, policy)?;
    Ok(Json(SetConfigResponse {
        compatibility: policy.to_string(),
    }))
}

async fn set_subject_config(
    State(state): State<SharedState>,
    Path(subject): Path<String>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<SetConfigResponse>> {
    let policy: CompatibilityPolicy = body
        .compatibility
        .parse()
        .map_err(RegistryError::InvalidSchema)?;
    state.registry.set_config(Some(&subject), policy)?;
    Ok(Json(SetConfigResponse {
        compatibility: policy.to_string(),
    }))
}
