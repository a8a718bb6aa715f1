use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use notary_engine::{AnchoringStats, Resolution, RunOutcome, VerificationResult};
use notary_types::{AnchorRecord, ArtifactId, ArtifactKind, AttemptId, Batch, DetachedProof, ProofBundle};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct VerifyQuery {
    /// Re-read the artifact's stored bytes and compare them with the record.
    #[serde(default)]
    pub recheck_bytes: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkVerifyRequest {
    pub artifact_ids: Vec<ArtifactId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkVerifyResponse {
    pub results: Vec<VerificationResult>,
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// GET /v1/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// GET /v1/info
pub async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.engine.config();
    Json(json!({
        "name": "notary-server",
        "version": env!("CARGO_PKG_VERSION"),
        "ledger": state.engine.ledger_name(),
        "scheduler": {
            "enabled": config.scheduler.enabled,
            "interval_secs": config.scheduler.interval_secs,
            "batch_size": config.scheduler.batch_size,
        },
    }))
}

/// PUT /v1/artifacts/:kind/:id
///
/// Issue-time hook: fingerprints the raw body and records it as UNANCHORED.
pub async fn issue_artifact(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AnchorRecord>)> {
    let kind: ArtifactKind = kind
        .parse()
        .map_err(|e: notary_types::TypeError| ApiError::BadRequest(e.to_string()))?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("artifact body is empty".into()));
    }
    let record = state.engine.issue_bytes(ArtifactId::new(id), kind, &body)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /v1/artifacts/:kind/:id/stored
///
/// Issue from bytes already present in the artifact directory.
pub async fn issue_stored_artifact(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<AnchorRecord>)> {
    let kind: ArtifactKind = kind
        .parse()
        .map_err(|e: notary_types::TypeError| ApiError::BadRequest(e.to_string()))?;
    let record = state.engine.issue_stored(ArtifactId::new(id), kind)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /v1/artifacts/:id/revoke
pub async fn revoke_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnchorRecord>> {
    Ok(Json(state.engine.revoke(&ArtifactId::new(id)).await?))
}

/// GET /v1/anchoring/stats
pub async fn anchoring_stats(State(state): State<AppState>) -> ApiResult<Json<AnchoringStats>> {
    Ok(Json(state.engine.stats()?))
}

/// POST /v1/anchoring/trigger
pub async fn trigger_anchoring(State(state): State<AppState>) -> ApiResult<Json<RunOutcome>> {
    Ok(Json(state.engine.trigger().await?))
}

/// GET /v1/anchoring/attempts
pub async fn pending_attempts(State(state): State<AppState>) -> ApiResult<Json<Vec<Batch>>> {
    Ok(Json(state.engine.pending_attempts()?))
}

/// GET /v1/anchoring/attempts/orphaned
pub async fn orphaned_attempts(State(state): State<AppState>) -> ApiResult<Json<Vec<AttemptId>>> {
    Ok(Json(state.engine.orphaned_attempts().await?))
}

/// POST /v1/anchoring/attempts/:attempt/reconcile
pub async fn reconcile_attempt(
    State(state): State<AppState>,
    Path(attempt): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Batch>> {
    let attempt: AttemptId = attempt
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid attempt id: {attempt}")))?;
    let resolution: Resolution = parse_json(&body)?;
    Ok(Json(state.engine.reconcile(attempt, resolution).await?))
}

/// GET /v1/proofs/:id
pub async fn export_proof(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProofBundle>> {
    Ok(Json(state.engine.export_proof(&ArtifactId::new(id))?))
}

/// GET /v1/verify/:id[?recheck_bytes=true]
pub async fn verify_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<VerificationResult>> {
    let id = ArtifactId::new(id);
    let result = if query.recheck_bytes {
        state.engine.verify_stored(&id).await?
    } else {
        state.engine.verify_id(&id).await?
    };
    Ok(Json(result))
}

/// POST /v1/verify/upload
pub async fn verify_upload(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<VerificationResult>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("artifact body is empty".into()));
    }
    Ok(Json(state.engine.verify_bytes(&body).await?))
}

/// POST /v1/verify/proof
///
/// Accepts a full proof bundle or a bare `{fingerprint, root, proof,
/// batch_id?}`. Unreadable proof material is reported as NOT_VERIFIED.
pub async fn verify_proof(State(state): State<AppState>, body: Bytes) -> Json<VerificationResult> {
    match serde_json::from_slice::<DetachedProof>(&body) {
        Ok(proof) => Json(state.engine.verify_proof(&proof).await),
        Err(e) => {
            debug!(error = %e, "malformed proof submitted");
            Json(VerificationResult::malformed(format!("malformed proof: {e}")))
        }
    }
}

/// POST /v1/verify/bulk
pub async fn verify_bulk(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<BulkVerifyResponse>> {
    let request: BulkVerifyRequest = parse_json(&body)?;
    let results = state.engine.verify_many(&request.artifact_ids).await?;
    Ok(Json(BulkVerifyResponse { results }))
}
