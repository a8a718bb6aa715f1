use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Notary endpoints.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/info", get(handler::info))
        // Both artifact routes share one capture name at the second segment:
        // the kind for issuance, the artifact id for revocation.
        .route("/v1/artifacts/:key/:id", put(handler::issue_artifact))
        .route("/v1/artifacts/:key/revoke", post(handler::revoke_artifact))
        .route("/v1/artifacts/:key/:id/stored", put(handler::issue_stored_artifact))
        .route("/v1/anchoring/stats", get(handler::anchoring_stats))
        .route("/v1/anchoring/trigger", post(handler::trigger_anchoring))
        .route("/v1/anchoring/attempts", get(handler::pending_attempts))
        .route("/v1/anchoring/attempts/orphaned", get(handler::orphaned_attempts))
        .route(
            "/v1/anchoring/attempts/:attempt/reconcile",
            post(handler::reconcile_attempt),
        )
        .route("/v1/proofs/:id", get(handler::export_proof))
        .route("/v1/verify/upload", post(handler::verify_upload))
        .route("/v1/verify/proof", post(handler::verify_proof))
        .route("/v1/verify/bulk", post(handler::verify_bulk))
        .route("/v1/verify/:id", get(handler::verify_id))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
