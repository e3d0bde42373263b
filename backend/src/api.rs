use crate::db;
use crate::errors::ApiError;
use crate::issuance;
use crate::sessions::PreparedBatch;
use crate::models::*;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use rand::rngs::OsRng;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;
use zk_credentials::groth16::serialize_vk;
use zk_credentials::types::fr_to_hex;
use zk_credentials::{BatchId, ProofArtifact};

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/batches/prepare", post(prepare_batch))
        .route("/api/v1/batches/:id/publish", post(publish_batch))
        .route("/api/v1/batches/:id/revoke", post(revoke_batch))
        .route("/api/v1/proofs", post(create_proof))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/batches/:id", get(get_batch))
        .route("/api/v1/batches/:id/membership", post(check_membership))
        .route("/api/v1/verify", post(verify_proof))
        .route("/api/v1/zk/vk", get(get_vk))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == state.config.api_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

async fn prepare_batch(
    State(state): State<AppState>,
    Json(req): Json<PrepareRequest>,
) -> Result<Json<PrepareResponse>, ApiError> {
    let prepared = issuance::prepare(
        req.batch,
        req.students,
        state.config.subjects,
        state.config.max_depth,
        &mut OsRng,
    )?;

    let students = prepared
        .records
        .iter()
        .map(|record| PreparedStudent {
            student_id: record.student_id().to_string(),
            salt: *record.salt(),
            commitment: zk_credentials::commit(record),
        })
        .collect();

    let session_id = state.sessions.insert(prepared);
    tracing::info!(session = %session_id, "prepared batch");

    Ok(Json(PrepareResponse {
        session_id,
        expires_in_secs: state.sessions.ttl().as_secs(),
        students,
    }))
}

async fn publish_batch(
    State(state): State<AppState>,
    Path(session): Path<Uuid>,
) -> Result<Json<PublishResponse>, ApiError> {
    let prepared = state
        .sessions
        .take(&session)
        .ok_or_else(|| ApiError::NotFound("session not found or expired".to_string()))?;

    match issue(&state, &prepared).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            // The salts in this session are already in students' hands; keep it for a retry.
            state.sessions.restore(session, prepared);
            tracing::warn!(session = %session, "publish failed, session kept");
            Err(e)
        }
    }
}

async fn issue(state: &AppState, prepared: &PreparedBatch) -> Result<PublishResponse, ApiError> {
    let (tree, export) = issuance::publish(prepared)?;
    let batch_id = db::issue_batch(
        &state.db,
        tree.root(),
        &prepared.metadata,
        tree.len() as u64,
        tree.depth(),
    )
    .await?;

    Ok(PublishResponse { batch_id, export })
}

async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Some(stored) = db::get_batch(&state.db, id).await? else {
        return Err(ApiError::NotFound("batch not found".to_string()));
    };

    let batch = stored.batch;
    Ok(Json(BatchResponse {
        batch_id: batch.id,
        root: fr_to_hex(&batch.root),
        institution: batch.metadata.institution,
        course: batch.metadata.course,
        year: batch.metadata.year,
        total_students: batch.metadata.total_students,
        leaf_count: stored.leaf_count,
        depth: stored.depth,
        created_at: batch.created_at,
        valid: batch.valid,
    }))
}

async fn revoke_batch(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<Json<RevokeResponse>, ApiError> {
    if !db::revoke_batch(&state.db, id).await? {
        return Err(ApiError::NotFound("batch not found".to_string()));
    }
    Ok(Json(RevokeResponse { batch_id: id, valid: false }))
}

async fn check_membership(
    State(state): State<AppState>,
    Path(id): Path<BatchId>,
    Json(req): Json<MembershipRequest>,
) -> Result<Json<MembershipResponse>, ApiError> {
    let member = db::verify_membership(&state.db, id, &req.commitment, &req.proof).await?;
    Ok(Json(MembershipResponse { member }))
}

async fn create_proof(
    State(state): State<AppState>,
    Json(req): Json<ProofRequest>,
) -> Result<Json<ProofArtifact>, ApiError> {
    let Some(stored) = db::get_batch(&state.db, req.batch_id).await? else {
        return Err(ApiError::NotFound("batch not found".to_string()));
    };
    if !stored.batch.valid {
        return Err(ApiError::Conflict("batch has been revoked".to_string()));
    }

    let batch_id = req.batch_id;
    let (private, public) = issuance::proof_inputs(req, stored.batch.root)?;
    let keys = state.ensure_keys(stored.depth).await?;

    // Proving is CPU-bound; keep it off the async workers.
    let artifact = tokio::task::spawn_blocking(move || keys.generate(&private, &public))
        .await
        .map_err(|_| ApiError::Internal)??;

    tracing::info!(batch_id, key_id = %artifact.key_id, "generated proof");
    Ok(Json(artifact))
}

async fn verify_proof(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Some(stored) = db::get_batch(&state.db, req.batch_id).await? else {
        return Err(ApiError::NotFound("batch not found".to_string()));
    };

    let expected = zk_credentials::PublicInputs::new(stored.batch.root, req.threshold_grade, req.require_all)?;
    let keys = state.verifier_keys(stored.depth).await?;
    let verdict = keys.verify_claim(&req.artifact, &expected)?;

    if let Some(reason) = verdict.reason {
        tracing::info!(batch_id = req.batch_id, ?reason, "proof rejected");
    }

    Ok(Json(VerifyResponse {
        valid: verdict.valid && stored.batch.valid,
        reason: verdict.reason,
        batch_valid: stored.batch.valid,
    }))
}

async fn get_vk(
    State(state): State<AppState>,
    Query(params): Query<VkQuery>,
) -> Result<Json<ZkVkResponse>, ApiError> {
    let depth = params.depth.unwrap_or(state.config.max_depth);
    let keys = state.verifier_keys(depth).await?;
    let vk_bytes = serialize_vk(keys.verifying_key())?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(vk_bytes);

    Ok(Json(ZkVkResponse {
        curve: "bn254".to_string(),
        proof_system: "groth16".to_string(),
        key_id: keys.key_id().to_string(),
        subjects: keys.shape().subjects,
        depth: keys.shape().depth,
        vk_b64: b64,
    }))
}
