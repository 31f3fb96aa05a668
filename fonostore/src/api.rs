//! API REST de maintenance du stockage
//!
//! Expose les opérations opérateur liées au tiering :
//! - Migration des pistes `ready` vers le tier durable
//! - Re-acquisition des pistes absentes de tous les tiers
//! - État de couverture du stockage

use crate::{
    reacquisition_status, start_reacquisition, ReacquisitionManager, TieredResolver,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use fonoextract::Extractor;
use fonoregistry::Registry;
use fonoserver::api::ErrorResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// État partagé des handlers de maintenance du stockage
#[derive(Clone)]
pub struct StorageApiState {
    pub registry: Arc<Registry>,
    pub resolver: Arc<TieredResolver>,
    pub extractor: Arc<dyn Extractor>,
    pub manager: Arc<ReacquisitionManager>,
}

/// Requête de migration
#[derive(Debug, Deserialize, ToSchema)]
pub struct MigrationRequest {
    /// Nombre maximum de lignes à traiter (toutes si absent)
    pub limit: Option<usize>,
}

/// Réponse au déclenchement d'une re-acquisition
#[derive(Debug, Serialize, ToSchema)]
pub struct ReacquireResponse {
    /// Nombre de re-téléchargements démarrés
    pub started: usize,
}

/// Déclenche la migration des pistes `ready` vers le tier durable
///
/// Chaque piste absente du tier durable mais présente localement est
/// re-uploadée. Les pistes absentes de tous les tiers sont signalées en
/// échec (candidates à la re-acquisition).
#[utoipa::path(
    post,
    path = "/migrate",
    tag = "storage",
    request_body = MigrationRequest,
    responses(
        (status = 200, description = "Rapport de migration", body = crate::MigrationReport),
        (status = 409, description = "Tier durable non configuré", body = ErrorResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn trigger_migration(
    State(state): State<StorageApiState>,
    body: Option<Json<MigrationRequest>>,
) -> impl IntoResponse {
    let limit = body.and_then(|Json(req)| req.limit);

    match state.resolver.migrate(&state.registry, limit).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(crate::StoreError::DurableDisabled) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::new(
                "DURABLE_DISABLED",
                "No durable tier is configured",
            )),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "MIGRATION_ERROR",
                format!("Migration failed: {}", e),
            )),
        )
            .into_response(),
    }
}

/// Démarre la re-acquisition des pistes absentes de tous les tiers
///
/// Chaque piste manquante est re-téléchargée en tâche de fond ; les
/// re-téléchargements déjà en cours ne sont pas re-planifiés.
#[utoipa::path(
    post,
    path = "/reacquire",
    tag = "storage",
    responses(
        (status = 202, description = "Re-acquisition planifiée", body = ReacquireResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn trigger_reacquisition(State(state): State<StorageApiState>) -> impl IntoResponse {
    match start_reacquisition(
        state.registry.clone(),
        state.resolver.clone(),
        state.extractor.clone(),
        state.manager.clone(),
    )
    .await
    {
        Ok(started) => (StatusCode::ACCEPTED, Json(ReacquireResponse { started })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "REACQUISITION_ERROR",
                format!("Cannot start re-acquisition: {}", e),
            )),
        )
            .into_response(),
    }
}

/// État de couverture du stockage des pistes `ready`
#[utoipa::path(
    get,
    path = "/reacquisition",
    tag = "storage",
    responses(
        (status = 200, description = "État de la re-acquisition", body = crate::ReacquisitionStatus),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn get_reacquisition_status(State(state): State<StorageApiState>) -> impl IntoResponse {
    match reacquisition_status(&state.registry, &state.resolver, &state.manager).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "STATUS_ERROR",
                format!("Cannot compute storage status: {}", e),
            )),
        )
            .into_response(),
    }
}

/// Crée le router de l'API de maintenance du stockage
pub fn create_api_router(state: StorageApiState) -> Router {
    Router::new()
        .route("/migrate", post(trigger_migration))
        .route("/reacquire", post(trigger_reacquisition))
        .route("/reacquisition", get(get_reacquisition_status))
        .with_state(state)
}
