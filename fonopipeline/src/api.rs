//! API REST de gestion des acquisitions
//!
//! L'identité est un collaborateur externe : le propriétaire arrive déjà
//! authentifié dans l'en-tête `X-Owner-Id` (400 s'il manque).

use crate::{Orchestrator, ProgressNotifier, SubmitError};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use fonoregistry::{Registry, Track};
use fonoserver::api::{ErrorResponse, MessageResponse};
use fonostore::TieredResolver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

/// État partagé des handlers de gestion des acquisitions
#[derive(Clone)]
pub struct DownloadsApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<Registry>,
    pub resolver: Arc<TieredResolver>,
    pub notifier: ProgressNotifier,
}

/// Requête de soumission d'une acquisition
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// URL de l'asset externe à acquérir
    #[schema(example = "https://www.youtube.com/watch?v=dQw4w9WgXcQ")]
    pub url: String,
}

/// Réponse 409 : le propriétaire détient déjà ce contenu
#[derive(Debug, Serialize, ToSchema)]
pub struct DuplicateResponse {
    #[schema(example = "DUPLICATE")]
    pub error: String,
    pub message: String,
    /// La ligne existante, pour que le client reprenne sans re-soumettre
    pub track: Track,
}

fn owner_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-owner-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

fn missing_owner_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(
            "MISSING_OWNER",
            "The X-Owner-Id header is required",
        )),
    )
        .into_response()
}

/// Soumet une URL pour acquisition
///
/// Répond immédiatement avec la ligne créée (`downloading`), la suite de
/// l'acquisition étant visible via le registre et `/events`. Le cas « déjà
/// présent chez un autre propriétaire » est résolu sans extraction.
#[utoipa::path(
    post,
    path = "/",
    tag = "downloads",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Acquisition créée (ou copie réutilisée)", body = Track),
        (status = 400, description = "URL invalide ou propriétaire manquant", body = ErrorResponse),
        (status = 409, description = "Contenu déjà enregistré pour ce propriétaire", body = DuplicateResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn submit_download(
    State(state): State<DownloadsApiState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Response {
    let Some(owner_id) = owner_from_headers(&headers) else {
        return missing_owner_response();
    };

    match state.orchestrator.submit(&req.url, &owner_id).await {
        Ok(track) => (StatusCode::OK, Json(track)).into_response(),
        Err(SubmitError::Validation(url)) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_URL",
                format!("No valid content id found in '{}'", url),
            )),
        )
            .into_response(),
        Err(SubmitError::Duplicate(track)) => (
            StatusCode::CONFLICT,
            Json(DuplicateResponse {
                error: "DUPLICATE".to_string(),
                message: format!(
                    "Content '{}' is already registered for this owner",
                    track.content_id
                ),
                track: *track,
            }),
        )
            .into_response(),
        Err(SubmitError::Registry(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "DATABASE_ERROR",
                format!("Cannot submit download: {}", e),
            )),
        )
            .into_response(),
    }
}

/// Liste les pistes du propriétaire, les plus récentes d'abord
#[utoipa::path(
    get,
    path = "/",
    tag = "downloads",
    responses(
        (status = 200, description = "Pistes du propriétaire", body = Vec<Track>),
        (status = 400, description = "Propriétaire manquant", body = ErrorResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn list_downloads(
    State(state): State<DownloadsApiState>,
    headers: HeaderMap,
) -> Response {
    let Some(owner_id) = owner_from_headers(&headers) else {
        return missing_owner_response();
    };

    match state.registry.list_for_owner(&owner_id) {
        Ok(tracks) => (StatusCode::OK, Json(tracks)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "DATABASE_ERROR",
                format!("Cannot list downloads: {}", e),
            )),
        )
            .into_response(),
    }
}

/// Récupère une piste du propriétaire (owner check inclus)
fn owned_track(state: &DownloadsApiState, id: i64, owner_id: &str) -> Result<Track, Response> {
    match state.registry.get(id) {
        Ok(track) => {
            if track.owner_id.as_deref() == Some(owner_id) {
                Ok(track)
            } else {
                Err((
                    StatusCode::FORBIDDEN,
                    Json(ErrorResponse::new(
                        "FORBIDDEN",
                        "This track belongs to another owner",
                    )),
                )
                    .into_response())
            }
        }
        Err(_) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "NOT_FOUND",
                format!("No track with id {}", id),
            )),
        )
            .into_response()),
    }
}

/// Supprime une piste du propriétaire
///
/// Le fichier local n'est retiré que si plus aucune ligne ne référence le
/// même locator (plusieurs propriétaires peuvent partager une copie).
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "downloads",
    params(("id" = i64, Path, description = "Identifiant de la piste")),
    responses(
        (status = 200, description = "Piste supprimée", body = MessageResponse),
        (status = 403, description = "Piste d'un autre propriétaire", body = ErrorResponse),
        (status = 404, description = "Piste inconnue", body = ErrorResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn delete_download(
    State(state): State<DownloadsApiState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let Some(owner_id) = owner_from_headers(&headers) else {
        return missing_owner_response();
    };

    let track = match owned_track(&state, id, &owner_id) {
        Ok(track) => track,
        Err(response) => return response,
    };

    if let Err(e) = state.registry.delete(track.id) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "DATABASE_ERROR",
                format!("Cannot delete track: {}", e),
            )),
        )
            .into_response();
    }

    // Dernière référence : retrait du fichier local (absence tolérée)
    let remaining = state.registry.count_by_locator(&track.locator).unwrap_or(0);
    if remaining == 0 {
        if let Ok(path) = state.resolver.local().file_path(&track.locator) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(locator = %track.locator, "Cannot remove local file: {}", e);
                }
            }
        }
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: format!("Track {} deleted", id),
        }),
    )
        .into_response()
}

/// Marque une piste du propriétaire comme partagée
#[utoipa::path(
    post,
    path = "/{id}/share",
    tag = "downloads",
    params(("id" = i64, Path, description = "Identifiant de la piste")),
    responses(
        (status = 200, description = "Piste partagée", body = Track),
        (status = 403, description = "Piste d'un autre propriétaire", body = ErrorResponse),
        (status = 404, description = "Piste inconnue", body = ErrorResponse),
        (status = 500, description = "Erreur interne", body = ErrorResponse),
    )
)]
pub async fn share_download(
    State(state): State<DownloadsApiState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let Some(owner_id) = owner_from_headers(&headers) else {
        return missing_owner_response();
    };

    let track = match owned_track(&state, id, &owner_id) {
        Ok(track) => track,
        Err(response) => return response,
    };

    if let Err(e) = state.registry.mark_shared(track.id, true) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "DATABASE_ERROR",
                format!("Cannot share track: {}", e),
            )),
        )
            .into_response();
    }

    match state.registry.get(track.id) {
        Ok(track) => (StatusCode::OK, Json(track)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                "DATABASE_ERROR",
                format!("Cannot reload track: {}", e),
            )),
        )
            .into_response(),
    }
}

/// Flux SSE des événements de progression
///
/// Un événement JSON par transition de statut, tous propriétaires
/// confondus ; le client filtre sur `owner_id`.
pub async fn download_events(State(state): State<DownloadsApiState>) -> impl IntoResponse {
    let mut rx = state.notifier.subscribe();

    let stream = async_stream::stream! {
        while let Ok(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                yield Ok::<_, axum::Error>(Event::default().data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Crée le router de l'API de gestion des acquisitions
pub fn create_api_router(state: DownloadsApiState) -> Router {
    Router::new()
        .route("/", post(submit_download).get(list_downloads))
        .route("/{id}", delete(delete_download))
        .route("/{id}/share", post(share_download))
        .route("/events", get(download_events))
        .with_state(state)
}
