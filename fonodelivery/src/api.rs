//! Handlers HTTP du service de distribution audio
//!
//! Deux surfaces :
//! - `/audio/tracks/{content_id}` : octets audio avec support des requêtes
//!   Range et repli par tiers (fichier local streamé → objet durable en
//!   mémoire → redirection vers une URL directe éphémère)
//! - `/api/audio/stream-url/{content_id}` : résolution seule, sans
//!   persistance, pour la lecture en avant-première

use crate::range::{parse_range_header, resolve_range, RangeSpec};
use crate::StreamUrlCache;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use fonoregistry::Registry;
use fonoserver::api::ErrorResponse;
use fonostore::{TierObject, TieredResolver};
use serde::Serialize;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::warn;
use utoipa::ToSchema;

/// Type MIME des pistes servies
const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// État partagé des handlers de distribution
#[derive(Clone)]
pub struct DeliveryState {
    pub registry: Arc<Registry>,
    pub resolver: Arc<TieredResolver>,
    pub stream_urls: Arc<StreamUrlCache>,
}

/// Réponse de résolution d'URL directe
#[derive(Debug, Serialize, ToSchema)]
pub struct StreamUrlResponse {
    /// URL directe éphémère vers le média
    #[serde(rename = "streamUrl")]
    #[schema(example = "https://cdn.example/media/dQw4w9WgXcQ")]
    pub stream_url: String,
}

/// Handler GET /tracks/{content_id}
///
/// Sert les octets de la piste en respectant l'en-tête `Range` :
/// - ligne `ready` + tier local : flux du fichier (mémoire bornée)
/// - ligne `ready` + tier durable : objet chargé en mémoire puis découpé
/// - ligne `ready` sans octets nulle part : redirection vers une URL directe
/// - aucune ligne : 404 ; ligne pas encore `ready` : 425
pub async fn get_asset(
    State(state): State<DeliveryState>,
    Path(content_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !fonoextract::is_valid_content_id(&content_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_CONTENT_ID",
                format!("'{}' is not a valid content id", content_id),
            )),
        )
            .into_response();
    }

    let ready = match state.registry.get_ready_by_content_id(&content_id) {
        Ok(row) => row,
        Err(e) => {
            warn!(content_id = %content_id, "Registry lookup failed: {}", e);
            return registry_error_response();
        }
    };

    let Some(track) = ready else {
        // 404 jamais soumis, 425 soumis mais pas encore prêt
        return match state.registry.get_any_by_content_id(&content_id) {
            Ok(Some(_)) => (
                StatusCode::TOO_EARLY,
                Json(ErrorResponse::new(
                    "NOT_READY",
                    format!("Track '{}' is not ready yet", content_id),
                )),
            )
                .into_response(),
            Ok(None) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    "NOT_FOUND",
                    format!("No track registered for content id '{}'", content_id),
                )),
            )
                .into_response(),
            Err(e) => {
                warn!(content_id = %content_id, "Registry lookup failed: {}", e);
                registry_error_response()
            }
        };
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_range_header);

    match state.resolver.resolve(&track.locator).await {
        Some(TierObject::File { path, len }) => serve_file(path, len, range).await,
        Some(TierObject::Buffer(bytes)) => serve_buffer(bytes, range),
        None => {
            // Miss total : redirection vers une URL directe, pas de proxy
            match state.stream_urls.resolve(&content_id).await {
                Ok(url) => Redirect::temporary(&url).into_response(),
                Err(e) => {
                    warn!(content_id = %content_id, "Live passthrough resolution failed: {}", e);
                    (
                        StatusCode::NOT_FOUND,
                        Json(ErrorResponse::new(
                            "NO_SOURCE",
                            format!("No source available for '{}'", content_id),
                        )),
                    )
                        .into_response()
                }
            }
        }
    }
}

fn registry_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("DATABASE_ERROR", "Registry lookup failed")),
    )
        .into_response()
}

/// Sert un fichier local, en flux à mémoire bornée
async fn serve_file(path: PathBuf, len: u64, range: Option<RangeSpec>) -> Response {
    let mut file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), "Cannot open local file: {}", e);
            return (StatusCode::NOT_FOUND, "File not available").into_response();
        }
    };

    let Some(spec) = range else {
        let stream = ReaderStream::new(file);
        return (
            StatusCode::OK,
            [
                ("content-type", AUDIO_CONTENT_TYPE.to_string()),
                ("content-length", len.to_string()),
                ("accept-ranges", "bytes".to_string()),
            ],
            Body::from_stream(stream),
        )
            .into_response();
    };

    let Some((start, end)) = resolve_range(&spec, len) else {
        return range_not_satisfiable(len);
    };

    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        warn!(path = %path.display(), "Seek failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Seek failed").into_response();
    }

    let window = end - start + 1;
    let stream = ReaderStream::new(file.take(window));

    (
        StatusCode::PARTIAL_CONTENT,
        [
            ("content-type", AUDIO_CONTENT_TYPE.to_string()),
            ("content-length", window.to_string()),
            ("content-range", format!("bytes {}-{}/{}", start, end, len)),
            ("accept-ranges", "bytes".to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Sert un objet du tier durable déjà chargé en mémoire
///
/// Même logique de découpage que pour les fichiers locaux.
fn serve_buffer(bytes: Bytes, range: Option<RangeSpec>) -> Response {
    let len = bytes.len() as u64;

    let Some(spec) = range else {
        return (
            StatusCode::OK,
            [
                ("content-type", AUDIO_CONTENT_TYPE.to_string()),
                ("content-length", len.to_string()),
                ("accept-ranges", "bytes".to_string()),
            ],
            Body::from(bytes),
        )
            .into_response();
    };

    let Some((start, end)) = resolve_range(&spec, len) else {
        return range_not_satisfiable(len);
    };

    let window = bytes.slice(start as usize..=end as usize);

    (
        StatusCode::PARTIAL_CONTENT,
        [
            ("content-type", AUDIO_CONTENT_TYPE.to_string()),
            ("content-length", window.len().to_string()),
            ("content-range", format!("bytes {}-{}/{}", start, end, len)),
            ("accept-ranges", "bytes".to_string()),
        ],
        Body::from(window),
    )
        .into_response()
}

fn range_not_satisfiable(len: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [("content-range", format!("bytes */{}", len))],
        "Requested range not satisfiable",
    )
        .into_response()
}

/// Résout une URL directe éphémère pour un content id
///
/// Fonctionne pour tout content id valide, enregistré ou non (lecture en
/// avant-première sans persistance). La résolution passe par le cache TTL.
#[utoipa::path(
    get,
    path = "/stream-url/{content_id}",
    tag = "audio",
    params(
        ("content_id" = String, Path, description = "Content id de l'asset")
    ),
    responses(
        (status = 200, description = "URL directe résolue", body = StreamUrlResponse),
        (status = 400, description = "Content id invalide", body = ErrorResponse),
        (status = 404, description = "Résolution impossible", body = ErrorResponse),
    )
)]
pub async fn get_stream_url(
    State(state): State<DeliveryState>,
    Path(content_id): Path<String>,
) -> Response {
    if !fonoextract::is_valid_content_id(&content_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "INVALID_CONTENT_ID",
                format!("'{}' is not a valid content id", content_id),
            )),
        )
            .into_response();
    }

    match state.stream_urls.resolve(&content_id).await {
        Ok(url) => (StatusCode::OK, Json(StreamUrlResponse { stream_url: url })).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "RESOLVE_FAILED",
                format!("Cannot resolve a direct URL for '{}': {}", content_id, e),
            )),
        )
            .into_response(),
    }
}

/// Crée le router servant les octets audio
///
/// Monté à `/audio` : `GET /audio/tracks/{content_id}`
pub fn create_tracks_router(state: DeliveryState) -> Router {
    Router::new()
        .route("/tracks/{content_id}", get(get_asset))
        .with_state(state)
}

/// Crée le router de l'API de résolution d'URL
///
/// Monté sous `/api/audio` : `GET /api/audio/stream-url/{content_id}`
pub fn create_api_router(state: DeliveryState) -> Router {
    Router::new()
        .route("/stream-url/{content_id}", get(get_stream_url))
        .with_state(state)
}
