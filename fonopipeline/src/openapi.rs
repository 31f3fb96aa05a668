//! Documentation OpenAPI pour l'API de gestion des acquisitions

use utoipa::OpenApi;

/// Documentation OpenAPI de l'API downloads de FonoBox
///
/// Le flux SSE `GET /api/downloads/events` (un événement JSON par
/// transition de statut) n'apparaît pas dans Swagger.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::submit_download,
        crate::api::list_downloads,
        crate::api::delete_download,
        crate::api::share_download,
    ),
    components(
        schemas(
            crate::api::SubmitRequest,
            crate::api::DuplicateResponse,
            crate::ProgressEvent,
            fonoregistry::Track,
            fonoregistry::TrackStatus,
            fonoserver::api::ErrorResponse,
            fonoserver::api::MessageResponse,
        )
    ),
    tags(
        (name = "downloads", description = "Soumission et suivi des acquisitions audio")
    ),
    info(
        title = "FonoBox Downloads API",
        version = "0.1.0",
        description = r#"
# API d'acquisition audio

## Soumettre une acquisition

### POST /api/downloads
Soumet l'URL d'un asset externe. Répond immédiatement :
- `200` : ligne créée (`downloading`), ou copie `ready` réutilisée
- `409` : le propriétaire détient déjà ce contenu (ligne existante jointe)
- `400` : URL sans content id valide

## Suivi

### GET /api/downloads/events
Flux SSE des transitions de statut (`downloading` → `processing` → `ready`/`error`).
"#
    )
)]
pub struct ApiDoc;
