//! Documentation OpenAPI pour l'API de maintenance du stockage

use utoipa::OpenApi;

/// Documentation OpenAPI de l'API storage de FonoBox
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::trigger_migration,
        crate::api::trigger_reacquisition,
        crate::api::get_reacquisition_status,
    ),
    components(
        schemas(
            crate::api::MigrationRequest,
            crate::api::ReacquireResponse,
            crate::MigrationReport,
            crate::MigrationItem,
            crate::MigrationOutcome,
            crate::ReacquisitionStatus,
            fonoserver::api::ErrorResponse,
        )
    ),
    tags(
        (name = "storage", description = "Maintenance des tiers de stockage")
    ),
    info(
        title = "FonoBox Storage API",
        version = "0.1.0",
        description = "Migration vers le tier durable et re-acquisition des pistes manquantes"
    )
)]
pub struct ApiDoc;
