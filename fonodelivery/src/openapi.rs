//! Documentation OpenAPI pour l'API audio

use utoipa::OpenApi;

/// Documentation OpenAPI de l'API audio de FonoBox
///
/// La route de distribution des octets (`GET /audio/tracks/{content_id}`)
/// est décrite ici à titre informatif : elle sert un corps binaire avec
/// support des requêtes Range et n'est pas exposée dans Swagger.
#[derive(OpenApi)]
#[openapi(
    paths(crate::api::get_stream_url),
    components(
        schemas(
            crate::api::StreamUrlResponse,
            fonoserver::api::ErrorResponse,
        )
    ),
    tags(
        (name = "audio", description = "Distribution audio et résolution d'URLs directes")
    ),
    info(
        title = "FonoBox Audio API",
        version = "0.1.0",
        description = r#"
# API de distribution audio

## Servir les octets

### GET /audio/tracks/{content_id}
Sert la piste avec support des requêtes Range :
- `200` : contenu complet (flux)
- `206` : plage partielle avec `Content-Range`
- `302/307` : redirection vers une URL directe éphémère quand aucun tier ne détient les octets
- `404` : content id inconnu — `425` : acquisition pas encore terminée
- `416` : plage hors bornes

## Résolution seule

### GET /api/audio/stream-url/{content_id}
Résout une URL directe éphémère (cache TTL), sans persistance.
"#
    )
)]
pub struct ApiDoc;
