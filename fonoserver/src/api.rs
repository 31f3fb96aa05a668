//! Types de réponses partagés par les API REST de FonoBox

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Réponse d'erreur générique
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Code d'erreur
    #[schema(example = "NOT_FOUND")]
    pub error: String,
    /// Message descriptif
    #[schema(example = "Track not found in registry")]
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Réponse de succès générique
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// Message de succès
    #[schema(example = "Operation completed successfully")]
    pub message: String,
}
