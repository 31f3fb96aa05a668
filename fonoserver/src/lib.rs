//! # fonoserver - Serveur HTTP de FonoBox
//!
//! Cette crate fournit une abstraction simple au-dessus d'Axum pour
//! assembler le serveur HTTP de FonoBox :
//!
//! - Montage de sous-routers fournis par les autres crates (`add_router`)
//! - Documentation OpenAPI/Swagger par groupe d'API (`add_openapi`)
//! - Arrêt gracieux sur Ctrl+C
//! - Initialisation du logging (`init_logging`)
//! - Types de réponses API partagés ([`api::ErrorResponse`])

pub mod api;
mod logs;
mod server;

pub use logs::init_logging;
pub use server::{Server, ServerBuilder, ServerInfo};
