//! Initialisation du système de logging
//!
//! Configure `tracing-subscriber` avec un filtre de niveau issu de la
//! configuration (surchargeable par `RUST_LOG`) et une sortie console
//! optionnelle.

use fonoconfig::get_config;
use tracing_subscriber::EnvFilter;

/// Initialise le logging global du processus
///
/// Le niveau minimal vient de la configuration (`logs.min_level`), la
/// variable d'environnement `RUST_LOG` reste prioritaire si définie.
pub fn init_logging() {
    let config = get_config();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_min_level()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true);

    if config.get_log_enable_console() {
        builder.init();
    } else {
        builder.with_writer(std::io::sink).init();
    }
}
