use fonoconfig::get_config;
use fonodelivery::{api as delivery_api, StreamUrlCache};
use fonoextract::YtDlpExtractor;
use fonopipeline::{api as downloads_api, Orchestrator, ProgressNotifier};
use fonoregistry::Registry;
use fonoserver::{init_logging, Server};
use fonostore::{
    api as storage_api, DurableTier, LocalTier, ReacquisitionManager, StorageTier, TieredResolver,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use utoipa::OpenApi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ========== PHASE 1 : Infrastructure ==========

    init_logging();

    let config = get_config();
    info!("🎵 FonoBox instance {}", config.get_instance_uuid()?);

    let registry = Arc::new(Registry::init(Path::new(&config.get_registry_db_path()?))?);
    let local = Arc::new(LocalTier::new(config.get_audio_dir()?)?);

    // Tier durable optionnel : un échec d'initialisation dégrade en
    // fonctionnement local seul
    let durable: Option<Arc<dyn StorageTier>> = match config.get_durable_tier() {
        Some(settings) => match DurableTier::from_settings(&settings).await {
            Ok(tier) => {
                info!(bucket = %settings.bucket, "Durable tier enabled");
                Some(Arc::new(tier))
            }
            Err(e) => {
                warn!("⚠️ Durable tier disabled: {}", e);
                None
            }
        },
        None => {
            info!("No durable tier configured, serving from local tier only");
            None
        }
    };

    let resolver = Arc::new(TieredResolver::new(local, durable));
    let extractor: Arc<dyn fonoextract::Extractor> =
        Arc::new(YtDlpExtractor::new(config.get_extraction_binary()));
    let notifier = ProgressNotifier::default();
    let orchestrator = Arc::new(Orchestrator::new(
        registry.clone(),
        resolver.clone(),
        extractor.clone(),
        notifier.clone(),
    ));
    let stream_urls = Arc::new(StreamUrlCache::new(
        extractor.clone(),
        Duration::from_secs(config.get_stream_url_ttl_secs()),
    ));
    let reacquisitions = Arc::new(ReacquisitionManager::new());

    // ========== PHASE 2 : Routes HTTP ==========

    let mut server = Server::new_configured();

    // Distribution des octets audio (Range, repli par tiers, redirection)
    let delivery_state = delivery_api::DeliveryState {
        registry: registry.clone(),
        resolver: resolver.clone(),
        stream_urls: stream_urls.clone(),
    };
    server
        .add_router(
            "/audio",
            delivery_api::create_tracks_router(delivery_state.clone()),
        )
        .await;
    server
        .add_openapi(
            delivery_api::create_api_router(delivery_state),
            fonodelivery::openapi::ApiDoc::openapi(),
            "audio",
        )
        .await;

    // Soumission et suivi des acquisitions
    let downloads_state = downloads_api::DownloadsApiState {
        orchestrator: orchestrator.clone(),
        registry: registry.clone(),
        resolver: resolver.clone(),
        notifier: notifier.clone(),
    };
    server
        .add_openapi(
            downloads_api::create_api_router(downloads_state),
            fonopipeline::openapi::ApiDoc::openapi(),
            "downloads",
        )
        .await;

    // Maintenance du stockage (migration, re-acquisition)
    let storage_state = storage_api::StorageApiState {
        registry: registry.clone(),
        resolver: resolver.clone(),
        extractor: extractor.clone(),
        manager: reacquisitions.clone(),
    };
    server
        .add_openapi(
            storage_api::create_api_router(storage_state),
            fonostore::openapi::ApiDoc::openapi(),
            "storage",
        )
        .await;

    // ========== PHASE 3 : Démarrage du serveur ==========

    server.start().await;

    info!("✅ FonoBox is ready!");
    info!("Press Ctrl+C to stop...");
    server.wait().await;

    Ok(())
}
