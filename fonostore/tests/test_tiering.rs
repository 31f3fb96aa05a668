use async_trait::async_trait;
use bytes::Bytes;
use fonoregistry::{Registry, TrackStatus};
use fonostore::{
    LocalTier, MigrationOutcome, ReacquisitionManager, StorageTier, TierObject, TieredResolver,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Tier durable en mémoire pour les tests
#[derive(Debug, Default)]
struct MemTier {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemTier {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&self, locator: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(locator.to_string(), data.to_vec());
    }

    fn contains(&self, locator: &str) -> bool {
        self.objects.lock().unwrap().contains_key(locator)
    }
}

#[async_trait]
impl StorageTier for MemTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn exists(&self, locator: &str) -> fonostore::Result<bool> {
        Ok(self.contains(locator))
    }

    async fn open(&self, locator: &str) -> fonostore::Result<Option<TierObject>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(locator)
            .map(|data| TierObject::Buffer(Bytes::from(data.clone()))))
    }

    async fn put(&self, locator: &str, source: &Path) -> fonostore::Result<()> {
        let data = tokio::fs::read(source).await?;
        self.insert(locator, &data);
        Ok(())
    }
}

fn test_setup() -> (TempDir, Registry, Arc<LocalTier>, Arc<MemTier>, TieredResolver) {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Registry::init(&temp_dir.path().join("registry.db")).unwrap();
    let local = Arc::new(LocalTier::new(temp_dir.path().join("audio")).unwrap());
    let mem = Arc::new(MemTier::new());
    let resolver = TieredResolver::new(local.clone(), Some(mem.clone() as Arc<dyn StorageTier>));
    (temp_dir, registry, local, mem, resolver)
}

fn write_local(local: &LocalTier, locator: &str, data: &[u8]) {
    std::fs::write(local.file_path(locator).unwrap(), data).unwrap();
}

#[tokio::test]
async fn test_local_tier_roundtrip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let local = LocalTier::new(temp_dir.path().join("audio")).unwrap();

    assert!(!local.exists("a.mp3").await.unwrap());
    assert!(local.open("a.mp3").await.unwrap().is_none());

    write_local(&local, "a.mp3", b"audio bytes");

    assert!(local.exists("a.mp3").await.unwrap());
    match local.open("a.mp3").await.unwrap().unwrap() {
        TierObject::File { len, .. } => assert_eq!(len, 11),
        other => panic!("expected a file object, got {:?}", other),
    }
}

#[tokio::test]
async fn test_local_tier_rejects_traversal() {
    let temp_dir = tempfile::tempdir().unwrap();
    let local = LocalTier::new(temp_dir.path().join("audio")).unwrap();

    assert!(local.file_path("../escape.mp3").is_err());
    assert!(local.file_path("a/b.mp3").is_err());
}

#[tokio::test]
async fn test_resolver_prefers_local_tier() {
    let (_tmp, _registry, local, mem, resolver) = test_setup();

    write_local(&local, "x.mp3", b"local copy");
    mem.insert("x.mp3", b"durable copy");

    match resolver.resolve("x.mp3").await.unwrap() {
        TierObject::File { .. } => {}
        other => panic!("expected the local file, got {:?}", other),
    }
    assert_eq!(resolver.tier_of("x.mp3").await, Some("local"));
}

#[tokio::test]
async fn test_resolver_falls_back_to_durable_tier() {
    let (_tmp, _registry, _local, mem, resolver) = test_setup();

    mem.insert("y.mp3", b"durable only");

    match resolver.resolve("y.mp3").await.unwrap() {
        TierObject::Buffer(bytes) => assert_eq!(&bytes[..], b"durable only"),
        other => panic!("expected a buffer, got {:?}", other),
    }
    assert_eq!(resolver.tier_of("y.mp3").await, Some("durable"));

    // Miss total
    assert!(resolver.resolve("zzz.mp3").await.is_none());
    assert!(!resolver.exists_anywhere("zzz.mp3").await);
}

#[tokio::test]
async fn test_upload_durable_best_effort() {
    let (_tmp, _registry, local, mem, resolver) = test_setup();

    write_local(&local, "u.mp3", b"to upload");
    assert!(resolver.upload_durable("u.mp3").await.unwrap());
    assert!(mem.contains("u.mp3"));

    // Pas de copie locale : erreur remontée au caller (qui loggue et continue)
    assert!(resolver.upload_durable("missing.mp3").await.is_err());
}

#[tokio::test]
async fn test_upload_durable_disabled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let local = Arc::new(LocalTier::new(temp_dir.path().join("audio")).unwrap());
    let resolver = TieredResolver::new(local, None);

    assert!(!resolver.upload_durable("a.mp3").await.unwrap());
}

#[tokio::test]
async fn test_migration_outcomes_and_idempotence() {
    let (_tmp, registry, local, mem, resolver) = test_setup();

    // Piste locale uniquement : sera migrée
    registry
        .create("aaaaaaaaaaa", Some("alice"), "local_only.mp3", TrackStatus::Ready, 100)
        .unwrap();
    write_local(&local, "local_only.mp3", b"local bytes");

    // Piste déjà durable : sera sautée
    registry
        .create("bbbbbbbbbbb", Some("alice"), "in_durable.mp3", TrackStatus::Ready, 100)
        .unwrap();
    mem.insert("in_durable.mp3", b"durable bytes");

    // Piste disparue de partout : signalée en échec
    registry
        .create("ccccccccccc", Some("alice"), "gone.mp3", TrackStatus::Ready, 100)
        .unwrap();

    // Les pistes non ready sont hors périmètre
    registry
        .create("ddddddddddd", Some("alice"), "pending.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    let report = resolver.migrate(&registry, None).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert!(mem.contains("local_only.mp3"));

    let failed = report
        .results
        .iter()
        .find(|item| item.outcome == MigrationOutcome::Failed)
        .unwrap();
    assert_eq!(failed.locator, "gone.mp3");
    assert_eq!(failed.reason.as_deref(), Some("missing from all tiers"));

    // Idempotence : un second passage ne migre plus rien
    let second = resolver.migrate(&registry, None).await.unwrap();
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(second.failed, 1);

    // Le flag durable a été réconcilié dans le registre
    let missing = registry.list_ready_missing_from_durable_tier(None).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].locator, "gone.mp3");
}

#[tokio::test]
async fn test_migration_requires_durable_tier() {
    let temp_dir = tempfile::tempdir().unwrap();
    let registry = Registry::init(&temp_dir.path().join("registry.db")).unwrap();
    let local = Arc::new(LocalTier::new(temp_dir.path().join("audio")).unwrap());
    let resolver = TieredResolver::new(local, None);

    let result = resolver.migrate(&registry, None).await;
    assert!(matches!(result, Err(fonostore::StoreError::DurableDisabled)));
}

#[test]
fn test_in_flight_set_semantics() {
    let manager = ReacquisitionManager::new();

    assert!(manager.begin("dQw4w9WgXcQ"));
    // Un re-téléchargement du même contenu n'est pas doublé
    assert!(!manager.begin("dQw4w9WgXcQ"));
    assert!(manager.is_in_flight("dQw4w9WgXcQ"));
    assert_eq!(manager.active(), vec!["dQw4w9WgXcQ".to_string()]);

    // Retrait inconditionnel
    manager.finish("dQw4w9WgXcQ");
    assert!(!manager.is_in_flight("dQw4w9WgXcQ"));
    assert!(manager.begin("dQw4w9WgXcQ"));
}

#[tokio::test]
async fn test_reacquisition_status_counts() {
    let (_tmp, registry, local, _mem, resolver) = test_setup();
    let manager = ReacquisitionManager::new();

    registry
        .create("aaaaaaaaaaa", Some("alice"), "present.mp3", TrackStatus::Ready, 100)
        .unwrap();
    write_local(&local, "present.mp3", b"bytes");

    registry
        .create("bbbbbbbbbbb", Some("alice"), "absent.mp3", TrackStatus::Ready, 100)
        .unwrap();

    // Deux propriétaires sur le même contenu : compté une seule fois
    registry
        .create("bbbbbbbbbbb", Some("bob"), "absent.mp3", TrackStatus::Ready, 100)
        .unwrap();

    let status = fonostore::reacquisition_status(&registry, &resolver, &manager)
        .await
        .unwrap();
    assert_eq!(status.total, 2);
    assert_eq!(status.in_storage, 1);
    assert_eq!(status.missing, 1);
    assert_eq!(status.in_progress, 0);
    assert!(status.active_content_ids.is_empty());
}
