use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use fonodelivery::api::{create_tracks_router, DeliveryState};
use fonodelivery::StreamUrlCache;
use fonoextract::{ExtractedMetadata, Extractor};
use fonoregistry::{Registry, TrackStatus};
use fonostore::{LocalTier, StorageTier, TierObject, TieredResolver};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

const CONTENT: &[u8] = b"0123456789abcdefghijklmnopqrstuv"; // 32 octets
const CID: &str = "aaaaaaaaaaa";

/// Résolveur factice : URLs directes prévisibles, extract inutilisé
struct FakeResolver;

#[async_trait]
impl Extractor for FakeResolver {
    async fn extract(
        &self,
        _url: &str,
        _output: &Path,
    ) -> fonoextract::Result<Option<ExtractedMetadata>> {
        unreachable!("extract is not exercised by delivery tests")
    }

    async fn resolve_direct_url(&self, content_id: &str) -> fonoextract::Result<String> {
        Ok(format!("https://cdn.example/live/{}", content_id))
    }
}

/// Tier durable en mémoire
#[derive(Default)]
struct MemTier {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageTier for MemTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn exists(&self, locator: &str) -> fonostore::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(locator))
    }

    async fn open(&self, locator: &str) -> fonostore::Result<Option<TierObject>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(locator)
            .map(|data| TierObject::Buffer(bytes::Bytes::from(data.clone()))))
    }

    async fn put(&self, locator: &str, source: &Path) -> fonostore::Result<()> {
        let data = tokio::fs::read(source).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(locator.to_string(), data);
        Ok(())
    }
}

struct TestContext {
    _temp: TempDir,
    registry: Arc<Registry>,
    local_dir: std::path::PathBuf,
    mem: Arc<MemTier>,
    state: DeliveryState,
}

fn test_context() -> TestContext {
    let temp = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::init(&temp.path().join("registry.db")).unwrap());
    let local_dir = temp.path().join("audio");
    let local = Arc::new(LocalTier::new(&local_dir).unwrap());
    let mem = Arc::new(MemTier::default());
    let resolver = Arc::new(TieredResolver::new(
        local,
        Some(mem.clone() as Arc<dyn StorageTier>),
    ));
    let stream_urls = Arc::new(StreamUrlCache::new(
        Arc::new(FakeResolver),
        Duration::from_secs(3600),
    ));

    let state = DeliveryState {
        registry: registry.clone(),
        resolver,
        stream_urls,
    };

    TestContext {
        _temp: temp,
        registry,
        local_dir,
        mem,
        state,
    }
}

async fn request(state: &DeliveryState, content_id: &str, range: Option<&str>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let router = create_tracks_router(state.clone());

    let mut builder = Request::builder().uri(format!("/tracks/{}", content_id));
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }

    let response = router
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

fn header_str<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_unknown_content_id_is_404() {
    let ctx = test_context();
    let (status, _, _) = request(&ctx.state, CID, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_registered_but_not_ready_is_425() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Downloading, 0)
        .unwrap();

    let (status, _, _) = request(&ctx.state, CID, None).await;
    assert_eq!(status, StatusCode::TOO_EARLY);
}

#[tokio::test]
async fn test_invalid_content_id_is_400() {
    let ctx = test_context();
    let (status, _, _) = request(&ctx.state, "not-an-id!!", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_full_request_streams_local_file() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (status, headers, body) = request(&ctx.state, CID, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        header_str(&headers, "content-length"),
        Some(CONTENT.len().to_string().as_str())
    );
    assert_eq!(header_str(&headers, "accept-ranges"), Some("bytes"));
    assert_eq!(body, CONTENT);
}

#[tokio::test]
async fn test_bounded_range_returns_exact_window() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (status, headers, body) = request(&ctx.state, CID, Some("bytes=4-9")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    // b-a+1 octets exactement
    assert_eq!(body.len(), 6);
    assert_eq!(body, &CONTENT[4..=9]);
    assert_eq!(header_str(&headers, "content-range"), Some("bytes 4-9/32"));
    assert_eq!(header_str(&headers, "content-length"), Some("6"));
}

#[tokio::test]
async fn test_open_ended_range() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (status, headers, body) = request(&ctx.state, CID, Some("bytes=20-")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, &CONTENT[20..]);
    assert_eq!(header_str(&headers, "content-range"), Some("bytes 20-31/32"));
}

#[tokio::test]
async fn test_suffix_range() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (status, _, body) = request(&ctx.state, CID, Some("bytes=-5")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, &CONTENT[27..]);
}

#[tokio::test]
async fn test_out_of_bounds_range_is_416() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (status, headers, _) = request(&ctx.state, CID, Some("bytes=100-")).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&headers, "content-range"), Some("bytes */32"));
}

#[tokio::test]
async fn test_range_slices_concatenate_to_full_content() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    std::fs::write(ctx.local_dir.join("a.mp3"), CONTENT).unwrap();

    let (_, _, first) = request(&ctx.state, CID, Some("bytes=0-15")).await;
    let (_, _, second) = request(&ctx.state, CID, Some("bytes=16-31")).await;
    let (_, _, full) = request(&ctx.state, CID, None).await;

    let mut concatenated = first;
    concatenated.extend(second);
    assert_eq!(concatenated, full);
}

#[tokio::test]
async fn test_durable_tier_fallback_applies_same_range_logic() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    // Octets uniquement dans le tier durable
    ctx.mem
        .objects
        .lock()
        .unwrap()
        .insert("a.mp3".to_string(), CONTENT.to_vec());

    let (status, headers, body) = request(&ctx.state, CID, Some("bytes=4-9")).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, &CONTENT[4..=9]);
    assert_eq!(header_str(&headers, "content-range"), Some("bytes 4-9/32"));

    let (status, _, body) = request(&ctx.state, CID, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, CONTENT);
}

#[tokio::test]
async fn test_total_miss_redirects_to_live_url() {
    let ctx = test_context();
    ctx.registry
        .create(CID, Some("alice"), "a.mp3", TrackStatus::Ready, 100)
        .unwrap();
    // Aucun tier ne détient les octets

    let (status, headers, _) = request(&ctx.state, CID, None).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        header_str(&headers, "location"),
        Some(format!("https://cdn.example/live/{}", CID).as_str())
    );
}
