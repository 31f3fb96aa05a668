//! Re-acquisition of assets missing from every storage tier.
//!
//! When migration finds a ready row whose bytes are gone from both the
//! local and the durable tier, the data no longer exists anywhere to copy:
//! the only repair is a full re-run of the extraction. An in-flight set of
//! content ids prevents duplicate concurrent re-downloads; entries are
//! removed on completion or failure regardless of outcome. The set is
//! process-local: migration is an operator-triggered maintenance action.

use crate::error::{Result, StoreError};
use crate::resolver::TieredResolver;
use fonoextract::{watch_url, Extractor};
use fonoregistry::{Registry, Track};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[cfg(feature = "server")]
use utoipa::ToSchema;

/// Process-local set of content ids being re-acquired.
///
/// Locking strategy: one `std::sync::Mutex` around the whole set; every
/// access is a short insert/remove/snapshot, never held across awaits.
#[derive(Debug, Default)]
pub struct ReacquisitionManager {
    in_flight: Mutex<HashSet<String>>,
}

impl ReacquisitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-if-absent. Returns `false` when a re-download of this content
    /// id is already running.
    pub fn begin(&self, content_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap()
            .insert(content_id.to_string())
    }

    /// Unconditional removal, called on completion or failure.
    pub fn finish(&self, content_id: &str) {
        self.in_flight.lock().unwrap().remove(content_id);
    }

    pub fn is_in_flight(&self, content_id: &str) -> bool {
        self.in_flight.lock().unwrap().contains(content_id)
    }

    /// Snapshot of the content ids currently being re-acquired.
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.in_flight.lock().unwrap().iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Storage coverage report for ready assets.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "server", derive(ToSchema))]
pub struct ReacquisitionStatus {
    /// Ready rows in the registry.
    pub total: usize,
    /// Assets held by at least one storage tier.
    pub in_storage: usize,
    /// Assets missing from every tier.
    pub missing: usize,
    /// Re-downloads currently running.
    pub in_progress: usize,
    pub active_content_ids: Vec<String>,
}

/// Computes the storage coverage of all ready assets.
pub async fn reacquisition_status(
    registry: &Registry,
    resolver: &TieredResolver,
    manager: &ReacquisitionManager,
) -> Result<ReacquisitionStatus> {
    let rows = registry
        .list_ready(None)
        .map_err(|e| StoreError::Registry(e.to_string()))?;

    let mut seen: HashSet<&str> = HashSet::new();
    let mut total = 0;
    let mut in_storage = 0;
    let mut missing = 0;

    for row in &rows {
        if !seen.insert(row.content_id.as_str()) {
            continue;
        }
        total += 1;
        if resolver.exists_anywhere(&row.locator).await {
            in_storage += 1;
        } else {
            missing += 1;
        }
    }

    let active = manager.active();
    Ok(ReacquisitionStatus {
        total,
        in_storage,
        missing,
        in_progress: active.len(),
        active_content_ids: active,
    })
}

/// Starts re-acquisition of every ready asset missing from all tiers.
///
/// Each missing asset is re-downloaded in its own background task, guarded
/// by the in-flight set. Returns the number of re-downloads actually
/// started (already-running ones are not double-scheduled).
pub async fn start_reacquisition(
    registry: Arc<Registry>,
    resolver: Arc<TieredResolver>,
    extractor: Arc<dyn Extractor>,
    manager: Arc<ReacquisitionManager>,
) -> Result<usize> {
    let rows = registry
        .list_ready(None)
        .map_err(|e| StoreError::Registry(e.to_string()))?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut started = 0;

    for row in rows {
        if !seen.insert(row.content_id.clone()) {
            continue;
        }
        if resolver.exists_anywhere(&row.locator).await {
            continue;
        }
        if !manager.begin(&row.content_id) {
            continue;
        }

        started += 1;
        spawn_reacquire_task(
            row,
            registry.clone(),
            resolver.clone(),
            extractor.clone(),
            manager.clone(),
        );
    }

    info!(started, "Re-acquisition pass scheduled");
    Ok(started)
}

fn spawn_reacquire_task(
    row: Track,
    registry: Arc<Registry>,
    resolver: Arc<TieredResolver>,
    extractor: Arc<dyn Extractor>,
    manager: Arc<ReacquisitionManager>,
) {
    tokio::spawn(async move {
        let content_id = row.content_id.clone();
        let url = watch_url(&content_id);

        let output = match resolver.local().file_path(&row.locator) {
            Ok(path) => path,
            Err(e) => {
                warn!(content_id = %content_id, "Invalid locator, cannot re-acquire: {}", e);
                manager.finish(&content_id);
                return;
            }
        };

        match extractor.extract(&url, &output).await {
            Ok(_) => {
                info!(content_id = %content_id, "Re-acquired missing asset");
                match resolver.upload_durable(&row.locator).await {
                    Ok(true) => {
                        if let Err(e) = registry.set_in_durable_tier(row.id, true) {
                            warn!(track_id = row.id, "Cannot update durable-tier flag: {}", e);
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(content_id = %content_id, "Durable upload after re-acquisition failed: {}", e)
                    }
                }
            }
            Err(e) => {
                warn!(content_id = %content_id, "Re-acquisition failed: {}", e);
            }
        }

        // Retrait inconditionnel, succès ou échec
        manager.finish(&content_id);
    });
}
