//! Tiered storage resolver.
//!
//! Read path: local tier first, then durable tier; read failures are logged
//! and degrade silently to the next tier. Write path: the local copy is
//! produced by the extraction subprocess, then a best-effort durable upload
//! is attempted; failures there never abort the acquisition.

use crate::error::{Result, StoreError};
use crate::local::LocalTier;
use crate::tier::{StorageTier, TierObject};
use fonoregistry::Registry;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(feature = "server")]
use utoipa::ToSchema;

/// Outcome of the migration of one registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "server", derive(ToSchema))]
pub enum MigrationOutcome {
    /// Re-uploaded from the local tier to the durable tier.
    Migrated,
    /// Already present in the durable tier.
    Skipped,
    /// Could not be migrated (reason attached). Rows missing from every
    /// tier land here and are candidates for re-acquisition, not migration.
    Failed,
}

/// Per-row migration result.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "server", derive(ToSchema))]
pub struct MigrationItem {
    pub content_id: String,
    pub locator: String,
    pub outcome: MigrationOutcome,
    pub reason: Option<String>,
}

/// Aggregate migration report.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "server", derive(ToSchema))]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<MigrationItem>,
}

/// Read/write abstraction over the storage tiers, tried in priority order.
pub struct TieredResolver {
    local: Arc<LocalTier>,
    durable: Option<Arc<dyn StorageTier>>,
}

impl TieredResolver {
    pub fn new(local: Arc<LocalTier>, durable: Option<Arc<dyn StorageTier>>) -> Self {
        Self { local, durable }
    }

    /// The local tier (the extraction subprocess writes its output there).
    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Opens the asset from the highest-priority tier holding it.
    ///
    /// Tier read failures are logged and degrade to the next tier; `None`
    /// means no tier currently holds the bytes.
    pub async fn resolve(&self, locator: &str) -> Option<TierObject> {
        match self.local.open(locator).await {
            Ok(Some(object)) => return Some(object),
            Ok(None) => {}
            Err(e) => warn!(locator = %locator, "Local tier read failed: {}", e),
        }

        if let Some(durable) = &self.durable {
            match durable.open(locator).await {
                Ok(Some(object)) => return Some(object),
                Ok(None) => {}
                Err(e) => warn!(locator = %locator, "Durable tier read failed: {}", e),
            }
        }

        None
    }

    /// Name of the first tier holding the asset, if any.
    pub async fn tier_of(&self, locator: &str) -> Option<&'static str> {
        if self.local.exists(locator).await.unwrap_or(false) {
            return Some(self.local.name());
        }
        if let Some(durable) = &self.durable {
            if durable.exists(locator).await.unwrap_or(false) {
                return Some(durable.name());
            }
        }
        None
    }

    /// Whether any tier holds bytes for the locator.
    pub async fn exists_anywhere(&self, locator: &str) -> bool {
        self.tier_of(locator).await.is_some()
    }

    /// Best-effort upload of the local copy to the durable tier.
    ///
    /// Returns `Ok(false)` when no durable tier is configured, `Ok(true)`
    /// on success. Callers log the error and carry on: the asset stays
    /// servable from the local tier.
    pub async fn upload_durable(&self, locator: &str) -> Result<bool> {
        let Some(durable) = &self.durable else {
            return Ok(false);
        };

        let source = self.local.file_path(locator)?;
        if !source.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no local copy of '{}' to upload", locator),
            )));
        }

        durable.put(locator, &source).await?;
        Ok(true)
    }

    /// Batch migration of `ready` rows to the durable tier.
    ///
    /// For each row: already durable → `skipped`; present locally →
    /// re-uploaded (`migrated`); missing from both tiers → `failed`, flagged
    /// for re-acquisition rather than migration. Idempotent: a second run
    /// with no intervening changes migrates nothing.
    pub async fn migrate(
        &self,
        registry: &Registry,
        limit: Option<usize>,
    ) -> Result<MigrationReport> {
        let Some(durable) = &self.durable else {
            return Err(StoreError::DurableDisabled);
        };

        let rows = registry
            .list_ready(limit)
            .map_err(|e| StoreError::Registry(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        let mut counts: HashMap<MigrationOutcome, usize> = HashMap::new();
        // Plusieurs lignes peuvent partager un même locator (réutilisation) :
        // on ne traite chaque locator qu'une fois
        let mut handled: HashMap<String, (MigrationOutcome, Option<String>)> = HashMap::new();

        for row in &rows {
            let (outcome, reason) = match handled.get(&row.locator) {
                Some((outcome, reason)) => (*outcome, reason.clone()),
                None => {
                    let result = self.migrate_one(durable.as_ref(), &row.locator).await;
                    handled.insert(row.locator.clone(), result.clone());
                    result
                }
            };

            // Réconciliation du flag de présence durable
            let present = matches!(
                outcome,
                MigrationOutcome::Migrated | MigrationOutcome::Skipped
            );
            if let Err(e) = registry.set_in_durable_tier(row.id, present) {
                warn!(track_id = row.id, "Cannot update durable-tier flag: {}", e);
            }

            *counts.entry(outcome).or_insert(0) += 1;
            results.push(MigrationItem {
                content_id: row.content_id.clone(),
                locator: row.locator.clone(),
                outcome,
                reason,
            });
        }

        let report = MigrationReport {
            total: results.len(),
            migrated: counts.get(&MigrationOutcome::Migrated).copied().unwrap_or(0),
            skipped: counts.get(&MigrationOutcome::Skipped).copied().unwrap_or(0),
            failed: counts.get(&MigrationOutcome::Failed).copied().unwrap_or(0),
            results,
        };

        info!(
            total = report.total,
            migrated = report.migrated,
            skipped = report.skipped,
            failed = report.failed,
            "Durable-tier migration finished"
        );

        Ok(report)
    }

    async fn migrate_one(
        &self,
        durable: &dyn StorageTier,
        locator: &str,
    ) -> (MigrationOutcome, Option<String>) {
        match durable.exists(locator).await {
            Ok(true) => {
                return (
                    MigrationOutcome::Skipped,
                    Some("already in durable tier".to_string()),
                )
            }
            Ok(false) => {}
            Err(e) => return (MigrationOutcome::Failed, Some(e.to_string())),
        }

        let locally_present = self.local.exists(locator).await.unwrap_or(false);
        if !locally_present {
            // Plus aucune copie nulle part : re-acquisition nécessaire
            return (
                MigrationOutcome::Failed,
                Some("missing from all tiers".to_string()),
            );
        }

        let source = match self.local.file_path(locator) {
            Ok(path) => path,
            Err(e) => return (MigrationOutcome::Failed, Some(e.to_string())),
        };

        match durable.put(locator, &source).await {
            Ok(()) => (MigrationOutcome::Migrated, None),
            Err(e) => (MigrationOutcome::Failed, Some(e.to_string())),
        }
    }
}

impl std::fmt::Debug for TieredResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredResolver")
            .field("local_dir", &self.local.dir())
            .field("has_durable", &self.durable.is_some())
            .finish()
    }
}
