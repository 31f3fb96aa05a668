//! Download orchestrator.
//!
//! `submit` returns as soon as the registry row exists; the extraction
//! subprocess runs in a background task that drives the status transitions
//! and the durable-tier upload. Closing the originating connection never
//! cancels an in-flight extraction: the task runs to completion or failure
//! and updates the registry regardless.
//!
//! Two different owners submitting the same never-seen content id at nearly
//! the same time may each spawn an extraction. This duplication is accepted:
//! both rows converge to valid ready states, and no per-content-id lock
//! serializes first-time submissions.

use crate::notify::{ProgressEvent, ProgressNotifier};
use fonoextract::{artist, parse_content_id, Extractor};
use fonoregistry::{Registry, Track, TrackStatus};
use fonostore::TieredResolver;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Errors surfaced synchronously by `submit`.
///
/// Everything that happens after the response (extraction failure, metadata
/// trouble, durable upload) propagates exclusively through the registry
/// status and the notification channel.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// No valid content id pattern in the submitted URL. Never retried.
    #[error("no valid content id found in '{0}'")]
    Validation(String),

    /// The caller already owns a row for this content id. Carries the
    /// existing record so the caller can proceed without resubmission.
    #[error("content id already registered for this owner")]
    Duplicate(Box<Track>),

    #[error("registry error: {0}")]
    Registry(String),
}

/// Orchestrates submissions, deduplication, reuse and supervised
/// extraction.
pub struct Orchestrator {
    registry: Arc<Registry>,
    resolver: Arc<TieredResolver>,
    extractor: Arc<dyn Extractor>,
    notifier: ProgressNotifier,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<Registry>,
        resolver: Arc<TieredResolver>,
        extractor: Arc<dyn Extractor>,
        notifier: ProgressNotifier,
    ) -> Self {
        Self {
            registry,
            resolver,
            extractor,
            notifier,
        }
    }

    pub fn notifier(&self) -> &ProgressNotifier {
        &self.notifier
    }

    /// Submits a URL for acquisition on behalf of `owner_id`.
    ///
    /// Returns immediately with the created row; completion is
    /// asynchronous. The reuse check turns the common "song already in the
    /// system" case into a pure registry write with zero extraction work.
    pub async fn submit(&self, url: &str, owner_id: &str) -> Result<Track, SubmitError> {
        let content_id =
            parse_content_id(url).ok_or_else(|| SubmitError::Validation(url.to_string()))?;

        // Court-circuit idempotent
        if let Some(existing) = self
            .registry
            .get_by_content_id_for_owner(&content_id, Some(owner_id))
            .map_err(registry_error)?
        {
            return Err(SubmitError::Duplicate(Box::new(existing)));
        }

        // Réutilisation : un autre propriétaire détient déjà une copie ready
        if let Some(ready) = self
            .registry
            .get_ready_by_content_id(&content_id)
            .map_err(registry_error)?
        {
            return self.reuse_existing(&content_id, owner_id, &ready);
        }

        // Première acquisition de ce contenu
        let locator = locator_for(&content_id, owner_id);
        let track = self
            .registry
            .create(
                &content_id,
                Some(owner_id),
                &locator,
                TrackStatus::Downloading,
                0,
            )
            .map_err(|e| self.duplicate_or_registry(&content_id, owner_id, e))?;

        info!(
            content_id = %content_id,
            owner_id = %owner_id,
            track_id = track.id,
            "Acquisition started"
        );
        self.notifier.notify(ProgressEvent::from_track(&track));
        self.spawn_acquisition(track.clone(), url.to_string());

        Ok(track)
    }

    /// Reuse path: clone the ready row for the new owner, no extraction.
    fn reuse_existing(
        &self,
        content_id: &str,
        owner_id: &str,
        ready: &Track,
    ) -> Result<Track, SubmitError> {
        let track = self
            .registry
            .create(
                content_id,
                Some(owner_id),
                &ready.locator,
                TrackStatus::Ready,
                100,
            )
            .map_err(|e| self.duplicate_or_registry(content_id, owner_id, e))?;

        if let Err(e) = self.registry.update_metadata(
            track.id,
            &ready.title,
            &ready.artist,
            ready.thumbnail_url.as_deref(),
        ) {
            warn!(track_id = track.id, "Cannot copy metadata on reuse: {}", e);
        }

        let track = self.registry.get(track.id).map_err(registry_error)?;

        info!(
            content_id = %content_id,
            owner_id = %owner_id,
            reused_from = ready.id,
            "Reused existing ready copy, no extraction spawned"
        );
        self.notifier.notify(ProgressEvent::from_track(&track));

        Ok(track)
    }

    /// Maps a failed insert to `Duplicate` when a concurrent submit of the
    /// same `(content_id, owner_id)` won the race, `Registry` otherwise.
    fn duplicate_or_registry(
        &self,
        content_id: &str,
        owner_id: &str,
        err: impl std::fmt::Display,
    ) -> SubmitError {
        match self
            .registry
            .get_by_content_id_for_owner(content_id, Some(owner_id))
        {
            Ok(Some(existing)) => SubmitError::Duplicate(Box::new(existing)),
            _ => SubmitError::Registry(err.to_string()),
        }
    }

    /// Supervised extraction in a background task.
    fn spawn_acquisition(&self, track: Track, url: String) {
        let registry = self.registry.clone();
        let resolver = self.resolver.clone();
        let extractor = self.extractor.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            let output = match resolver.local().file_path(&track.locator) {
                Ok(path) => path,
                Err(e) => {
                    error!(track_id = track.id, "Invalid locator: {}", e);
                    set_status(&registry, &notifier, &track, TrackStatus::Error, 0);
                    return;
                }
            };

            match extractor.extract(&url, &output).await {
                Ok(metadata) => {
                    // Métadonnées illisibles = non fatal : les octets audio
                    // sont valides, on applique des valeurs de repli
                    let meta = metadata.unwrap_or_default();
                    let title = artist::derive_title(meta.title.as_deref());
                    let artist_name = artist::derive_artist(
                        meta.title.as_deref(),
                        meta.channel.as_deref(),
                        meta.artist.as_deref(),
                    );

                    if let Err(e) = registry.update_metadata(
                        track.id,
                        &title,
                        &artist_name,
                        meta.thumbnail_url.as_deref(),
                    ) {
                        warn!(track_id = track.id, "Cannot store metadata: {}", e);
                    }

                    set_status(&registry, &notifier, &track, TrackStatus::Processing, 80);

                    // Upload durable best-effort : l'échec laisse la piste
                    // servable depuis le tier local
                    match resolver.upload_durable(&track.locator).await {
                        Ok(true) => {
                            if let Err(e) = registry.set_in_durable_tier(track.id, true) {
                                warn!(track_id = track.id, "Cannot flag durable presence: {}", e);
                            }
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(
                                track_id = track.id,
                                "Durable upload failed, asset stays local only: {}", e
                            );
                        }
                    }

                    set_status(&registry, &notifier, &track, TrackStatus::Ready, 100);
                    info!(
                        content_id = %track.content_id,
                        track_id = track.id,
                        title = %title,
                        artist = %artist_name,
                        "Acquisition finished"
                    );
                }
                Err(e) => {
                    // Terminal pour cette ligne : pas de retry automatique
                    error!(
                        content_id = %track.content_id,
                        track_id = track.id,
                        "Extraction failed: {}", e
                    );
                    set_status(&registry, &notifier, &track, TrackStatus::Error, 0);
                }
            }
        });
    }
}

/// Locator namespaced by content id + truncated owner id, avoiding filename
/// collisions across concurrent owners.
fn locator_for(content_id: &str, owner_id: &str) -> String {
    let owner_part: String = owner_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect();

    if owner_part.is_empty() {
        format!("{}.mp3", content_id)
    } else {
        format!("{}_{}.mp3", content_id, owner_part)
    }
}

fn registry_error(e: impl std::fmt::Display) -> SubmitError {
    SubmitError::Registry(e.to_string())
}

/// Applies a status transition and notifies subscribers.
fn set_status(
    registry: &Registry,
    notifier: &ProgressNotifier,
    track: &Track,
    status: TrackStatus,
    progress: u8,
) {
    match registry.update_status(track.id, status, progress) {
        Ok(true) => {
            let mut event = ProgressEvent::from_track(track);
            event.status = status;
            event.progress = progress;
            notifier.notify(event);
        }
        Ok(false) => {
            warn!(
                track_id = track.id,
                "Refused transition to {:?}: row is terminal or gone", status
            );
        }
        Err(e) => {
            error!(track_id = track.id, "Cannot update status: {}", e);
        }
    }
}
