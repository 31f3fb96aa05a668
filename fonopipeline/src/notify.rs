//! Canal de notification de progression des acquisitions.
//!
//! Un événement est émis à chaque transition de statut d'une piste. Le
//! transport vers les clients (SSE) est branché dans [`crate::api`] ; les
//! abonnés lents perdent les événements les plus anciens (sémantique
//! broadcast), le registre restant la source de vérité.

use fonoregistry::{Track, TrackStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;

/// Événement de progression d'une acquisition
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressEvent {
    /// Propriétaire de la piste concernée
    pub owner_id: Option<String>,
    /// Identifiant de la piste dans le registre
    pub track_id: i64,
    pub content_id: String,
    /// Progression [0, 100]
    pub progress: u8,
    pub status: TrackStatus,
}

impl ProgressEvent {
    /// Construit l'événement correspondant à l'état courant d'une piste
    pub fn from_track(track: &Track) -> Self {
        Self {
            owner_id: track.owner_id.clone(),
            track_id: track.id,
            content_id: track.content_id.clone(),
            progress: track.progress,
            status: track.status,
        }
    }
}

/// Émetteur des notifications de progression
#[derive(Clone)]
pub struct ProgressNotifier {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity).0,
        }
    }

    /// Émet un événement (silencieux quand personne n'écoute)
    pub fn notify(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
