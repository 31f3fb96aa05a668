//! Cache des URLs directes éphémères.
//!
//! La résolution d'une URL directe passe par le sous-processus d'extraction
//! et coûte cher : le résultat est conservé par content id pendant un TTL
//! (2 h par défaut). Une lecture dans le TTL rend l'URL en cache sans
//! nouvelle résolution ; une lecture au-delà déclenche exactement une
//! résolution et remplace l'entrée.
//!
//! Stratégie de verrouillage : un unique `tokio::sync::Mutex` autour de la
//! map, tenu pendant la résolution elle-même — les écritures sont rares (au
//! plus une par content id et par fenêtre de TTL) et la sérialisation des
//! résolutions garantit qu'un même id n'est jamais résolu deux fois en
//! parallèle. Le cache n'est pas borné : seule l'expiration TTL remplace
//! les entrées (limitation connue, assumée).

use fonoextract::Extractor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CachedUrl {
    url: String,
    fetched_at: Instant,
}

/// Cache TTL des URLs directes éphémères, clé = content id.
pub struct StreamUrlCache {
    extractor: Arc<dyn Extractor>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedUrl>>,
}

impl StreamUrlCache {
    pub fn new(extractor: Arc<dyn Extractor>, ttl: Duration) -> Self {
        Self {
            extractor,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Retourne l'URL directe pour `content_id`, depuis le cache si
    /// l'entrée est encore fraîche, sinon via une nouvelle résolution.
    ///
    /// Fonctionne pour n'importe quel content id valide, y compris ceux
    /// jamais soumis à l'acquisition (mode résolution seule).
    pub async fn resolve(&self, content_id: &str) -> fonoextract::Result<String> {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get(content_id) {
            if entry.fetched_at.elapsed() <= self.ttl {
                debug!(content_id = %content_id, "Stream URL served from cache");
                return Ok(entry.url.clone());
            }
        }

        // Entrée absente ou périmée : exactement une résolution, le lock
        // restant tenu pour sérialiser les demandes concurrentes
        let url = self.extractor.resolve_direct_url(content_id).await?;
        entries.insert(
            content_id.to_string(),
            CachedUrl {
                url: url.clone(),
                fetched_at: Instant::now(),
            },
        );

        debug!(content_id = %content_id, "Stream URL resolved and cached");
        Ok(url)
    }

    /// Nombre d'entrées actuellement en cache (périmées comprises).
    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
