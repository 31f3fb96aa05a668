//! # fonodelivery - Service de distribution audio
//!
//! Cette crate sert les octets audio aux clients :
//!
//! - Résolution par tiers via [`fonostore::TieredResolver`] (disque local,
//!   puis stockage objet durable)
//! - Requêtes HTTP Range : `206` avec `Content-Range` sur une plage
//!   partielle, `200` en flux complet, `416` hors bornes — la même logique
//!   de découpage ([`range`]) est écrite une fois et réutilisée pour les
//!   deux représentations (fichier local streamé, objet durable en mémoire)
//! - Sur miss total, redirection vers une URL directe éphémère obtenue via
//!   le cache [`StreamUrlCache`] (TTL 2 h par défaut), sans proxy des octets
//!
//! Le mode « résolution seule » fonctionne pour n'importe quel content id
//! valide, même jamais soumis à l'acquisition (lecture en avant-première).

pub mod api;
pub mod openapi;
pub mod range;
mod stream_url;

pub use stream_url::StreamUrlCache;
