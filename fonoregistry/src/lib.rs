//! # fonoregistry - Registre des pistes acquises
//!
//! Cette crate fournit le registre persistant de toutes les pistes audio
//! acquises ou en cours d'acquisition, avec une base SQLite pour les
//! métadonnées et le suivi des statuts.
//!
//! ## Vue d'ensemble
//!
//! Le registre est la source de vérité du pipeline d'acquisition :
//! - Une ligne par couple `(content_id, owner_id)`
//! - Statuts monotones : `downloading → processing → {ready, error}`
//! - Les lignes `ready` et `error` sont terminales (seule la suppression
//!   les fait disparaître)
//! - Suivi de la présence dans le tier de stockage durable pour la
//!   réconciliation (migration)
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use fonoregistry::{Registry, TrackStatus};
//!
//! let registry = Registry::init(std::path::Path::new("registry.db")).unwrap();
//! let track = registry
//!     .create("dQw4w9WgXcQ", Some("alice"), "dQw4w9WgXcQ_alice.mp3",
//!             TrackStatus::Downloading, 0)
//!     .unwrap();
//! registry.update_status(track.id, TrackStatus::Ready, 100).unwrap();
//! ```

pub mod db;

pub use db::{Registry, Track, TrackStatus};
