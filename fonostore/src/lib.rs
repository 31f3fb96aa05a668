//! # fonostore - Storage tiering resolver
//!
//! A single read/write abstraction over the storage backends holding
//! acquired audio, tried in fixed priority order:
//!
//! 1. **Local tier** — ephemeral disk, fast path for recently acquired
//!    content ([`LocalTier`]).
//! 2. **Durable tier** — S3-compatible object store under a namespaced
//!    prefix, optional ([`DurableTier`]).
//!
//! A total miss is handled upstream by the delivery service, which redirects
//! the client to a live direct URL instead of serving bytes.
//!
//! The crate also owns the two maintenance operations tied to tiering:
//! **migration** (re-uploading ready assets missing from the durable tier)
//! and **re-acquisition** (re-running extraction for assets whose bytes are
//! gone from every tier), plus the HTTP API exposing them.

mod durable;
mod error;
mod local;
mod reacquire;
mod resolver;
mod tier;

#[cfg(feature = "server")]
pub mod api;
#[cfg(feature = "server")]
pub mod openapi;

pub use durable::DurableTier;
pub use error::{Result, StoreError};
pub use local::LocalTier;
pub use reacquire::{
    reacquisition_status, start_reacquisition, ReacquisitionManager, ReacquisitionStatus,
};
pub use resolver::{MigrationItem, MigrationOutcome, MigrationReport, TieredResolver};
pub use tier::{StorageTier, TierObject};
