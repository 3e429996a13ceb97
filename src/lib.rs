//! Meme Attribution - contribution attribution engine for minted memes
//!
//! Users train the meme generator by liking and disliking memes. When a
//! meme is minted, its token supply is split among the users who
//! interacted with the memes it was generated from.
//!
//! ## Pipeline
//!
//! | Step | Module |
//! |------|--------|
//! | Contributing memes of the target | [`attribution::lineage`] |
//! | Per-user interaction counts, primary or fallback pass | [`attribution::calculator`] |
//! | Rescale, cap, floor to integer units | [`attribution::normalizer`] |
//! | Wallet address join | [`attribution::address`] |
//! | Orchestration and audit events | [`services`] |
//!
//! The engine only reads the `memes`, `interactions` and `users` tables.

pub mod attribution;
pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports
pub use attribution::{AttributionPass, AttributionRecord, DistributionShare, NormalizerPolicy};
pub use config::Config;
pub use db::MemeDb;
pub use error::AttributionError;
pub use services::{AttributionService, DistributionReport, EventBus};
