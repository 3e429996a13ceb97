//! Contribution attribution engine
//!
//! Decides which users trained a meme and how much of its token supply
//! each of them receives.
//!
//! ```text
//! meme id
//!   → lineage      (contributing meme ids, creation time)
//!   → calculator   (per-user distinct interaction counts, primary or fallback pass)
//!   → normalizer   (rescale to the pool, cap, floor to integer units)
//!   → address join (drop users without a usable wallet)
//! ```
//!
//! Everything here is read-only and deterministic for a fixed snapshot of
//! the memes and interactions tables. Preventing a second on-chain
//! distribution for the same meme is the emitter's job, not the engine's.

pub mod lineage;
pub mod calculator;
pub mod normalizer;
pub mod address;

pub use lineage::{resolve_lineage, Lineage};
pub use calculator::{
    compute_raw_proportions, fallback_pass, primary_pass, select_pass,
    Attribution, AttributionPass, AttributionRecord, PassCounts, Selection,
};
pub use normalizer::{normalize, NormalizedShare, NormalizerPolicy};
pub use address::{
    attach_addresses, is_valid_address, AddressJoin, DistributionShare, DropReason,
    DroppedContributor,
};
