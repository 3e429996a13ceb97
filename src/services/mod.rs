//! Service layer for meme-attribution
//!
//! ```text
//! CLI / application layer
//!     ↓
//! AttributionService (orchestration, events)
//!     ↓
//! attribution::* (pure engine steps)
//!     ↓
//! db::* (read-only queries)
//! ```

pub mod events;
pub mod attribution_service;

pub use events::{AttributionEvent, EventBus, EventListener, LoggingEventListener, spawn_logging_listener};
pub use attribution_service::{AttributionService, DistributionReport, RawAttribution};
