//! Corkboard server: the authoritative side of a board.
//!
//! Two independent services per board, deliberately not unified:
//!
//! - [`MemoryStore`] — the persistent document (nodes and edges). Validated
//!   writes, full-snapshot broadcasts.
//! - [`CursorRelay`] — ephemeral presence. Fire-and-forget fan-out with
//!   heartbeat-based eviction; nothing survives a restart.
//!
//! Document consistency and presence liveness have different failure modes
//! and different timeouts, so each keeps its own eviction and delivery rules.

pub mod relay;
pub mod store;

pub use relay::{CursorRelay, CURSOR_TTL_MS, SWEEP_INTERVAL_MS};
pub use store::MemoryStore;
