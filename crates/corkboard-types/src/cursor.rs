//! Presence records: live cursors and the per-tab session identity.
//!
//! A `Cursor` is transient and reconstructible — nobody owns it durably. It
//! is created on the first movement sample from a peer, refreshed on every
//! sample, and deleted on an explicit removal notice or by the relay's
//! inactivity sweep.

use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::now_millis;

/// A peer's live cursor on the canvas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub session_id: SessionId,
    pub x: f64,
    pub y: f64,
    pub user_name: String,
    pub color: String,
    /// Unix millis of the most recent sample.
    pub last_seen: u64,
}

impl Cursor {
    pub fn new(identity: &SessionIdentity, x: f64, y: f64) -> Self {
        Self {
            session_id: identity.id,
            x,
            y,
            user_name: identity.user_name.clone(),
            color: identity.color.clone(),
            last_seen: now_millis(),
        }
    }

    /// Refresh position and liveness from a newer sample.
    pub fn refresh(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.last_seen = now_millis();
    }

    /// Whether this cursor has gone silent for at least `timeout_ms`.
    pub fn is_stale(&self, now_ms: u64, timeout_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_seen) >= timeout_ms
    }
}

/// Stable per-browser-tab identity: who this client appears as to peers.
///
/// Persisted by the client crate's session storage; immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: SessionId,
    pub user_name: String,
    pub color: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            id: SessionId::new(),
            user_name: "Swift Heron".to_string(),
            color: "#e63946".to_string(),
        }
    }

    #[test]
    fn test_cursor_carries_identity() {
        let who = identity();
        let c = Cursor::new(&who, 10.0, 20.0);
        assert_eq!(c.session_id, who.id);
        assert_eq!(c.user_name, who.user_name);
        assert_eq!(c.color, who.color);
        assert!(c.last_seen > 0);
    }

    #[test]
    fn test_refresh_updates_position_and_liveness() {
        let mut c = Cursor::new(&identity(), 0.0, 0.0);
        let before = c.last_seen;
        c.refresh(5.0, 6.0);
        assert_eq!((c.x, c.y), (5.0, 6.0));
        assert!(c.last_seen >= before);
    }

    #[test]
    fn test_staleness() {
        let c = Cursor::new(&identity(), 0.0, 0.0);
        assert!(!c.is_stale(c.last_seen + 9_999, 10_000));
        assert!(c.is_stale(c.last_seen + 10_000, 10_000));
        // A clock that went backwards never evicts.
        assert!(!c.is_stale(c.last_seen.saturating_sub(5_000), 10_000));
    }

    #[test]
    fn test_postcard_roundtrip() {
        let c = Cursor::new(&identity(), 1.5, -0.0);
        let bytes = postcard::to_stdvec(&c).unwrap();
        let parsed: Cursor = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, parsed);
    }
}
