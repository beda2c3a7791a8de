//! Client-side presence: relay events and the remote-cursor map.
//!
//! [`RelayEvent`] is the typed form of everything the ephemeral relay pushes
//! to a connected peer. [`PresenceTracker`] folds those events into the
//! cursor map the canvas renders, and stamps outgoing samples with the local
//! session identity.
//!
//! Presence is fire-and-forget: no replay on reconnect beyond the relay's own
//! init snapshot, and a missing identity (session storage unavailable) just
//! disables the feature.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use corkboard_types::{Cursor, SessionId, SessionIdentity};

/// Events the relay pushes to a connected peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RelayEvent {
    /// Sent once to a newly connected peer: all currently-live cursors.
    Init(Vec<Cursor>),
    /// A peer moved (also serves as the liveness heartbeat).
    CursorUpdated(Cursor),
    /// A peer left or went stale.
    CursorRemoved(SessionId),
}

/// Remote cursors as the local client should render them.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    /// `None` when session storage was unavailable — presence disabled.
    identity: Option<SessionIdentity>,
    cursors: HashMap<SessionId, Cursor>,
}

impl PresenceTracker {
    pub fn new(identity: Option<SessionIdentity>) -> Self {
        Self { identity, cursors: HashMap::new() }
    }

    /// Whether this client participates in presence at all.
    pub fn is_enabled(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// Remote cursors to render (never includes our own).
    pub fn cursors(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.values()
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    /// Stamp a local pointer sample for publishing to the relay. `None` when
    /// presence is disabled — the caller skips the emit.
    pub fn sample(&self, x: f64, y: f64) -> Option<Cursor> {
        self.identity.as_ref().map(|who| Cursor::new(who, x, y))
    }

    /// Fold one relay event into the cursor map. Samples from our own
    /// session are ignored (the local cursor is not rendered as a peer).
    pub fn apply(&mut self, event: RelayEvent) {
        let own = self.identity.as_ref().map(|i| i.id);
        match event {
            RelayEvent::Init(cursors) => {
                trace!(count = cursors.len(), "presence init snapshot");
                self.cursors = cursors
                    .into_iter()
                    .filter(|c| Some(c.session_id) != own)
                    .map(|c| (c.session_id, c))
                    .collect();
            }
            RelayEvent::CursorUpdated(cursor) => {
                if Some(cursor.session_id) == own {
                    return;
                }
                self.cursors.insert(cursor.session_id, cursor);
            }
            RelayEvent::CursorRemoved(session_id) => {
                if self.cursors.remove(&session_id).is_some() {
                    trace!(session = %session_id, "peer cursor removed");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
