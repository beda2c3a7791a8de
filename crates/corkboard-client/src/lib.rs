//! Corkboard client engine
//!
//! Everything a Corkboard client needs between its UI layer and the
//! authoritative store: session identity, the optimistic canvas model with
//! pending-write conflict detection, the two-phase node-creation gesture,
//! time-until-ready calculation, and ephemeral cursor presence.
//!
//! The UI owns a [`CanvasModel`] bound to a [`GraphStore`] implementation,
//! feeds pointer events in, applies subscription snapshots as they arrive,
//! and renders whatever the model holds. All reconciliation rules (snapshots
//! win, rollbacks on rejection, conflict banners) live here, not in the UI.

pub mod canvas;
pub mod critical_path;
pub mod gesture;
pub mod pending;
pub mod presence;
pub mod recalc;
pub mod session;
pub mod store;

pub use canvas::{CanvasError, CanvasModel};
pub use critical_path::time_until_ready;
pub use gesture::{
    CreateGesture, NodeBlueprint, CONNECTOR_DISTANCE_FACTOR, MAX_CONNECTORS, MIN_CONNECTORS,
};
pub use pending::{
    ConflictNotice, Expected, MutationTracker, PendingKind, CONFLICT_TTL_MS, POSITION_TOLERANCE,
};
pub use presence::{PresenceTracker, RelayEvent};
pub use recalc::{RecalcFn, RecalcRegistry};
pub use session::{
    get_or_create_session, FileStorage, MemoryStorage, SessionError, SessionStorage,
};
pub use store::{EdgeSnapshot, GraphStore, NodeSnapshot, StoreError, StoreResult};
