//! Per-tab session identity: stable id, display name, cursor color.
//!
//! The identity is generated once per storage context (browser profile /
//! user account) and re-read on every subsequent bootstrap, so a user keeps
//! their name and color across reloads. Storage being unavailable is not an
//! error: presence features are simply skipped.

use std::path::PathBuf;
use std::sync::Mutex;

use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, warn};

use corkboard_types::{SessionId, SessionIdentity};

/// Adjective half of generated display names.
const ADJECTIVES: &[&str] = &[
    "Swift", "Quiet", "Bright", "Bold", "Clever", "Gentle", "Lucky", "Mellow",
    "Nimble", "Patient", "Rapid", "Steady", "Vivid", "Witty", "Calm", "Eager",
];

/// Noun half of generated display names.
const NOUNS: &[&str] = &[
    "Heron", "Otter", "Falcon", "Badger", "Lynx", "Marmot", "Osprey", "Puffin",
    "Raven", "Stoat", "Tern", "Vole", "Wren", "Ibex", "Kestrel", "Newt",
];

/// Fixed cursor palette, assigned once per identity.
const PALETTE: &[&str] = &[
    "#e63946", "#f4a261", "#e9c46a", "#2a9d8f", "#264653", "#6d597a",
    "#457b9d", "#8338ec", "#ff006e", "#3a86ff",
];

/// Storage key the identity record is persisted under.
const SESSION_KEY: &str = "corkboard-session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage io: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the identity record lives between tabs/reloads.
///
/// `load` returning `None` means "no record yet" — corrupt or unreadable
/// records are treated the same way and regenerated.
pub trait SessionStorage: Send + Sync {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&self, key: &str, raw: &str) -> Result<(), SessionError>;
}

/// In-memory storage, for tests and headless runs.
#[derive(Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<(String, String)>>,
}

impl SessionStorage for MemoryStorage {
    fn load(&self, key: &str) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    fn save(&self, key: &str, raw: &str) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((key.to_string(), raw.to_string()));
        Ok(())
    }
}

/// File-backed storage under a directory (one JSON file per key).
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage in the platform data directory, or `None` when the platform
    /// has no usable one.
    pub fn in_default_dir() -> Option<Self> {
        dirs::data_dir().map(|d| Self::new(d.join("corkboard")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStorage for FileStorage {
    fn load(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn save(&self, key: &str, raw: &str) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), raw)?;
        Ok(())
    }
}

/// Load the persisted identity, or generate and persist a fresh one.
///
/// Idempotent after the first call within a storage context. Returns `None`
/// only when the record cannot be persisted — the caller then skips
/// presence/cursor features and everything else keeps working.
pub fn get_or_create_session(storage: &dyn SessionStorage) -> Option<SessionIdentity> {
    if let Some(raw) = storage.load(SESSION_KEY) {
        match serde_json::from_str::<SessionIdentity>(&raw) {
            Ok(identity) => {
                debug!(session = %identity.id, name = %identity.user_name, "restored session identity");
                return Some(identity);
            }
            Err(e) => {
                warn!("persisted session record is corrupt, regenerating: {e}");
            }
        }
    }

    let identity = generate_identity();
    // Serializing a struct of plain strings cannot fail.
    let raw = serde_json::to_string(&identity).ok()?;
    if let Err(e) = storage.save(SESSION_KEY, &raw) {
        warn!("session storage unavailable, presence disabled: {e}");
        return None;
    }
    debug!(session = %identity.id, name = %identity.user_name, "created session identity");
    Some(identity)
}

fn generate_identity() -> SessionIdentity {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Swift");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Heron");
    let color = PALETTE.choose(&mut rng).copied().unwrap_or("#2a9d8f");
    SessionIdentity {
        id: SessionId::new(),
        user_name: format!("{adjective} {noun}"),
        color: color.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
