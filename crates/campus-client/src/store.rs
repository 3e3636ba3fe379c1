//! Credential store: the single owner of the current token pair.
//!
//! The store keeps an in-memory copy guarded by a lock and mirrors every
//! change to a durable backend, so a restart resumes the same session.
//! It is written only by the session facade and the refresh coordinator;
//! the HTTP pipeline and the chat channel read it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use campus_core::{Error, Result, TokenPair};

/// Durable backend for the credential store.
///
/// Implementations must persist and load the token pair as a unit.
/// All methods are synchronous; callers never hold the store's lock
/// across a suspension point.
pub trait CredentialStorage: Send + Sync + std::fmt::Debug {
    /// Load the persisted token pair, if any.
    fn load(&self) -> Result<Option<TokenPair>>;

    /// Persist the token pair, replacing any previous value.
    fn persist(&self, tokens: &TokenPair) -> Result<()>;

    /// Remove the persisted token pair.
    fn clear(&self) -> Result<()>;
}

/// On-disk token format.
///
/// Two opaque strings keyed `token` / `refreshToken`, matching the
/// key-value layout the web client persists.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// File-backed credential storage: one JSON object, mode 0600 on Unix.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

fn map_io(err: std::io::Error) -> Error {
    Error::Storage(err.to_string())
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<TokenPair>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(map_io)?;
        let stored: StoredTokens =
            serde_json::from_str(&json).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Some(TokenPair::new(stored.token, stored.refresh_token)))
    }

    fn persist(&self, tokens: &TokenPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(map_io)?;
        }

        let stored = StoredTokens {
            token: tokens.access.as_str().to_string(),
            refresh_token: tokens.refresh.as_str().to_string(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .map_err(|e| Error::Storage(e.to_string()))?;

        fs::write(&self.path, &json).map_err(map_io)?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.path).map_err(map_io)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(map_io)?;
        }

        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(map_io)?;
        }
        Ok(())
    }
}

/// In-memory credential storage for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tokens: Mutex<Option<TokenPair>>,
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<TokenPair>> {
        Ok(self.tokens.lock().expect("storage lock poisoned").clone())
    }

    fn persist(&self, tokens: &TokenPair) -> Result<()> {
        *self.tokens.lock().expect("storage lock poisoned") = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.tokens.lock().expect("storage lock poisoned") = None;
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    tokens: Option<TokenPair>,
    generation: u64,
}

/// Holder of the current access/refresh token pair.
///
/// Every mutation bumps a generation counter. A snapshot of
/// `(tokens, generation)` taken when a request is issued lets the
/// refresh coordinator tell "nobody has touched the session since this
/// request saw its 401" apart from "the session was already refreshed
/// or torn down", without a shared future.
#[derive(Debug)]
pub struct CredentialStore {
    state: RwLock<State>,
    // Serializes writers so the durable copy and the published value
    // never interleave. Persistence happens under this gate, not under
    // the state lock, so readers stay unblocked during storage I/O.
    write_gate: Mutex<()>,
    storage: Box<dyn CredentialStorage>,
}

impl CredentialStore {
    /// Open a store over the given backend, loading any persisted pair.
    pub fn open(storage: impl CredentialStorage + 'static) -> Result<Self> {
        let tokens = storage.load()?;
        if tokens.is_some() {
            debug!("restored persisted session tokens");
        }
        Ok(Self {
            state: RwLock::new(State {
                tokens,
                generation: 0,
            }),
            write_gate: Mutex::new(()),
            storage: Box::new(storage),
        })
    }

    /// Create a store with no durable backing.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(State {
                tokens: None,
                generation: 0,
            }),
            write_gate: Mutex::new(()),
            storage: Box::new(MemoryStorage::default()),
        }
    }

    /// Returns the current token pair, if a session is active.
    pub fn get(&self) -> Option<TokenPair> {
        self.state.read().expect("store lock poisoned").tokens.clone()
    }

    /// Returns the current token pair together with the generation it
    /// belongs to.
    pub fn snapshot(&self) -> (Option<TokenPair>, u64) {
        let state = self.state.read().expect("store lock poisoned");
        (state.tokens.clone(), state.generation)
    }

    /// Returns the current generation counter.
    pub fn generation(&self) -> u64 {
        self.state.read().expect("store lock poisoned").generation
    }

    /// Replace the token pair, persisting before publishing.
    ///
    /// If the durable write fails the in-memory value is left unchanged
    /// and the error is returned.
    pub fn set(&self, tokens: TokenPair) -> Result<()> {
        let _gate = self.write_gate.lock().expect("write gate poisoned");
        self.storage.persist(&tokens)?;
        let mut state = self.state.write().expect("store lock poisoned");
        state.tokens = Some(tokens);
        state.generation += 1;
        Ok(())
    }

    /// Drop the token pair. Never fails: the in-memory session always
    /// ends; a failure to remove the durable copy is only logged.
    pub fn clear(&self) {
        let _gate = self.write_gate.lock().expect("write gate poisoned");
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to clear persisted tokens");
        }
        let mut state = self.state.write().expect("store lock poisoned");
        state.tokens = None;
        state.generation += 1;
    }
}
