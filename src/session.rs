//! Session & dedup layer (C5, spec §4.5): process-wide session table keyed
//! by `(owner_id, token)`, created lazily, used to discard retry echoes by
//! comparing incoming record ids against the session's high-water mark.
//! Grounded on the teacher's `state/store.rs` preference for a lock-free
//! `DashMap` over a mutex-guarded `HashMap` for process-wide shared state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use md5::{Digest, Md5};

use crate::config::AdmissionConfig;
use crate::error::CoreError;
use crate::time::Timestamp;

/// A session's mutable state: the high-water mark of record ids already
/// processed under this `(owner, token)`.
#[derive(Debug)]
pub struct Session {
    last_valueid: AtomicU64,
}

impl Session {
    fn new() -> Self {
        Self { last_valueid: AtomicU64::new(0) }
    }

    pub fn last_valueid(&self) -> u64 {
        self.last_valueid.load(Ordering::SeqCst)
    }

    /// Decides whether a record with this id should be processed, and if
    /// so, advances the high-water mark. Spec §4.5: id 0 always processes
    /// (no dedup key); otherwise ids at or below the mark are discarded.
    pub fn admit(&self, id: u64) -> bool {
        if id == 0 {
            return true;
        }
        let mut observed = self.last_valueid.load(Ordering::SeqCst);
        loop {
            if id <= observed {
                return false;
            }
            match self.last_valueid.compare_exchange_weak(
                observed,
                id,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(current) => observed = current,
            }
        }
    }
}

/// Process-wide session table. Eviction is the caller's responsibility
/// (spec §4.5: "caller evicts by idle policy") — this type only grows.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: DashMap<(u64, String), Arc<Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    /// Returns the session for `(owner_id, token)`, creating it on first
    /// reference. `token` must be exactly 32 lowercase hex characters.
    pub fn get_or_create(&self, owner_id: u64, token: &str, cfg: &AdmissionConfig) -> Result<Arc<Session>, CoreError> {
        if token.len() != cfg.token_len || !token.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(CoreError::Admission { reason: "malformed session token" });
        }
        let key = (owner_id, token.to_string());
        if let Some(existing) = self.sessions.get(&key) {
            return Ok(existing.clone());
        }
        let session = Arc::new(Session::new());
        Ok(self.sessions.entry(key).or_insert_with(|| session).clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Builds a session token as `hex(md5(seed ‖ now_nanoseconds))`, truncated
/// to 32 chars (spec §4.5). Not a security mechanism — a cheap unique
/// label.
pub fn generate_token(seed: u64, now: Timestamp) -> String {
    let mut hasher = Md5::new();
    hasher.update(seed.to_be_bytes());
    let nanos = (now.secs as u64).wrapping_mul(1_000_000_000).wrapping_add(now.nanos as u64);
    hasher.update(nanos.to_be_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..32].to_string()
}
