//! One-time CSRF state store for OAuth flows.
//!
//! States are random, single-use, and expire after a short window.
//! The optional user id binds mail-integration states to the user who
//! initiated them; identity-federation states are anonymous.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use uuid::Uuid;

/// How long an issued state stays valid.
const STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct PendingState {
    user_id: Option<Uuid>,
    issued_at: Instant,
}

/// In-process store of pending OAuth states.
#[derive(Debug, Default)]
pub struct StateStore {
    states: Mutex<HashMap<String, PendingState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh state, optionally bound to a user.
    pub fn issue(&self, user_id: Option<Uuid>) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        let mut states = self.states.lock().expect("state store poisoned");
        // Opportunistically drop expired entries to bound growth.
        states.retain(|_, p| p.issued_at.elapsed() < STATE_TTL);
        states.insert(
            state.clone(),
            PendingState {
                user_id,
                issued_at: Instant::now(),
            },
        );
        state
    }

    /// Consume a state. Returns the bound user id when the state was
    /// valid; `None` for unknown, reused, or expired states.
    pub fn consume(&self, state: &str) -> Option<Option<Uuid>> {
        let mut states = self.states.lock().expect("state store poisoned");
        let pending = states.remove(state)?;
        if pending.issued_at.elapsed() >= STATE_TTL {
            return None;
        }
        Some(pending.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_single_use() {
        let store = StateStore::new();
        let user = Uuid::new_v4();
        let state = store.issue(Some(user));
        assert_eq!(store.consume(&state), Some(Some(user)));
        assert_eq!(store.consume(&state), None);
    }

    #[test]
    fn unknown_states_are_rejected() {
        let store = StateStore::new();
        assert_eq!(store.consume("forged"), None);
    }

    #[test]
    fn anonymous_states_carry_no_user() {
        let store = StateStore::new();
        let state = store.issue(None);
        assert_eq!(store.consume(&state), Some(None));
    }
}
