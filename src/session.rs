//! Persistent key/value session storage.
//!
//! The backing store (platform keychain, local storage, flat file) is an
//! external collaborator; the client only needs string get/set/remove.

use std::collections::HashMap;
use std::sync::Mutex;

/// Session key holding the auth token used in outgoing payloads.
pub const KEY_ACCESS_TOKEN: &str = "accessToken";
/// Session key holding the remaining poem quota.
pub const KEY_POEMS_LEFT: &str = "poemsLeft";
/// Session key holding the account unlock flag.
pub const KEY_UNLOCKED: &str = "unlocked";
/// Session key holding the server-side user identifier.
pub const KEY_USER_ID: &str = "userId";

/// Abstraction over the persistent key/value store for session fields.
pub trait SessionStore: Send + Sync {
    /// Fetch a value, or `None` when the key is unset.
    fn get(&self, key: &str) -> Option<String>;
    /// Persist a value under `key`.
    fn set(&self, key: &str, value: &str);
    /// Remove `key` and its value.
    fn remove(&self, key: &str);
}

/// In-memory session store used in tests and as a default backend.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// Construct an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_round_trip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get(KEY_ACCESS_TOKEN), None);

        store.set(KEY_ACCESS_TOKEN, "tok-123");
        assert_eq!(store.get(KEY_ACCESS_TOKEN), Some("tok-123".into()));

        store.remove(KEY_ACCESS_TOKEN);
        assert_eq!(store.get(KEY_ACCESS_TOKEN), None);
    }
}
