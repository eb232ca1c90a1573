//! In-memory session registry.
//!
//! Tracks controller sessions by client id with create-or-refresh semantics:
//! a client asking again gets the same session id back. Nothing is persisted;
//! the registry dies with the process.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use playdeck_types::SessionInfo;

/// Registry of issued session handles, keyed by client id.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    by_client: Mutex<HashMap<String, String>>,
}

impl SessionRegistry {
    /// Issue a session id for `client_id`, or hand back the existing one.
    pub(crate) fn create_or_refresh(&self, client_id: &str) -> String {
        let mut by_client = self
            .by_client
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        if let Some(existing) = by_client.get(client_id) {
            tracing::debug!(client_id = %client_id, session_id = %existing, "session refreshed");
            return existing.clone();
        }
        let id = format!("sess:{}", Uuid::new_v4());
        tracing::info!(client_id = %client_id, session_id = %id, "session created");
        by_client.insert(client_id.to_string(), id.clone());
        id
    }

    /// All known sessions, ordered by client id.
    pub(crate) fn list(&self) -> Vec<SessionInfo> {
        let by_client = self
            .by_client
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let mut sessions: Vec<SessionInfo> = by_client
            .iter()
            .map(|(client_id, session_id)| SessionInfo {
                session_id: session_id.clone(),
                client_id: client_id.clone(),
            })
            .collect();
        sessions.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_or_refresh_is_stable_per_client() {
        let registry = SessionRegistry::default();
        let first = registry.create_or_refresh("phone-1");
        let second = registry.create_or_refresh("phone-1");
        assert_eq!(first, second);
        assert!(first.starts_with("sess:"));
    }

    #[test]
    fn distinct_clients_get_distinct_sessions() {
        let registry = SessionRegistry::default();
        let a = registry.create_or_refresh("phone-1");
        let b = registry.create_or_refresh("tablet-2");
        assert_ne!(a, b);
    }

    #[test]
    fn list_orders_by_client_id() {
        let registry = SessionRegistry::default();
        registry.create_or_refresh("zed");
        registry.create_or_refresh("alpha");
        let sessions = registry.list();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].client_id, "alpha");
        assert_eq!(sessions[1].client_id, "zed");
    }
}
