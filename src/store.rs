//! Session storage
//!
//! Holds live sessions for the API surface. Load returns an owned clone,
//! callers mutate and save back; each session is exclusively owned by one
//! participant's run, so no finer locking discipline is needed.

use crate::session::Session;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for session persistence
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<()>;
    async fn load(&self, session_id: Uuid) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
}

/// In-memory session store; nothing outlives the process (the ledger is
/// exported once at session end, there is no durable backend)
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id, session);
        Ok(())
    }

    async fn load(&self, session_id: Uuid) -> Result<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&session_id).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id, session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, Participant, Sex};
    use crate::session::AdvicePolicy;

    fn sample_session() -> Session {
        Session::new(
            Uuid::new_v4(),
            Participant {
                participant_id: "p1".to_string(),
                age: 30,
                sex: Sex::Male,
            },
            Condition::Treatment,
            AdvicePolicy::EveryRoundPastMidpoint,
        )
    }

    #[tokio::test]
    async fn test_insert_load_save_roundtrip() {
        let store = InMemorySessionStore::new();
        let session = sample_session();
        let id = session.session_id;

        store.insert(session).await.unwrap();

        let mut loaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(loaded.round, 1);

        loaded.confirm_choice(50).unwrap();
        store.save(&loaded).await.unwrap();

        let reloaded = store.load(id).await.unwrap().unwrap();
        assert_eq!(reloaded.round, 2);
        assert_eq!(reloaded.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_load_unknown_session() {
        let store = InMemorySessionStore::new();
        let missing = store.load(Uuid::new_v4()).await.unwrap();
        assert!(missing.is_none());
    }
}
