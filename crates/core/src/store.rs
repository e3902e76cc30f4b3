use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::collaborators::{ConversationStore, StoreError};
use crate::domain::session::{ConversationSession, SessionId};

#[derive(Clone, Default)]
pub struct InMemoryConversationStore {
    sessions: Arc<RwLock<HashMap<SessionId, ConversationSession>>>,
}

impl InMemoryConversationStore {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: &ConversationSession) -> Result<(), StoreError> {
        self.sessions.write().await.insert(session.id.clone(), session.clone());
        Ok(())
    }
}
