use sqlx::Row;

use wayfarer_core::collaborators::{ConversationStore, StoreError};
use wayfarer_core::domain::session::{ConversationSession, SessionId};

use crate::DbPool;

/// Sessions stored whole as JSON documents keyed by id.
pub struct SqlConversationStore {
    pool: DbPool,
}

impl SqlConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recently updated first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<ConversationSession>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, document FROM conversation_session ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(backend)?;
                let document: String = row.try_get("document").map_err(backend)?;
                decode(&id, &document)
            })
            .collect()
    }
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn decode(id: &str, document: &str) -> Result<ConversationSession, StoreError> {
    serde_json::from_str(document)
        .map_err(|error| StoreError::Corrupt { id: id.to_string(), reason: error.to_string() })
}

#[async_trait::async_trait]
impl ConversationStore for SqlConversationStore {
    async fn get(&self, id: &SessionId) -> Result<Option<ConversationSession>, StoreError> {
        let row = sqlx::query("SELECT document FROM conversation_session WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: String = row.try_get("document").map_err(backend)?;
        decode(&id.0, &document).map(Some)
    }

    async fn put(&self, session: &ConversationSession) -> Result<(), StoreError> {
        let document = serde_json::to_string(session)
            .map_err(|error| StoreError::Backend(format!("encode session: {error}")))?;

        sqlx::query(
            "INSERT INTO conversation_session
                (id, original_query, current_step, document, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                current_step = excluded.current_step,
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(&session.id.0)
        .bind(&session.original_query)
        .bind(session.current_step.as_str())
        .bind(&document)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use wayfarer_core::collaborators::{ConversationStore, StoreError};
    use wayfarer_core::domain::criteria::CriteriaRecord;
    use wayfarer_core::domain::session::{ChatTurn, ConversationSession, PlanningStep, SessionId};

    use super::SqlConversationStore;
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        pool
    }

    fn session(query: &str) -> ConversationSession {
        let criteria =
            CriteriaRecord { destination: Some("Kyoto".to_string()), ..CriteriaRecord::default() };
        ConversationSession::start(query, criteria, vec!["dates".to_string()], Utc::now())
    }

    #[tokio::test]
    async fn put_then_get_round_trips_whole_session() {
        let store = SqlConversationStore::new(pool().await);
        let mut session = session("Kyoto in spring");
        session.push_turn(ChatTurn::user("Kyoto in spring"));
        session.push_turn(ChatTurn::assistant("When are you going?"));
        session.transition_to(PlanningStep::GatheringRequirements).expect("transition");

        store.put(&session).await.expect("put");
        let loaded = store.get(&session.id).await.expect("get").expect("present");

        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn put_overwrites_existing_document() {
        let store = SqlConversationStore::new(pool().await);
        let mut session = session("Kyoto");
        store.put(&session).await.expect("first put");

        session.push_turn(ChatTurn::user("Kyoto"));
        session.updated_at = session.updated_at + Duration::seconds(5);
        store.put(&session).await.expect("second put");

        let loaded = store.get(&session.id).await.expect("get").expect("present");
        assert_eq!(loaded.turn_count(), 1);
        assert_eq!(store.list_recent(10).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn unknown_id_is_none_and_corrupt_document_is_reported() {
        let pool = pool().await;
        let store = SqlConversationStore::new(pool.clone());
        assert!(store.get(&SessionId("trip_planning_missing".to_string())).await.expect("get").is_none());

        sqlx::query(
            "INSERT INTO conversation_session
                (id, original_query, current_step, document, created_at, updated_at)
             VALUES ('trip_planning_bad', 'q', 'initial_query', '{not json', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .expect("insert corrupt row");

        let result = store.get(&SessionId("trip_planning_bad".to_string())).await;
        assert!(matches!(result, Err(StoreError::Corrupt { ref id, .. }) if id == "trip_planning_bad"));
    }
}
