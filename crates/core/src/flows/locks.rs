use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::session::SessionId;

/// One async mutex per session id. Holding the guard serializes turns on
/// that session; different sessions never contend.
#[derive(Clone, Default)]
pub struct SessionLocks {
    handles: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    pub async fn acquire(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        let handle = {
            let mut handles = self.handles.lock().await;
            // Drop handles nobody else holds so the table does not grow unbounded.
            handles.retain(|key, handle| key == id || Arc::strong_count(handle) > 1);
            Arc::clone(handles.entry(id.clone()).or_default())
        };
        handle.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.handles.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::SessionLocks;
    use crate::domain::session::SessionId;

    #[tokio::test]
    async fn same_session_turns_are_serialized() {
        let locks = SessionLocks::default();
        let id = SessionId("trip_planning_a".to_owned());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first_guard = locks.acquire(&id).await;
        let second = {
            let locks = locks.clone();
            let id = id.clone();
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
                order.lock().await.push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().await.push("first");
        drop(first_guard);
        second.await.expect("task joins");

        assert_eq!(*order.lock().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn different_sessions_do_not_block_each_other() {
        let locks = SessionLocks::default();
        let _a = locks.acquire(&SessionId("trip_planning_a".to_owned())).await;
        let acquired = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&SessionId("trip_planning_b".to_owned())),
        )
        .await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn idle_handles_are_pruned() {
        let locks = SessionLocks::default();
        drop(locks.acquire(&SessionId("trip_planning_a".to_owned())).await);
        drop(locks.acquire(&SessionId("trip_planning_b".to_owned())).await);
        assert_eq!(locks.tracked().await, 1);
    }
}
