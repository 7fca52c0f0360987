//! In-memory store with real transaction semantics: a session works on a
//! copy of the state and publishes it on commit. Engine tests run against
//! this; the SQL adapter lives in `deadliner-db`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::deadline::{Deadline, DeadlineId, ResponseDeadline, ResponseId};
use crate::matcher::like_match;

use super::{DeadlineStore, NotificationRow, StoreError, StoreSession};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    next_deadline_id: i64,
    next_response_id: i64,
    deadlines: Vec<Deadline>,
    responses: Vec<ResponseDeadline>,
}

#[derive(Clone, Default)]
pub struct InMemoryDeadlineStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDeadlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state, for assertions in tests.
    pub fn snapshot(&self) -> (Vec<Deadline>, Vec<ResponseDeadline>) {
        let state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (state.deadlines.clone(), state.responses.clone())
    }
}

#[async_trait]
impl DeadlineStore for InMemoryDeadlineStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let working = self.state.lock().map_err(|_| poisoned())?.clone();
        Ok(Box::new(MemorySession { shared: Arc::clone(&self.state), working }))
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

struct MemorySession {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn find_deadlines(&mut self, pattern: &str) -> Result<Vec<Deadline>, StoreError> {
        Ok(self
            .working
            .deadlines
            .iter()
            .filter(|deadline| like_match(&deadline.item, pattern))
            .cloned()
            .collect())
    }

    async fn list_deadlines(&mut self) -> Result<Vec<Deadline>, StoreError> {
        let mut rows = self.working.deadlines.clone();
        rows.sort_by_key(|deadline| deadline.date);
        Ok(rows)
    }

    async fn insert_deadline(
        &mut self,
        item: &str,
        date: NaiveDate,
    ) -> Result<Deadline, StoreError> {
        self.working.next_deadline_id += 1;
        let deadline = Deadline {
            id: DeadlineId(self.working.next_deadline_id),
            item: item.to_string(),
            date,
            abstract_date: None,
            old_date: None,
        };
        self.working.deadlines.push(deadline.clone());
        Ok(deadline)
    }

    async fn update_deadline(&mut self, deadline: &Deadline) -> Result<(), StoreError> {
        let slot = self
            .working
            .deadlines
            .iter_mut()
            .find(|existing| existing.id == deadline.id)
            .ok_or_else(|| StoreError::Decode(format!("no deadline with id {}", deadline.id.0)))?;
        *slot = deadline.clone();
        Ok(())
    }

    async fn delete_deadline(&mut self, id: DeadlineId) -> Result<(), StoreError> {
        self.working.deadlines.retain(|deadline| deadline.id != id);
        self.working.responses.retain(|response| response.deadline_id != id);
        Ok(())
    }

    async fn find_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<Option<ResponseDeadline>, StoreError> {
        Ok(self
            .working
            .responses
            .iter()
            .find(|response| response.deadline_id == deadline_id)
            .cloned())
    }

    async fn insert_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<ResponseDeadline, StoreError> {
        self.working.next_response_id += 1;
        let response = ResponseDeadline {
            id: ResponseId(self.working.next_response_id),
            deadline_id,
            early_response_date: None,
            notification_date: None,
        };
        self.working.responses.push(response.clone());
        Ok(response)
    }

    async fn update_response(&mut self, response: &ResponseDeadline) -> Result<(), StoreError> {
        let slot = self
            .working
            .responses
            .iter_mut()
            .find(|existing| existing.id == response.id)
            .ok_or_else(|| StoreError::Decode(format!("no response with id {}", response.id.0)))?;
        *slot = response.clone();
        Ok(())
    }

    async fn list_responses(&mut self) -> Result<Vec<NotificationRow>, StoreError> {
        let mut rows: Vec<NotificationRow> = self
            .working
            .responses
            .iter()
            .filter_map(|response| {
                self.working
                    .deadlines
                    .iter()
                    .find(|deadline| deadline.id == response.deadline_id)
                    .map(|deadline| NotificationRow {
                        item: deadline.item.clone(),
                        response: response.clone(),
                    })
            })
            .collect();
        rows.sort_by_key(|row| row.response.notification_date);
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.lock().map_err(|_| poisoned())? = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::store::{DeadlineStore, StoreSession};

    use super::InMemoryDeadlineStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[tokio::test]
    async fn commit_publishes_and_rollback_discards() {
        let store = InMemoryDeadlineStore::new();

        let mut session = store.begin().await.expect("begin");
        session.insert_deadline("NIPS", date(2027, 3, 3)).await.expect("insert");
        session.rollback().await.expect("rollback");
        assert!(store.snapshot().0.is_empty());

        let mut session = store.begin().await.expect("begin");
        session.insert_deadline("NIPS", date(2027, 3, 3)).await.expect("insert");
        session.commit().await.expect("commit");
        assert_eq!(store.snapshot().0.len(), 1);
    }

    #[tokio::test]
    async fn delete_cascades_to_response_rows() {
        let store = InMemoryDeadlineStore::new();

        let mut session = store.begin().await.expect("begin");
        let deadline = session.insert_deadline("NIPS", date(2027, 3, 3)).await.expect("insert");
        session.insert_response(deadline.id).await.expect("insert response");
        session.delete_deadline(deadline.id).await.expect("delete");
        session.commit().await.expect("commit");

        let (deadlines, responses) = store.snapshot();
        assert!(deadlines.is_empty());
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn find_is_case_insensitive_prefix_search() {
        let store = InMemoryDeadlineStore::new();

        let mut session = store.begin().await.expect("begin");
        session.insert_deadline("NIPS 2027", date(2027, 3, 3)).await.expect("insert");
        session.insert_deadline("ICML", date(2027, 5, 1)).await.expect("insert");

        let found = session.find_deadlines("nips%").await.expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item, "NIPS 2027");
        session.rollback().await.expect("rollback");
    }
}
