//! Port to the record store.
//!
//! The engine never talks to a database directly; it opens a [`StoreSession`]
//! whose transaction boundary equals one action. Sessions are consumed by
//! `commit`/`rollback`, so a leaked handle is unrepresentable.

pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::deadline::{Deadline, DeadlineId, ResponseDeadline};

pub use memory::InMemoryDeadlineStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("store decode failure: {0}")]
    Decode(String),
}

/// A response row joined with its deadline's display name, as the
/// notification digest consumes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationRow {
    pub item: String,
    pub response: ResponseDeadline,
}

#[async_trait]
pub trait DeadlineStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

#[async_trait]
pub trait StoreSession: Send {
    /// `LIKE`-style lookup over `item`: case-insensitive, `%` wildcards.
    async fn find_deadlines(&mut self, pattern: &str) -> Result<Vec<Deadline>, StoreError>;

    /// Every deadline, date ascending.
    async fn list_deadlines(&mut self) -> Result<Vec<Deadline>, StoreError>;

    async fn insert_deadline(
        &mut self,
        item: &str,
        date: NaiveDate,
    ) -> Result<Deadline, StoreError>;

    async fn update_deadline(&mut self, deadline: &Deadline) -> Result<(), StoreError>;

    /// Deletes the deadline and any linked response row.
    async fn delete_deadline(&mut self, id: DeadlineId) -> Result<(), StoreError>;

    async fn find_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<Option<ResponseDeadline>, StoreError>;

    /// Lazily create the response row for a deadline, both dates unset.
    async fn insert_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<ResponseDeadline, StoreError>;

    async fn update_response(&mut self, response: &ResponseDeadline) -> Result<(), StoreError>;

    /// Response rows joined with item names, notification date ascending.
    async fn list_responses(&mut self) -> Result<Vec<NotificationRow>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
