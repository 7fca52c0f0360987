//! SQLite adapter for the core store port. One [`sqlx`] transaction per
//! session; the schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use deadliner_core::domain::deadline::{Deadline, DeadlineId, ResponseDeadline, ResponseId};
use deadliner_core::store::{DeadlineStore, NotificationRow, StoreError, StoreSession};

use crate::DbPool;

pub struct SqliteDeadlineStore {
    pool: DbPool,
}

impl SqliteDeadlineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadlineStore for SqliteDeadlineStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(SqliteSession { tx }))
    }
}

struct SqliteSession {
    tx: sqlx::Transaction<'static, sqlx::Sqlite>,
}

fn backend(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

fn decode(error: sqlx::Error) -> StoreError {
    StoreError::Decode(error.to_string())
}

fn row_to_deadline(row: &sqlx::sqlite::SqliteRow) -> Result<Deadline, StoreError> {
    let id: i64 = row.try_get("id").map_err(decode)?;
    let item: String = row.try_get("item").map_err(decode)?;
    let date: NaiveDate = row.try_get("date").map_err(decode)?;
    let abstract_date: Option<NaiveDate> = row.try_get("abstract_date").map_err(decode)?;
    let old_date: Option<NaiveDate> = row.try_get("old_date").map_err(decode)?;

    Ok(Deadline { id: DeadlineId(id), item, date, abstract_date, old_date })
}

fn row_to_response(row: &sqlx::sqlite::SqliteRow) -> Result<ResponseDeadline, StoreError> {
    let id: i64 = row.try_get("id").map_err(decode)?;
    let deadline_id: i64 = row.try_get("deadline_id").map_err(decode)?;
    let early_response_date: Option<NaiveDate> =
        row.try_get("early_response_date").map_err(decode)?;
    let notification_date: Option<NaiveDate> = row.try_get("notification_date").map_err(decode)?;

    Ok(ResponseDeadline {
        id: ResponseId(id),
        deadline_id: DeadlineId(deadline_id),
        early_response_date,
        notification_date,
    })
}

#[async_trait]
impl StoreSession for SqliteSession {
    async fn find_deadlines(&mut self, pattern: &str) -> Result<Vec<Deadline>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, item, date, abstract_date, old_date FROM deadline WHERE item LIKE ?",
        )
        .bind(pattern)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_deadline).collect()
    }

    async fn list_deadlines(&mut self) -> Result<Vec<Deadline>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, item, date, abstract_date, old_date FROM deadline ORDER BY date ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_deadline).collect()
    }

    async fn insert_deadline(
        &mut self,
        item: &str,
        date: NaiveDate,
    ) -> Result<Deadline, StoreError> {
        let result = sqlx::query("INSERT INTO deadline (item, date) VALUES (?, ?)")
            .bind(item)
            .bind(date)
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?;

        Ok(Deadline {
            id: DeadlineId(result.last_insert_rowid()),
            item: item.to_string(),
            date,
            abstract_date: None,
            old_date: None,
        })
    }

    async fn update_deadline(&mut self, deadline: &Deadline) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE deadline SET item = ?, date = ?, abstract_date = ?, old_date = ? WHERE id = ?",
        )
        .bind(&deadline.item)
        .bind(deadline.date)
        .bind(deadline.abstract_date)
        .bind(deadline.old_date)
        .bind(deadline.id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn delete_deadline(&mut self, id: DeadlineId) -> Result<(), StoreError> {
        // response_deadline rows go with it via ON DELETE CASCADE.
        sqlx::query("DELETE FROM deadline WHERE id = ?")
            .bind(id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?;

        Ok(())
    }

    async fn find_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<Option<ResponseDeadline>, StoreError> {
        let row = sqlx::query(
            "SELECT id, deadline_id, early_response_date, notification_date
             FROM response_deadline WHERE deadline_id = ?",
        )
        .bind(deadline_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;

        match row {
            Some(ref row) => Ok(Some(row_to_response(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_response(
        &mut self,
        deadline_id: DeadlineId,
    ) -> Result<ResponseDeadline, StoreError> {
        let result = sqlx::query("INSERT INTO response_deadline (deadline_id) VALUES (?)")
            .bind(deadline_id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(backend)?;

        Ok(ResponseDeadline {
            id: ResponseId(result.last_insert_rowid()),
            deadline_id,
            early_response_date: None,
            notification_date: None,
        })
    }

    async fn update_response(&mut self, response: &ResponseDeadline) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE response_deadline SET early_response_date = ?, notification_date = ? WHERE id = ?",
        )
        .bind(response.early_response_date)
        .bind(response.notification_date)
        .bind(response.id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn list_responses(&mut self) -> Result<Vec<NotificationRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.id, r.deadline_id, r.early_response_date, r.notification_date, d.item
             FROM response_deadline r
             JOIN deadline d ON d.id = r.deadline_id
             ORDER BY r.notification_date ASC",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let item: String = row.try_get("item").map_err(decode)?;
                Ok(NotificationRow { item, response: row_to_response(row)? })
            })
            .collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(backend)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(backend)
    }
}
