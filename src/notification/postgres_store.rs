//! PostgreSQL notification store.
//!
//! Rows live in the `notifications` table; delivery tokens in `push_tokens`.
//! Inserts are keyed on `dispatch_key` so replays return the existing row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::{NotificationStore, PushToken, StoreError, TokenStore};
use super::types::{NewNotification, Notification, NotificationStatus};

const INSERT_SQL: &str = r#"
    INSERT INTO notifications
        (id, dispatch_key, recipient_id, service_id, title, body, data, status, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
    ON CONFLICT (dispatch_key) DO UPDATE SET dispatch_key = EXCLUDED.dispatch_key
    RETURNING id, recipient_id, service_id, title, body, data, status, created_at, read_at
"#;

const SELECT_SQL: &str = r#"
    SELECT id, recipient_id, service_id, title, body, data, status, created_at, read_at
    FROM notifications
    WHERE id = $1
"#;

type NotificationRow = (
    Uuid,
    String,
    Option<Uuid>,
    String,
    String,
    serde_json::Value,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
);

fn into_notification(row: NotificationRow) -> Result<Notification, StoreError> {
    let (id, recipient_id, service_id, title, body, data, status, created_at, read_at) = row;
    let status =
        NotificationStatus::parse(&status).ok_or_else(|| StoreError::InvalidStatus(status))?;

    Ok(Notification {
        id,
        recipient_id,
        service_id,
        title,
        body,
        data,
        status,
        created_at,
        read_at,
    })
}

/// PostgreSQL-backed notification and token store.
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn insert(&self, new: &NewNotification) -> Result<Notification, StoreError> {
        let row: NotificationRow = sqlx::query_as(INSERT_SQL)
            .bind(Uuid::new_v4())
            .bind(new.dispatch_key)
            .bind(&new.recipient_id)
            .bind(new.service_id)
            .bind(&new.title)
            .bind(&new.body)
            .bind(&new.data)
            .bind(new.status.as_str())
            .fetch_one(&self.pool)
            .await?;

        into_notification(row)
    }

    async fn insert_many(&self, batch: &[NewNotification]) -> Result<Vec<Notification>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut rows = Vec::with_capacity(batch.len());

        for new in batch {
            let row: NotificationRow = sqlx::query_as(INSERT_SQL)
                .bind(Uuid::new_v4())
                .bind(new.dispatch_key)
                .bind(&new.recipient_id)
                .bind(new.service_id)
                .bind(&new.title)
                .bind(&new.body)
                .bind(&new.data)
                .bind(new.status.as_str())
                .fetch_one(&mut *tx)
                .await?;
            rows.push(into_notification(row)?);
        }

        tx.commit().await?;

        tracing::debug!(rows = rows.len(), "Bulk insert committed");
        Ok(rows)
    }

    async fn mark_read(&self, id: Uuid) -> Result<Notification, StoreError> {
        // Only the unread -> read transition is ours; any other status is
        // left exactly as another workflow set it.
        let updated: Option<NotificationRow> = sqlx::query_as(
            r#"
            UPDATE notifications
            SET status = 'read', read_at = NOW()
            WHERE id = $1 AND status = 'unread'
            RETURNING id, recipient_id, service_id, title, body, data, status, created_at, read_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return into_notification(row);
        }

        match self.get(id).await? {
            Some(existing) => Ok(existing),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(SELECT_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(into_notification).transpose()
    }
}

#[async_trait]
impl TokenStore for PostgresNotificationStore {
    async fn list_tokens(&self, user_ids: &[String]) -> Result<Vec<PushToken>, StoreError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT user_id, token FROM push_tokens WHERE user_id = ANY($1)")
                .bind(user_ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, token)| PushToken { user_id, token })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_mapping_rejects_unknown_status() {
        let row: NotificationRow = (
            Uuid::new_v4(),
            "user-1".to_string(),
            None,
            "title".to_string(),
            "body".to_string(),
            serde_json::Value::Null,
            "archived".to_string(),
            Utc::now(),
            None,
        );

        let result = into_notification(row);
        assert!(matches!(result, Err(StoreError::InvalidStatus(_))));
    }

    #[test]
    fn test_row_mapping() {
        let id = Uuid::new_v4();
        let row: NotificationRow = (
            id,
            "user-1".to_string(),
            None,
            "title".to_string(),
            "body".to_string(),
            serde_json::json!({"k": "v"}),
            "unread".to_string(),
            Utc::now(),
            None,
        );

        let notification = into_notification(row).unwrap();
        assert_eq!(notification.id, id);
        assert_eq!(notification.status, NotificationStatus::Unread);
        assert!(notification.read_at.is_none());
    }
}
