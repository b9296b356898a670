//! PostgreSQL directory backend.
//!
//! Reads the dashboard's `users` table; work categories are stored as a text
//! array, so category targeting is an array-overlap test independent of how
//! the caller collected the ids.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{DirectoryError, RecipientDirectory, UserRole, UserStatus};

/// PostgreSQL-backed user directory.
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PostgresDirectory {
    async fn list_users(
        &self,
        role: UserRole,
        status: UserStatus,
    ) -> Result<Vec<String>, DirectoryError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE role = $1 AND status = $2")
                .bind(role.as_str())
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    async fn list_technicians_by_categories(
        &self,
        category_ids: &[String],
    ) -> Result<Vec<String>, DirectoryError> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE role = 'technician'
              AND status = 'active'
              AND work_categories && $1
            "#,
        )
        .bind(category_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn filter_known_users(
        &self,
        user_ids: &[String],
    ) -> Result<Vec<String>, DirectoryError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1)")
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }
}
