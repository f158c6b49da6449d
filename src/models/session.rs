use std::time::Duration;

use sqlx::SqlitePool;
use uuid::Uuid;

/// Server-side login session. Not foreign-keyed to `users`; expired rows
/// are ignored on lookup and purged on login.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

impl Session {
    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        ttl: Duration,
    ) -> Result<Session, sqlx::Error> {
        let now = chrono::Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_secs);

        sqlx::query_as(
            r#"
            INSERT INTO sessions (id, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, created_at, expires_at
            "#,
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_active(pool: &SqlitePool, id: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, created_at, expires_at
            FROM sessions
            WHERE id = ? AND expires_at > ?
            "#,
        )
        .bind(id)
        .bind(chrono::Utc::now().timestamp())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(chrono::Utc::now().timestamp())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
