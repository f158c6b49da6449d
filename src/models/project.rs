use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

#[derive(sqlx::FromRow, Deserialize, Serialize, Debug, Clone)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

impl Project {
    pub async fn create(
        pool: &SqlitePool,
        user_id: i64,
        name: &str,
        description: &str,
    ) -> Result<Project, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO projects (user_id, name, description, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, name, description, created_at
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Project>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, name, description, created_at
            FROM projects
            WHERE user_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Looks a project up by id, scoped to its owner.
    pub async fn find_for_user(
        pool: &SqlitePool,
        id: i64,
        user_id: i64,
    ) -> Result<Option<Project>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, user_id, name, description, created_at
            FROM projects
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Deletes the project and every file it owns in one transaction.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let mut transaction = pool.begin().await?;

        sqlx::query("DELETE FROM files WHERE project_id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
