use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A file stored in the database under a project. Content is replaced
/// wholesale on every save.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct ProjectFile {
    pub id: i64,
    pub project_id: i64,
    pub path: String,
    pub content: String,
    pub updated_at: i64,
}

impl ProjectFile {
    pub async fn upsert(
        pool: &SqlitePool,
        project_id: i64,
        path: &str,
        content: &str,
    ) -> Result<ProjectFile, sqlx::Error> {
        sqlx::query_as(
            r#"
            INSERT INTO files (project_id, path, content, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (project_id, path)
            DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at
            RETURNING id, project_id, path, content, updated_at
            "#,
        )
        .bind(project_id)
        .bind(path)
        .bind(content)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await
    }

    pub async fn list_for_project(
        pool: &SqlitePool,
        project_id: i64,
    ) -> Result<Vec<ProjectFile>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, project_id, path, content, updated_at
            FROM files
            WHERE project_id = ?
            ORDER BY path
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, project_id: i64, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM files WHERE id = ? AND project_id = ?")
            .bind(id)
            .bind(project_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
