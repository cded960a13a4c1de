use crate::domain::entities::Session;
use crate::domain::ports::session_repository::SessionRepository;
use crate::infrastructure::http::middleware::error::ApiResult;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

#[async_trait]
impl SessionRepository for Database {
    async fn create_session(&self, session: &Session) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token, expires_at, created_at, last_accessed_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token)
        .bind(&session.expires_at)
        .bind(&session.created_at)
        .bind(&session.last_accessed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session_by_token(&self, token: &str) -> ApiResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, user_id, token, expires_at, created_at, last_accessed_at
             FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Session {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                token: row.try_get("token")?,
                expires_at: row.try_get("expires_at")?,
                created_at: row.try_get("created_at")?,
                last_accessed_at: row.try_get("last_accessed_at")?,
            })),
            None => Ok(None),
        }
    }

    async fn delete_session(&self, token: &str) -> ApiResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn cleanup_expired_sessions(&self) -> ApiResult<u64> {
        // RFC 3339 strings in UTC sort chronologically
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn update_session_last_accessed(&self, token: &str) -> ApiResult<()> {
        sqlx::query("UPDATE sessions SET last_accessed_at = ? WHERE token = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
