use crate::domain::entities::User;
use crate::domain::ports::user_repository::UserRepository;
use crate::infrastructure::http::middleware::error::ApiResult;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

fn user_from_row(row: &AnyRow) -> ApiResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for Database {
    async fn create_user(&self, user: &User) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.created_at)
        .bind(&user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at, updated_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn get_user_by_id(&self, id: &str) -> ApiResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, password_hash, created_at, updated_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}
