use crate::domain::entities::{Template, TemplateStatus};
use crate::domain::ports::template_repository::TemplateRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::AnyRow;
use sqlx::Row;

const TEMPLATE_COLUMNS: &str = "id, name, status, fields, api_key_encrypted,
     CAST(created_at AS TEXT) as created_at, CAST(updated_at AS TEXT) as updated_at";

fn template_from_row(row: &AnyRow) -> ApiResult<Template> {
    let status: String = row.try_get("status")?;
    let fields: String = row.try_get("fields")?;

    Ok(Template {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: status
            .parse()
            .map_err(|e: String| ApiError::internal(format!("Corrupt template row: {}", e)))?,
        fields: serde_json::from_str(&fields)
            .map_err(|e| ApiError::internal(format!("Corrupt template fields: {}", e)))?,
        api_key_encrypted: row.try_get("api_key_encrypted")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TemplateRepository for Database {
    async fn create_template(&self, template: &Template) -> ApiResult<()> {
        let fields = serde_json::to_string(&template.fields)
            .map_err(|e| ApiError::internal(format!("Failed to encode fields: {}", e)))?;

        sqlx::query(
            "INSERT INTO templates (id, name, status, fields, api_key_encrypted, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(template.status.as_str())
        .bind(fields)
        .bind(&template.api_key_encrypted)
        .bind(&template.created_at)
        .bind(&template.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_template(&self, id: &str) -> ApiResult<Option<Template>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM templates WHERE id = ?",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(template_from_row).transpose()
    }

    async fn list_templates(
        &self,
        status: Option<TemplateStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<Template>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM templates WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                    TEMPLATE_COLUMNS
                ))
                .bind(status.as_str())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM templates WHERE status != 'deleted'
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                    TEMPLATE_COLUMNS
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(template_from_row).collect()
    }

    async fn count_templates(&self, status: Option<TemplateStatus>) -> ApiResult<i64> {
        let row = match status {
            Some(status) => {
                sqlx::query("SELECT COUNT(*) as count FROM templates WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) as count FROM templates WHERE status != 'deleted'")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        Ok(row.try_get("count")?)
    }

    async fn update_template_status(&self, id: &str, status: TemplateStatus) -> ApiResult<()> {
        let result = sqlx::query("UPDATE templates SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Template {} not found", id)));
        }

        Ok(())
    }

    async fn transition_template_status(
        &self,
        id: &str,
        from: TemplateStatus,
        to: TemplateStatus,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE templates SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_template_api_key(&self, id: &str, api_key_encrypted: &str) -> ApiResult<()> {
        let result =
            sqlx::query("UPDATE templates SET api_key_encrypted = ?, updated_at = ? WHERE id = ?")
                .bind(api_key_encrypted)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found(format!("Template {} not found", id)));
        }

        Ok(())
    }
}
