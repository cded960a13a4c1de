use crate::domain::entities::{EmailEvent, EmailEventStatus};
use crate::domain::ports::email_event_repository::EmailEventRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

fn event_from_row(row: &AnyRow) -> ApiResult<EmailEvent> {
    let status: String = row.try_get("status")?;

    Ok(EmailEvent {
        id: row.try_get("id")?,
        template_id: row.try_get("template_id")?,
        job_id: row.try_get("job_id").ok(),
        recipient: row.try_get("recipient")?,
        subject: row.try_get("subject")?,
        status: status
            .parse()
            .map_err(|e: String| ApiError::internal(format!("Corrupt email event row: {}", e)))?,
        detail: row.try_get("detail").ok(),
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl EmailEventRepository for Database {
    async fn record_event(&self, event: &EmailEvent) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO email_events (id, template_id, job_id, recipient, subject, status, detail, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.template_id)
        .bind(&event.job_id)
        .bind(&event.recipient)
        .bind(&event.subject)
        .bind(event.status.as_str())
        .bind(&event.detail)
        .bind(&event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_events_for_template(
        &self,
        template_id: &str,
        status: Option<EmailEventStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<EmailEvent>> {
        // status = NULL short-circuits the filter
        let rows = sqlx::query(
            "SELECT id, template_id, job_id, recipient, subject, status, detail,
                    CAST(created_at AS TEXT) as created_at
             FROM email_events
             WHERE template_id = ? AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(template_id)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn count_events_for_template(
        &self,
        template_id: &str,
        status: Option<EmailEventStatus>,
    ) -> ApiResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM email_events
             WHERE template_id = ? AND (? IS NULL OR status = ?)",
        )
        .bind(template_id)
        .bind(status.map(|s| s.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("count")?)
    }
}
