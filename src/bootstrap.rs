use crate::application::services::{
    AuthService, EmailDispatcher, EmailEventService, SendService, SessionService,
    TemplateProcessor, TemplateService,
};
use crate::config::Config;
use crate::domain::entities::{JOB_CLEANUP_RATE_LIMITER, JOB_CLEANUP_SESSIONS};
use crate::domain::ports::email_event_repository::EmailEventRepository;
use crate::domain::ports::file_storage::FileStorage;
use crate::domain::ports::mail_transport::MailTransport;
use crate::domain::ports::runtime::{TaskSpawner, TimeService};
use crate::domain::ports::session_repository::SessionRepository;
use crate::domain::ports::task_queue::TaskQueue;
use crate::domain::ports::template_repository::TemplateRepository;
use crate::domain::ports::user_repository::UserRepository;
use crate::infrastructure::http::middleware::{ApiResult, AppState};
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{LogMailTransport, SmtpMailTransport};
use crate::infrastructure::runtime::tokio::{TokioTaskSpawner, TokioTimeService};
use crate::infrastructure::storage::LocalFileStorage;
use crate::infrastructure::workers::{JobProcessor, SendWorker, SqliteTaskQueue};
use crate::shared::rate_limiter::LoginRateLimiter;
use crate::shared::utils::encryption::KeyCipher;
use std::path::PathBuf;
use std::sync::Arc;

/// Wire services and start the background workers.
pub async fn build_app_state(
    db: Database,
    config: &Config,
) -> Result<AppState, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.storage_path)?;

    let task_spawner: Arc<dyn TaskSpawner> = Arc::new(TokioTaskSpawner);
    let time_service: Arc<dyn TimeService> = Arc::new(TokioTimeService);

    let template_repo: Arc<dyn TemplateRepository> = Arc::new(db.clone());
    let event_repo: Arc<dyn EmailEventRepository> = Arc::new(db.clone());
    let user_repo: Arc<dyn UserRepository> = Arc::new(db.clone());
    let session_repo: Arc<dyn SessionRepository> = Arc::new(db.clone());

    let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(
        &config.storage_path,
        config.asset_base_url.clone(),
    ));
    let task_queue: Arc<dyn TaskQueue> = Arc::new(SqliteTaskQueue::new(db.clone()));

    let transport: Arc<dyn MailTransport> = match &config.smtp {
        Some(smtp) => {
            tracing::info!("SMTP transport configured for {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailTransport::new(smtp, &config.mail_from)?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will only be logged");
            Arc::new(LogMailTransport)
        }
    };

    let rate_limiter = LoginRateLimiter::new();
    tracing::info!("Login rate limiter initialized (5 attempts per 15 minutes)");

    let session_service = SessionService::new(session_repo);
    let auth_service = AuthService::new(
        user_repo,
        session_service.clone(),
        rate_limiter.clone(),
        config.session_duration_hours,
    );

    let template_service = TemplateService::new(
        template_repo.clone(),
        storage.clone(),
        task_queue.clone(),
        KeyCipher::from_secret(&config.encryption_key),
    );
    let send_service = SendService::new(
        task_queue.clone(),
        event_repo.clone(),
        config.max_send_attempts,
        config.max_batch_recipients,
    );
    let email_event_service = EmailEventService::new(event_repo.clone(), template_repo.clone());

    // Maintenance jobs reschedule themselves; only seed them once
    for job_type in [JOB_CLEANUP_SESSIONS, JOB_CLEANUP_RATE_LIMITER] {
        if !task_queue.has_active_job(job_type).await? {
            task_queue
                .enqueue(job_type, serde_json::Value::Null, 3)
                .await?;
        }
    }

    let job_processor = JobProcessor::new(
        task_queue.clone(),
        TemplateProcessor::new(template_repo.clone(), storage.clone()),
        session_service,
        rate_limiter,
        time_service.clone(),
    );
    task_spawner.spawn(Box::pin(async move {
        job_processor.run().await;
    }));

    let dispatcher = EmailDispatcher::new(
        template_repo,
        storage,
        transport,
        task_queue.clone(),
        event_repo,
        time_service.clone(),
        config.send_delay(),
    );
    let send_worker = SendWorker::new(task_queue, dispatcher, time_service, config.send_batch_size);
    task_spawner.spawn(Box::pin(async move {
        send_worker.run().await;
    }));
    tracing::info!(
        "Send worker started ({} emails/second, batches of {})",
        config.max_send_rate,
        config.send_batch_size
    );

    Ok(AppState {
        template_service,
        send_service,
        email_event_service,
        auth_service,
        storage_path: PathBuf::from(&config.storage_path),
        cors_allowed_origin: config.cors_allowed_origin.clone(),
        max_upload_bytes: config.max_upload_bytes,
    })
}

/// Create the management account from `ADMIN_EMAIL` / `ADMIN_PASSWORD` if it
/// does not exist yet.
pub async fn initialize_admin(auth_service: &AuthService, config: &Config) -> ApiResult<()> {
    if auth_service
        .ensure_admin(&config.admin_email, &config.admin_password)
        .await?
    {
        tracing::info!("Admin account initialized");
    } else {
        tracing::debug!("Admin account already exists");
    }
    Ok(())
}
