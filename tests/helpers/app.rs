use super::fakes::{RecordingMailTransport, RecordingTimeService};
use super::test_db::{setup_test_db, teardown_test_db, TestDb};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use mailcast::application::services::{
    AuthService, EmailDispatcher, EmailEventService, SendService, SessionService,
    TemplateProcessor, TemplateService,
};
use mailcast::domain::ports::file_storage::FileStorage;
use mailcast::domain::ports::runtime::TimeService;
use mailcast::domain::ports::task_queue::TaskQueue;
use mailcast::infrastructure::http::build_router;
use mailcast::infrastructure::http::middleware::AppState;
use mailcast::infrastructure::persistence::Database;
use mailcast::infrastructure::storage::LocalFileStorage;
use mailcast::infrastructure::workers::{JobProcessor, SendWorker, SqliteTaskQueue};
use mailcast::shared::rate_limiter::LoginRateLimiter;
use mailcast::shared::utils::encryption::KeyCipher;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "Sup3r-Secret-Pass";
pub const SEND_DELAY: Duration = Duration::from_millis(200);
pub const MAX_SEND_ATTEMPTS: i32 = 3;
pub const MAX_BATCH_RECIPIENTS: usize = 5;
pub const ASSET_BASE_URL: &str = "http://localhost:8080/assets";

/// Fully wired application with fake mail delivery and time, and no
/// background workers. Tests drive the workers explicitly.
pub struct TestApp {
    pub test_db: TestDb,
    pub state: AppState,
    pub storage: Arc<dyn FileStorage>,
    pub queue: Arc<SqliteTaskQueue>,
    pub transport: Arc<RecordingMailTransport>,
    pub time: Arc<RecordingTimeService>,
    pub job_processor: JobProcessor,
    pub send_worker: SendWorker,
    storage_dir: PathBuf,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Use `storage` instead of a temporary local directory.
    pub async fn with_storage(storage: Arc<dyn FileStorage>) -> Self {
        Self::build(Some(storage)).await
    }

    async fn build(storage: Option<Arc<dyn FileStorage>>) -> Self {
        let test_db = setup_test_db().await;
        let db: Database = test_db.db.clone();

        let storage_dir = std::env::temp_dir().join(format!("mailcast-storage-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&storage_dir).expect("Failed to create storage dir");
        let storage = storage.unwrap_or_else(|| {
            Arc::new(LocalFileStorage::new(&storage_dir, ASSET_BASE_URL)) as Arc<dyn FileStorage>
        });

        let queue = Arc::new(SqliteTaskQueue::new(db.clone()));
        let task_queue: Arc<dyn TaskQueue> = queue.clone();
        let transport = Arc::new(RecordingMailTransport::default());
        let time = Arc::new(RecordingTimeService::default());
        let time_service: Arc<dyn TimeService> = time.clone();

        let template_repo = Arc::new(db.clone());
        let event_repo = Arc::new(db.clone());

        let rate_limiter = LoginRateLimiter::with_config(3, Duration::from_secs(60));
        let session_service = SessionService::new(Arc::new(db.clone()));
        let auth_service = AuthService::new(
            Arc::new(db.clone()),
            session_service.clone(),
            rate_limiter.clone(),
            24,
        );
        auth_service
            .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("Failed to create admin");

        let template_service = TemplateService::new(
            template_repo.clone(),
            storage.clone(),
            task_queue.clone(),
            KeyCipher::from_secret("test-encryption-secret"),
        );
        let send_service = SendService::new(
            task_queue.clone(),
            event_repo.clone(),
            MAX_SEND_ATTEMPTS,
            MAX_BATCH_RECIPIENTS,
        );
        let email_event_service = EmailEventService::new(event_repo.clone(), template_repo.clone());

        let job_processor = JobProcessor::new(
            task_queue.clone(),
            TemplateProcessor::new(template_repo.clone(), storage.clone()),
            session_service,
            rate_limiter,
            time_service.clone(),
        );
        let dispatcher = EmailDispatcher::new(
            template_repo,
            storage.clone(),
            transport.clone(),
            task_queue.clone(),
            event_repo,
            time_service.clone(),
            SEND_DELAY,
        );
        let send_worker = SendWorker::new(task_queue, dispatcher, time_service, 50);

        let state = AppState {
            template_service,
            send_service,
            email_event_service,
            auth_service,
            storage_path: storage_dir.clone(),
            cors_allowed_origin: "*".to_string(),
            max_upload_bytes: 1024 * 1024,
        };

        Self {
            test_db,
            state,
            storage,
            queue,
            transport,
            time,
            job_processor,
            send_worker,
            storage_dir,
        }
    }

    pub fn db(&self) -> &Database {
        &self.test_db.db
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn login(&self) -> String {
        let (status, body) = self
            .request(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().expect("token").to_string()
    }

    /// Upload through the API and return the response body.
    pub async fn upload_template(&self, token: &str, name: &str, html: &str) -> Value {
        let (status, body) = self
            .request(json_request(
                Method::POST,
                "/api/templates",
                Some(token),
                json!({ "name": name, "html": html }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
        body
    }

    /// Run queued `process_template` and maintenance jobs until none is due.
    pub async fn drain_job_processor(&self) -> usize {
        let mut handled = 0;
        while self
            .job_processor
            .process_next()
            .await
            .expect("Job processor failed")
            .is_some()
        {
            handled += 1;
        }
        handled
    }

    /// Upload and process a template; returns `(template_id, api_key)`.
    pub async fn in_service_template(&self, token: &str, html: &str) -> (String, String) {
        let body = self.upload_template(token, "Campaign", html).await;
        self.drain_job_processor().await;
        (
            body["id"].as_str().expect("id").to_string(),
            body["api_key"].as_str().expect("api_key").to_string(),
        )
    }

    pub async fn teardown(self) {
        let _ = std::fs::remove_dir_all(&self.storage_dir);
        teardown_test_db(self.test_db).await;
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    bodyless_request(Method::GET, uri, token)
}

pub fn bodyless_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::empty())
        .expect("Failed to build request")
}

/// `POST` authenticated with the template id and API key headers.
pub fn send_request(uri: &str, template_id: &str, api_key: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Template-Id", template_id)
        .header("X-Api-Key", api_key)
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}
