use crate::domain::entities::IMAGE_ROOT;
use crate::infrastructure::http::controllers;
use crate::infrastructure::http::middleware::{api_key_auth_middleware, require_auth, AppState};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    // Management routes (bearer session)
    let protected = Router::new()
        .route("/api/auth/logout", post(controllers::auth::logout))
        .route("/api/auth/session", get(controllers::auth::get_session))
        .route(
            "/api/templates",
            get(controllers::templates::list_templates)
                .post(controllers::templates::upload_template),
        )
        .route(
            "/api/templates/:id",
            get(controllers::templates::get_template)
                .delete(controllers::templates::delete_template),
        )
        .route(
            "/api/templates/:id/logs",
            get(controllers::logs::get_template_logs),
        )
        .route(
            "/api/templates/:id/api-key",
            get(controllers::templates::get_template_api_key)
                .post(controllers::templates::rotate_template_api_key),
        )
        .route(
            "/api/templates/:id/html",
            get(controllers::templates::get_template_html),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Sending routes (template API key)
    let sending = Router::new()
        .route("/api/send", post(controllers::send::send_email))
        .route("/api/send/batch", post(controllers::send::send_batch))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api_key_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/login", post(controllers::auth::login))
        .merge(protected)
        .merge(sending)
        .nest_service(
            &format!("/assets/{}", IMAGE_ROOT),
            ServeDir::new(state.storage_path.join(IMAGE_ROOT)),
        )
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes))
        .layer(cors_layer(&state.cors_allowed_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-template-id"),
            header::HeaderName::from_static("x-api-key"),
        ]);

    match allowed_origin {
        "*" => layer.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                tracing::warn!("Invalid CORS origin '{}', allowing any origin", origin);
                layer.allow_origin(Any)
            }
        },
    }
}

async fn health_handler() -> &'static str {
    "OK"
}
