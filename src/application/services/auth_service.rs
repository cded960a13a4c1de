use crate::application::services::session_service::SessionService;
use crate::domain::entities::{LoginResponse, Session, User};
use crate::domain::errors::ErrorCode;
use crate::domain::ports::user_repository::UserRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::shared::rate_limiter::LoginRateLimiter;
use crate::shared::utils::api_keys::generate_session_token;
use crate::shared::utils::email_validator::validate_and_normalize_email;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use std::sync::Arc;

/// Hash password using Argon2id (m_cost 19 MiB, t_cost 2, p_cost 1).
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(19456)
        .t_cost(2)
        .p_cost(1)
        .build()
        .map_err(|_| ApiError::internal("Failed to build Argon2 params"))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let hash = argon2.hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(hash)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Management login and bearer-session validation.
#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_service: SessionService,
    rate_limiter: LoginRateLimiter,
    session_duration_hours: i64,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_service: SessionService,
        rate_limiter: LoginRateLimiter,
        session_duration_hours: i64,
    ) -> Self {
        Self {
            user_repo,
            session_service,
            rate_limiter,
            session_duration_hours,
        }
    }

    pub fn rate_limiter(&self) -> &LoginRateLimiter {
        &self.rate_limiter
    }

    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let email = validate_and_normalize_email(email)
            .map_err(|_| ApiError::Unauthorized(ErrorCode::Unauthorized))?;

        if let Err(wait) = self.rate_limiter.attempt(&email).await {
            tracing::warn!("Login rate limit hit for {}", email);
            return Err(ApiError::TooManyRequests(format!(
                "Too many login attempts, retry in {} seconds",
                wait.as_secs().max(1)
            )));
        }

        // Same error for unknown email and wrong password
        let user = self
            .user_repo
            .get_user_by_email(&email)
            .await?
            .ok_or(ApiError::Unauthorized(ErrorCode::Unauthorized))?;

        if !verify_password(password, &user.password_hash)? {
            tracing::info!("Failed login for {}", email);
            return Err(ApiError::Unauthorized(ErrorCode::Unauthorized));
        }

        self.rate_limiter.reset(&email).await;

        let session = Session::new(
            user.id.clone(),
            generate_session_token(),
            self.session_duration_hours,
        );
        self.session_service.create_session(&session).await?;

        tracing::info!("User {} logged in", user.email);

        Ok(LoginResponse {
            token: session.token,
            expires_at: session.expires_at,
            user,
        })
    }

    pub async fn logout(&self, token: &str) -> ApiResult<()> {
        self.session_service.delete_session(token).await
    }

    /// Resolve a bearer token to its user, refreshing `last_accessed_at`.
    pub async fn authenticate(&self, token: &str) -> ApiResult<(User, Session)> {
        let unauthorized = || ApiError::Unauthorized(ErrorCode::Unauthorized);

        let session = self
            .session_service
            .get_session_by_token(token)
            .await?
            .ok_or_else(unauthorized)?;

        if session.is_expired() {
            self.session_service.delete_session(token).await?;
            return Err(unauthorized());
        }

        let user = self
            .user_repo
            .get_user_by_id(&session.user_id)
            .await?
            .ok_or_else(unauthorized)?;

        if let Err(e) = self
            .session_service
            .update_session_last_accessed(token)
            .await
        {
            tracing::warn!("Failed to touch session {}: {}", session.id, e);
        }

        Ok((user, session))
    }

    /// Create the management account on first start. Returns whether a new
    /// account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> ApiResult<bool> {
        let email = validate_and_normalize_email(email)?;

        if self.user_repo.get_user_by_email(&email).await?.is_some() {
            return Ok(false);
        }

        let user = User::new(email, hash_password(password)?);
        self.user_repo.create_user(&user).await?;

        tracing::info!("Created admin account {}", user.email);
        Ok(true)
    }
}
