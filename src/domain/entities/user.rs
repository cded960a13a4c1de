use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Management account allowed to administer templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
    pub last_accessed_at: String,
}

impl Session {
    pub fn new(user_id: String, token: String, duration_hours: i64) -> Self {
        let now = Utc::now();
        let expires_at = now + Duration::hours(duration_hours);

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            token,
            expires_at: expires_at.to_rfc3339(),
            created_at: now.to_rfc3339(),
            last_accessed_at: now.to_rfc3339(),
        }
    }

    pub fn is_expired(&self) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires_at) => expires_at.with_timezone(&Utc) < Utc::now(),
            Err(_) => true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: String,
    pub created_at: String,
}
