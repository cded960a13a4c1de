use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub admin_email: String,
    pub admin_password: String,
    pub session_duration_hours: i64,
    pub encryption_key: String,
    pub storage_path: String,
    pub asset_base_url: String,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    /// Emails per second the send worker may dispatch.
    pub max_send_rate: f64,
    pub send_batch_size: i64,
    pub max_send_attempts: i32,
    pub max_batch_recipients: usize,
    pub max_upload_bytes: usize,
    pub cors_allowed_origin: String,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    pub metrics_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://mailcast.db?mode=rwc".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let admin_email = env::var("ADMIN_EMAIL").map_err(|_| ConfigError::MissingAdminEmail)?;

        let admin_password =
            env::var("ADMIN_PASSWORD").map_err(|_| ConfigError::MissingAdminPassword)?;

        let encryption_key =
            env::var("ENCRYPTION_KEY").map_err(|_| ConfigError::MissingEncryptionKey)?;

        let session_duration_hours = parse_var("SESSION_DURATION_HOURS", 9)?;

        let storage_path = env::var("STORAGE_PATH").unwrap_or_else(|_| "./storage".to_string());

        let asset_base_url = env::var("ASSET_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/assets", server_port));

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: parse_var("SMTP_PORT", 587)?,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                use_tls: parse_var("SMTP_USE_TLS", true)?,
            }),
            _ => None,
        };

        let mail_from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "Mailcast <no-reply@localhost>".to_string());

        let max_send_rate = validate_send_rate(parse_var("MAX_SEND_RATE", 14.0)?)?;

        let send_batch_size: i64 = parse_var("SEND_BATCH_SIZE", 10)?;
        if send_batch_size < 1 {
            return Err(ConfigError::InvalidValue("SEND_BATCH_SIZE".to_string()));
        }

        let max_send_attempts: i32 = parse_var("MAX_SEND_ATTEMPTS", 3)?;
        if max_send_attempts < 1 {
            return Err(ConfigError::InvalidValue("MAX_SEND_ATTEMPTS".to_string()));
        }

        let max_batch_recipients = parse_var("MAX_BATCH_RECIPIENTS", 500)?;
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;

        let cors_allowed_origin =
            env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string());

        let otel_exporter_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok();

        let service_name = env::var("SERVICE_NAME").unwrap_or_else(|_| "mailcast".to_string());

        let metrics_port = parse_var("METRICS_PORT", 9000)?;

        Ok(Config {
            database_url,
            server_host,
            server_port,
            admin_email,
            admin_password,
            session_duration_hours,
            encryption_key,
            storage_path,
            asset_base_url,
            smtp,
            mail_from,
            max_send_rate,
            send_batch_size,
            max_send_attempts,
            max_batch_recipients,
            max_upload_bytes,
            cors_allowed_origin,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Fixed pause between two consecutive sends, derived from `max_send_rate`.
    pub fn send_delay(&self) -> Duration {
        // Rates that pass validation always map to a delay
        delay_for_rate(self.max_send_rate).unwrap_or(Duration::from_secs(1))
    }
}

fn delay_for_rate(rate: f64) -> Option<Duration> {
    if !(rate > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / rate).ok()
}

/// Rejects rates whose delay is not a representable `Duration`.
fn validate_send_rate(rate: f64) -> Result<f64, ConfigError> {
    match delay_for_rate(rate) {
        Some(_) => Ok(rate),
        None => Err(ConfigError::InvalidValue("MAX_SEND_RATE".to_string())),
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ADMIN_EMAIL environment variable not set")]
    MissingAdminEmail,

    #[error("ADMIN_PASSWORD environment variable not set")]
    MissingAdminPassword,

    #[error("ENCRYPTION_KEY environment variable not set (generate one with: openssl rand -hex 32)")]
    MissingEncryptionKey,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            admin_email: "admin@example.com".to_string(),
            admin_password: "Secret123!pass".to_string(),
            session_duration_hours: 9,
            encryption_key: "k".to_string(),
            storage_path: "./storage".to_string(),
            asset_base_url: "http://localhost:3000/assets".to_string(),
            smtp: None,
            mail_from: "Mailcast <no-reply@localhost>".to_string(),
            max_send_rate: 14.0,
            send_batch_size: 10,
            max_send_attempts: 3,
            max_batch_recipients: 500,
            max_upload_bytes: 1024,
            cors_allowed_origin: "*".to_string(),
            otel_exporter_endpoint: None,
            service_name: "mailcast".to_string(),
            metrics_port: 9000,
        }
    }

    #[test]
    fn test_send_delay_from_rate() {
        let mut config = base_config();
        config.max_send_rate = 4.0;
        assert_eq!(config.send_delay(), Duration::from_millis(250));

        config.max_send_rate = 0.5;
        assert_eq!(config.send_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_send_rate_validation() {
        assert_eq!(validate_send_rate(14.0).unwrap(), 14.0);
        for rate in [0.0, -1.0, f64::NAN, 1e-20] {
            assert!(
                matches!(
                    validate_send_rate(rate),
                    Err(ConfigError::InvalidValue(ref var)) if var == "MAX_SEND_RATE"
                ),
                "{}",
                rate
            );
        }
    }

    #[test]
    fn test_server_address() {
        assert_eq!(base_config().server_address(), "127.0.0.1:3000");
    }
}
