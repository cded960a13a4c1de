use crate::config::SmtpConfig;
use crate::domain::entities::RenderedEmail;
use crate::domain::errors::ErrorCode;
use crate::domain::ports::mail_transport::MailTransport;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// Delivers rendered campaign emails through an SMTP relay.
pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(config: &SmtpConfig, from: &str) -> ApiResult<Self> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| ApiError::internal(format!("Invalid MAIL_FROM address: {}", e)))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| ApiError::internal(format!("Failed to create SMTP transport: {}", e)))?
                .port(config.port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .credentials(creds)
                .build()
        };

        Ok(Self { mailer, from })
    }

    fn build_message(&self, email: &RenderedEmail) -> ApiResult<Message> {
        let to: Mailbox = email.to.parse().map_err(|e| {
            ApiError::BadRequest(
                ErrorCode::InvalidRecipient,
                format!("Invalid recipient '{}': {}", email.to, e),
            )
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| ApiError::BadRequest(ErrorCode::InvalidRequest, e.to_string()))
    }
}

/// 5xx replies mean the relay refused the message for good; anything else
/// (connection failures, 4xx, TLS) may succeed later.
fn classify_smtp_error(err: lettre::transport::smtp::Error) -> ApiError {
    if err.is_permanent() {
        ApiError::BadRequest(ErrorCode::DeliveryRejected, err.to_string())
    } else {
        ApiError::Internal(ErrorCode::DeliveryError, err.to_string())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(&self, email: &RenderedEmail) -> ApiResult<()> {
        let message = self.build_message(email)?;

        self.mailer
            .send(message)
            .await
            .map_err(classify_smtp_error)?;

        tracing::debug!("SMTP relay accepted email to {}", email.to);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "smtp"
    }
}
