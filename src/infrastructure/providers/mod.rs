pub mod log_transport;
pub mod smtp_transport;

pub use log_transport::LogMailTransport;
pub use smtp_transport::SmtpMailTransport;
