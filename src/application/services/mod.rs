pub mod auth_service;
pub mod email_dispatcher;
pub mod email_event_service;
pub mod send_service;
pub mod session_service;
pub mod template_fields;
pub mod template_processor;
pub mod template_service;

pub use auth_service::AuthService;
pub use email_dispatcher::{BatchReport, EmailDispatcher};
pub use email_event_service::EmailEventService;
pub use send_service::SendService;
pub use session_service::SessionService;
pub use template_processor::TemplateProcessor;
pub use template_service::TemplateService;
