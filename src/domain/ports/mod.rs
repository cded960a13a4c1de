pub mod email_event_repository;
pub mod file_storage;
pub mod mail_transport;
pub mod runtime;
pub mod session_repository;
pub mod task_queue;
pub mod template_repository;
pub mod user_repository;
