pub mod api_keys;
pub mod email_validator;
pub mod encryption;
