pub mod api_key_auth;
pub mod auth;
pub mod error;

pub use api_key_auth::*;
pub use auth::*;
pub use error::*;
