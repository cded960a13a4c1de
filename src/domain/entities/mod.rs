pub mod email;
pub mod job;
pub mod template;
pub mod user;

pub use email::*;
pub use job::*;
pub use template::*;
pub use user::*;
