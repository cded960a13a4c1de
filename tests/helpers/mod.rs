#![allow(dead_code, unused_imports)]
pub mod app;
pub mod fakes;
pub mod test_db;

pub use app::*;
pub use fakes::*;
pub use test_db::*;
