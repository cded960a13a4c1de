pub mod job_queue;
pub mod job_worker;
pub mod send_worker;

pub use job_queue::*;
pub use job_worker::*;
pub use send_worker::*;
