use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

/// Spawns the long-running workers. Kept behind a trait so bootstrap code
/// does not hard-wire the tokio runtime.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}

/// Source of delays for polling loops and send pacing. Tests swap in an
/// implementation that records requested pauses instead of sleeping.
#[async_trait]
pub trait TimeService: Send + Sync {
    async fn sleep(&self, duration: Duration);
}
