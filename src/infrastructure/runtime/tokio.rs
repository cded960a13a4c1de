use crate::domain::ports::runtime::{TaskSpawner, TimeService};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct TokioTaskSpawner;

impl TaskSpawner for TokioTaskSpawner {
    fn spawn(&self, future: BoxFuture<'static, ()>) {
        tokio::spawn(future);
    }
}

#[derive(Clone, Default)]
pub struct TokioTimeService;

#[async_trait]
impl TimeService for TokioTimeService {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
