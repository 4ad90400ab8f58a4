//! The boundary between the lifecycle registry and the bot platform client.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::Bot;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The adapter could not be constructed from the persisted record.
    #[error("failed to build worker: {0}")]
    Build(String),
    /// The platform rejected the token or the initial connection failed.
    #[error("failed to connect: {0}")]
    Connect(String),
    /// The run loop ended on its own without being cancelled.
    #[error("worker loop terminated unexpectedly")]
    Terminated,
}

/// A single bot's long-running message loop.
#[async_trait]
pub trait BotWorker: Send + Sync {
    /// Run until the token is cancelled or the loop fails.
    async fn run(&self, cancel: CancellationToken) -> Result<(), WorkerError>;

    /// Release any network session held by the worker. Best-effort.
    async fn shutdown(&self);
}

/// Builds workers from persisted bot records.
pub trait WorkerFactory: Send + Sync {
    fn build(&self, bot: &Bot) -> Result<Arc<dyn BotWorker>, WorkerError>;
}
