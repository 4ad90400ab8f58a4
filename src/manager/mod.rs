pub mod registry;
pub mod telegram;
pub mod worker;

pub use registry::{BotManager, ControlError};
pub use telegram::TelegramWorkerFactory;
pub use worker::{BotWorker, WorkerError, WorkerFactory};
