pub mod admin_log;
pub mod auth_session;
pub mod bot;

pub use admin_log::AdminLog;
pub use auth_session::{AuthSession, LoginRequest};
pub use bot::{Bot, BotResponse, BotStatus, CreateBotRequest, UpdateBotRequest};
