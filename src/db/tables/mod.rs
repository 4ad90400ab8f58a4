pub mod admin_logs;
pub mod auth_sessions;
pub mod bots;
