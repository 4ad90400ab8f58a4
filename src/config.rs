use std::env;
use std::path::PathBuf;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    pub const ADMIN_USERNAME: &str = "ADMIN_USERNAME";
    pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
    /// Override for the directory the static admin UI is served from.
    pub const PUBLIC_DIR: &str = "PUBLIC_DIR";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8000;
    pub const DATABASE_URL: &str = "./data/masterbot.db";
    pub const ADMIN_USERNAME: &str = "admin";
    pub const ADMIN_PASSWORD: &str = "admin123";
    pub const PUBLIC_DIR: &str = "public";
}

/// Returns the absolute path to the backend directory.
/// Uses CARGO_MANIFEST_DIR at compile time, so it always resolves
/// regardless of the working directory at runtime.
pub fn backend_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn port() -> u16 {
    env::var(env_vars::PORT)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::PORT)
}

pub fn database_url() -> String {
    env::var(env_vars::DATABASE_URL).unwrap_or_else(|_| defaults::DATABASE_URL.to_string())
}

pub fn admin_username() -> String {
    env::var(env_vars::ADMIN_USERNAME).unwrap_or_else(|_| defaults::ADMIN_USERNAME.to_string())
}

/// Falls back to the built-in default; deployments must override this.
pub fn admin_password() -> String {
    env::var(env_vars::ADMIN_PASSWORD).unwrap_or_else(|_| defaults::ADMIN_PASSWORD.to_string())
}

/// Directory the static admin UI is served from.
pub fn public_dir() -> PathBuf {
    match env::var(env_vars::PUBLIC_DIR) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => backend_dir().join(defaults::PUBLIC_DIR),
    }
}
