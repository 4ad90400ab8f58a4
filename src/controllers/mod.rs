pub mod auth;
pub mod bots;
pub mod health;
pub mod stats;

use actix_web::HttpRequest;

use crate::models::AuthSession;
use crate::AppState;

pub const SESSION_COOKIE: &str = "admin_session";

/// Resolve the authenticated admin session from the request cookie.
pub(crate) fn authorize(req: &HttpRequest, state: &AppState) -> Option<AuthSession> {
    let cookie = req.cookie(SESSION_COOKIE)?;
    state.db.validate_auth_session(cookie.value()).ok().flatten()
}

/// Best-effort client address for activity logging.
pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    req.connection_info()
        .realip_remote_addr()
        .map(|addr| addr.to_string())
}
