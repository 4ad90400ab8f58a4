use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse, Responder};

use super::{authorize, client_ip, SESSION_COOKIE};
use crate::models::LoginRequest;
use crate::{config, AppState};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/check", web::get().to(check)),
    );
}

async fn login(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    if body.username != config::admin_username() || body.password != config::admin_password() {
        log::warn!("Rejected login attempt for user '{}'", body.username);
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid username or password"
        }));
    }

    let session = match state.db.create_auth_session(&body.username) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Failed to create auth session: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if let Err(e) = state.db.insert_admin_log(
        &session.username,
        "login",
        Some("Admin logged in successfully"),
        client_ip(&req).as_deref(),
    ) {
        log::error!("Failed to record login: {}", e);
    }

    let cookie = Cookie::build(SESSION_COOKIE, session.token.clone())
        .path("/")
        .http_only(true)
        .finish();

    HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "success": true,
        "username": session.username
    }))
}

async fn logout(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        let _ = state.db.delete_auth_session(cookie.value());
    }

    let mut removal = Cookie::new(SESSION_COOKIE, "");
    removal.set_path("/");

    let mut response = HttpResponse::Ok().json(serde_json::json!({ "success": true }));
    let _ = response.add_removal_cookie(&removal);
    response
}

async fn check(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    match authorize(&req, &state) {
        Some(session) => HttpResponse::Ok().json(serde_json::json!({
            "authenticated": true,
            "username": session.username
        })),
        None => HttpResponse::Unauthorized().json(serde_json::json!({
            "authenticated": false
        })),
    }
}
