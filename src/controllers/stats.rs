use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;

use super::authorize;
use crate::models::BotStatus;
use crate::AppState;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/stats").route(web::get().to(get_stats)))
        .service(web::resource("/api/logs").route(web::get().to(get_logs)));
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn get_stats(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let Some(_session) = authorize(&req, &state) else {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Not authenticated"
        }));
    };

    let total_bots = match state.db.list_bots() {
        Ok(bots) => bots.len(),
        Err(e) => {
            log::error!("Failed to count bots: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let error_bots = match state.db.count_bots_with_status(BotStatus::Error) {
        Ok(count) => count,
        Err(e) => {
            log::error!("Failed to count errored bots: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "active_bots": state.manager.active_count(),
        "total_bots": total_bots,
        "error_bots": error_bots,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn get_logs(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> impl Responder {
    let Some(_session) = authorize(&req, &state) else {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Not authenticated"
        }));
    };

    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    match state.db.list_admin_logs(limit) {
        Ok(logs) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": logs
        })),
        Err(e) => {
            log::error!("Failed to list admin logs: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }))
        }
    }
}
