use actix_web::{web, HttpRequest, HttpResponse, Responder};

use super::{authorize, client_ip};
use crate::manager::ControlError;
use crate::models::{BotResponse, CreateBotRequest, UpdateBotRequest};
use crate::AppState;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/bots")
            .route("", web::get().to(list_bots))
            .route("", web::post().to(create_bot))
            .route("/stop-all", web::post().to(stop_all_bots))
            .route("/{id}", web::get().to(get_bot))
            .route("/{id}", web::put().to(update_bot))
            .route("/{id}", web::delete().to(delete_bot))
            .route("/{id}/start", web::post().to(start_bot))
            .route("/{id}/stop", web::post().to(stop_bot))
            .route("/{id}/restart", web::post().to(restart_bot)),
    );
}

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Not authenticated"
    }))
}

fn control_error_response(err: &ControlError) -> HttpResponse {
    match err {
        ControlError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Bot not found"
        })),
        ControlError::AlreadyRunning(_) | ControlError::NotRunning(_) => {
            HttpResponse::Conflict().json(serde_json::json!({
                "error": err.to_string()
            }))
        }
        _ => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": err.to_string()
        })),
    }
}

/// Record an administrative action; failures only make it into the log output.
fn audit(
    state: &AppState,
    req: &HttpRequest,
    username: &str,
    action: &str,
    details: &str,
) {
    if let Err(e) =
        state
            .db
            .insert_admin_log(username, action, Some(details), client_ip(req).as_deref())
    {
        log::error!("Failed to record admin action '{}': {}", action, e);
    }
}

async fn list_bots(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let Some(_session) = authorize(&req, &state) else {
        return unauthorized();
    };

    match state.db.list_bots() {
        Ok(bots) => {
            let bots: Vec<BotResponse> = bots.into_iter().map(BotResponse::from).collect();
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "data": bots
            }))
        }
        Err(e) => {
            log::error!("Failed to list bots: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }))
        }
    }
}

async fn get_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let Some(_session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    match state.db.get_bot(bot_id) {
        Ok(Some(bot)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": BotResponse::from(bot)
        })),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Bot not found"
        })),
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }))
        }
    }
}

async fn create_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateBotRequest>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };

    let name = body.name.trim();
    let token = body.token.trim();
    if name.is_empty() || token.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Name and token are required"
        }));
    }

    // Duplicate names are rejected before the registry is ever involved
    match state.db.get_bot_by_name(name) {
        Ok(Some(_)) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "A bot with this name already exists"
            }));
        }
        Ok(None) => {}
        Err(e) => {
            log::error!("Failed to check bot name '{}': {}", name, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    }

    match state.db.create_bot(name, token, body.description.as_deref()) {
        Ok(bot) => {
            audit(
                &state,
                &req,
                &session.username,
                "add_bot",
                &format!("Added new bot: {}", bot.name),
            );
            HttpResponse::Created().json(serde_json::json!({
                "success": true,
                "data": BotResponse::from(bot)
            }))
        }
        Err(e) => {
            // Most likely the unique token constraint
            log::error!("Failed to create bot '{}': {}", name, e);
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Could not create bot; name and token must be unique"
            }))
        }
    }
}

async fn update_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateBotRequest>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    match state.db.get_bot(bot_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Bot not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    }

    match state.db.update_bot(
        bot_id,
        body.name.as_deref(),
        body.token.as_deref(),
        body.description.as_deref(),
        body.webhook_url.as_deref(),
    ) {
        Ok(Some(bot)) => {
            audit(
                &state,
                &req,
                &session.username,
                "edit_bot",
                &format!("Updated bot: {}", bot.name),
            );
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "data": BotResponse::from(bot)
            }))
        }
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Bot not found"
        })),
        Err(e) => {
            log::error!("Failed to update bot {}: {}", bot_id, e);
            HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Could not update bot; name and token must be unique"
            }))
        }
    }
}

async fn delete_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    let bot = match state.db.get_bot(bot_id) {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Bot not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // A running worker must be force-stopped before its record disappears
    if state.manager.is_active(bot_id) {
        if let Err(e) = state.manager.stop_bot(bot_id).await {
            log::warn!("Failed to stop bot {} before delete: {}", bot_id, e);
        }
    }

    match state.db.delete_bot(bot_id) {
        Ok(true) => {
            audit(
                &state,
                &req,
                &session.username,
                "delete_bot",
                &format!("Deleted bot: {}", bot.name),
            );
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": format!("Bot {} deleted successfully", bot.name)
            }))
        }
        Ok(false) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Bot not found"
        })),
        Err(e) => {
            log::error!("Failed to delete bot {}: {}", bot_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }))
        }
    }
}

async fn start_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    let bot = match state.db.get_bot(bot_id) {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Bot not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match state.manager.start_bot(bot_id).await {
        Ok(()) => {
            audit(
                &state,
                &req,
                &session.username,
                "start_bot",
                &format!("Started bot: {}", bot.name),
            );
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": format!("Bot {} started successfully", bot.name)
            }))
        }
        Err(e) => {
            audit(
                &state,
                &req,
                &session.username,
                "start_bot_failed",
                &format!("Failed to start bot: {}", bot.name),
            );
            control_error_response(&e)
        }
    }
}

async fn stop_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    let bot = match state.db.get_bot(bot_id) {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Bot not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    match state.manager.stop_bot(bot_id).await {
        Ok(()) => {
            audit(
                &state,
                &req,
                &session.username,
                "stop_bot",
                &format!("Stopped bot: {}", bot.name),
            );
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": format!("Bot {} stopped successfully", bot.name)
            }))
        }
        Err(e) => {
            audit(
                &state,
                &req,
                &session.username,
                "stop_bot_failed",
                &format!("Failed to stop bot: {}", bot.name),
            );
            control_error_response(&e)
        }
    }
}

async fn restart_bot(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };
    let bot_id = path.into_inner();

    let bot = match state.db.get_bot(bot_id) {
        Ok(Some(bot)) => bot,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Bot not found"
            }));
        }
        Err(e) => {
            log::error!("Failed to get bot {}: {}", bot_id, e);
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let result = state.manager.restart_bot(bot_id).await;
    audit(
        &state,
        &req,
        &session.username,
        "restart_bot",
        &format!("Restarted bot: {}", bot.name),
    );

    match result {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": format!("Bot {} restarted successfully", bot.name)
        })),
        Err(e) => control_error_response(&e),
    }
}

async fn stop_all_bots(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let Some(session) = authorize(&req, &state) else {
        return unauthorized();
    };

    state.manager.stop_all().await;
    audit(
        &state,
        &req,
        &session.username,
        "stop_all_bots",
        "Stopped all running bots",
    );

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "All bots stopped"
    }))
}
