use actix_web::{web, HttpRequest, HttpResponse, Responder};

use crate::{
    db::DBHealthStatus,
    errors::ApiError,
    middleware::route_not_found,
    types::{AppState, HealthStatus, ResponsePayload},
};

mod user;

pub const API_PREFIX: &str = "/api/v2";

// Handler function for the root route "/"
async fn index() -> impl Responder {
    HttpResponse::Ok().json(ResponsePayload {
        success: true,
        message: String::from("Account API is running"),
    })
}

// Handler function for the health check endpoint
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let uptime = data.start_time.elapsed().as_secs();
    let state = data.lifecycle.state();

    let db_health = match &data.db {
        Some(db) => Some(db.health_check().await),
        None => None,
    };
    let db_ok = db_health
        .as_ref()
        .map(|h| h.status == DBHealthStatus::Healthy)
        .unwrap_or(true);

    let healthy = db_ok && state.accepts_connections();
    let status = HealthStatus {
        status: String::from(if healthy { "OK" } else { "DEGRADED" }),
        version: data.version.clone(),
        state,
        db_health,
        uptime_seconds: uptime,
    };

    // Degraded health is reported in the body; error statuses get enveloped.
    HttpResponse::Ok().json(status)
}

/// Fallback for every request no route matched.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    Err(route_not_found(&req))
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index));
    cfg.route("/health", web::get().to(health_check));
    user::configure_routes(cfg);
}
