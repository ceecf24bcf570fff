use actix_web::web;

use super::API_PREFIX;
use crate::handlers::{
    change_password_handler, login_handler, logout_handler, me_handler, register_handler,
    update_profile_handler,
};

// Configure account routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(&format!("{}/user", API_PREFIX))
            .route("/register", web::post().to(register_handler))
            .route("/login", web::post().to(login_handler))
            .route("/logout", web::get().to(logout_handler))
            .route("/me", web::get().to(me_handler))
            .route("/me", web::put().to(update_profile_handler))
            .route("/me/password", web::put().to(change_password_handler)),
    );
}
