use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    web, HttpResponse, Responder,
};
use serde_json::json;

use crate::{
    config::SessionConfig,
    context::RequestContext,
    models::{LoginDto, RegisterDto, UpdatePasswordDto, UpdateProfileDto, UserResponseDto},
    services::{IssuedSession, UserService},
    types::Result,
};

fn session_cookie<'c>(config: &SessionConfig, session: &IssuedSession) -> Cookie<'c> {
    Cookie::build(config.cookie_name.clone(), session.token.clone())
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(if config.cookie_secure {
            SameSite::None
        } else {
            SameSite::Lax
        })
        .max_age(CookieDuration::seconds(session.ttl.num_seconds()))
        .finish()
}

fn removal_cookie<'c>(config: &SessionConfig) -> Cookie<'c> {
    let mut cookie = Cookie::build(config.cookie_name.clone(), "")
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .finish();
    cookie.make_removal();
    cookie
}

/// Register route handler
pub async fn register_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    let dto: RegisterDto = ctx.body_as()?;
    let (user, issued) = service.register(dto).await?;
    Ok(HttpResponse::Created()
        .cookie(session_cookie(&session, &issued))
        .json(json!({
            "success": true,
            "user": user,
        })))
}

/// Login route handler
pub async fn login_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    let dto: LoginDto = ctx.body_as()?;
    let (user, issued) = service.login(dto).await?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&session, &issued))
        .json(json!({
            "success": true,
            "user": user,
        })))
}

/// Logout route handler; always clears the cookie
pub async fn logout_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    service.logout(ctx.cookie(&session.cookie_name)).await?;
    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(&session))
        .json(json!({
            "success": true,
            "message": "Log out successful!",
        })))
}

/// Current user route handler
pub async fn me_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    let user = service.authenticate(ctx.cookie(&session.cookie_name)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": UserResponseDto::from(user),
    })))
}

/// Update profile route handler
pub async fn update_profile_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    let user = service.authenticate(ctx.cookie(&session.cookie_name)).await?;
    let dto: UpdateProfileDto = ctx.body_as()?;
    let updated = service.update_profile(&user, dto).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": updated,
    })))
}

/// Change password route handler; rotates the session cookie
pub async fn change_password_handler(
    ctx: RequestContext,
    service: web::Data<UserService>,
    session: web::Data<SessionConfig>,
) -> Result<impl Responder> {
    let user = service.authenticate(ctx.cookie(&session.cookie_name)).await?;
    let dto: UpdatePasswordDto = ctx.body_as()?;
    let issued = service.change_password(&user, dto).await?;
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(&session, &issued))
        .json(json!({
            "success": true,
            "message": "Password updated successfully!",
        })))
}
