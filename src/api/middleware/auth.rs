use crate::api::error::AppError;
use crate::utils::auth::validate_jwt;
use crate::{AppState, entities::prelude::Users, entities::users};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;

const SESSION_COOKIE: &str = "filmroom_token";

fn cookie_token(req: &Request) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Resolve the caller from a bearer token or the session cookie and stash
/// the user row as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string());

    let token = bearer
        .or_else(|| cookie_token(&req))
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

    let claims = validate_jwt(&token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Not authorized, token failed".to_string()))?;

    let user = Users::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Layered after `auth_middleware`; rejects everyone but administrators.
pub async fn admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<users::Model>()
        .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(req).await)
}
