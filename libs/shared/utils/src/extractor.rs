use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    body::Body,
};
use tracing::debug;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

/// Guard for dashboard routes. Puts the verified `User` into request
/// extensions. Browsers without a valid session are redirected to the
/// login page; API clients get a 401.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&config, &request) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(_) if wants_html(&request) => {
            debug!("Redirecting unauthenticated browser request to {}", config.login_url);
            Redirect::to(&config.login_url).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn authenticate(config: &AppConfig, request: &Request<Body>) -> Result<User, AppError> {
    let token = bearer_token(request.headers())?;
    validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)
}

pub fn bearer_token(headers: &axum::http::HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

fn wants_html<B>(request: &Request<B>) -> bool {
    request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |accept| accept.contains("text/html"))
}

/// Role gate used inside handlers after the guard has run.
pub fn require_role(user: &User, allowed: &[Role]) -> Result<Role, AppError> {
    match user.clinic_role() {
        Some(role) if allowed.contains(&role) => Ok(role),
        Some(role) => Err(AppError::Forbidden(format!(
            "Role '{}' cannot perform this action", role
        ))),
        None => Err(AppError::Forbidden(
            "Clinic staff role required".to_string()
        )),
    }
}

pub const STAFF: &[Role] = &[Role::Admin, Role::Doctor, Role::Receptionist];
pub const CLINICIANS: &[Role] = &[Role::Admin, Role::Doctor];
