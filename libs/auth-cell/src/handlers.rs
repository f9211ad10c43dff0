use std::sync::Arc;

use axum::{
    extract::{State, Json},
    http::HeaderMap,
};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::{SessionResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token;

/// Exchanges a signed-in user's token for their clinic role and the
/// dashboard they land on. Accounts without a clinic role are refused.
#[axum::debug_handler]
pub async fn create_session(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    debug!("Resolving dashboard session");

    let token = bearer_token(&headers)?;
    let user = validate_token(token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    session_for(user).map(Json)
}

pub fn session_for(user: User) -> Result<SessionResponse, AppError> {
    let Some(role) = user.clinic_role() else {
        warn!("User {} signed in without a clinic role", user.id);
        return Err(AppError::Forbidden(
            "This account does not have dashboard access".to_string(),
        ));
    };

    info!("User {} signed in as {}", user.id, role);
    Ok(SessionResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: Some(role),
        dashboard: Some(role.dashboard_path().to_string()),
    })
}
