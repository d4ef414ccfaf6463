//! Token login and logout

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult, FieldErrors},
    middleware::AuthUser,
    models::{LoginRequest, TokenResponse},
    repositories::user::verify_password,
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Exchange e-mail and password for a token
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let email = payload.email.unwrap_or_default().trim().to_lowercase();
    let password = payload.password.unwrap_or_default();

    let mut errors = FieldErrors::new();
    if email.is_empty() {
        errors.insert("email".to_string(), vec!["This field is required.".to_string()]);
    }
    if password.is_empty() {
        errors.insert("password".to_string(), vec!["This field is required.".to_string()]);
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    if !state.rate_limiter.is_allowed(&email).await {
        warn!("Login rate limit hit for {}", email);
        return Err(ApiError::TooManyRequests);
    }

    let user = state
        .user_repository
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::non_field(INVALID_CREDENTIALS))?;

    if !verify_password(&user.password_hash, &password)? {
        return Err(ApiError::non_field(INVALID_CREDENTIALS));
    }

    state.rate_limiter.reset(&email).await;
    let auth_token = state.jwt_service.generate_token(user.id)?;

    info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { auth_token }))
}

/// Revoke the presented token
pub async fn logout(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    state
        .jwt_service
        .blacklist_token(&state.redis_pool, &user.token, user.expires_at)
        .await?;

    info!("User {} logged out", user.id);
    Ok(StatusCode::NO_CONTENT)
}
