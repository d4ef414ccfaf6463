//! API service routes

mod auth;
mod catalog;
mod recipes;
mod users;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::WithRejection;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::debug;

use crate::{
    error::{ApiError, ApiResult},
    middleware::authenticate,
    short_link::{is_valid_code, recipe_page_url},
    state::AppState,
};

/// Numeric id path segment; anything else is a 404
pub(crate) type IdPath = WithRejection<Path<i64>, ApiError>;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let media = ServeDir::new(state.config.media_root.clone());
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/token/login/", post(auth::login))
        .route("/api/auth/token/logout/", post(auth::logout))
        .route("/api/users/", get(users::list_users).post(users::create_user))
        .route("/api/users/me/", get(users::me))
        .route(
            "/api/users/me/avatar/",
            put(users::set_avatar).delete(users::delete_avatar),
        )
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/:id/", get(users::get_user))
        .route(
            "/api/users/:id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/tags/", get(catalog::list_tags))
        .route("/api/tags/:id/", get(catalog::get_tag))
        .route("/api/ingredients/", get(catalog::list_ingredients))
        .route("/api/ingredients/:id/", get(catalog::get_ingredient))
        .route(
            "/api/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:id/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/api/recipes/:id/get-link/", get(recipes::get_link))
        .route(
            "/api/recipes/:id/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/s/:code/", get(resolve_short_link))
        .nest_service("/media", media)
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "foodgram-api"
    }))
}

/// Redirect a short code to the recipe page
pub async fn resolve_short_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !is_valid_code(&code) {
        return Err(ApiError::NotFound);
    }

    let recipe_id = state
        .short_link_repository
        .resolve(&code)
        .await?
        .ok_or(ApiError::NotFound)?;

    debug!("Short link {} -> recipe {}", code, recipe_id);
    let location = recipe_page_url(&state.config.public_url, recipe_id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}
