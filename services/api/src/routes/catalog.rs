//! Read-only tag and ingredient endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::{Query, WithRejection};

use super::IdPath;
use crate::{
    error::{ApiError, ApiResult},
    models::{Ingredient, IngredientQuery, Tag},
    state::AppState,
};

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.tag_repository.list().await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<Json<Tag>> {
    let tag = state.tag_repository.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(tag))
}

/// Ingredients, optionally narrowed by `?name=` prefix
pub async fn list_ingredients(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<IngredientQuery>, ApiError>,
) -> ApiResult<Json<Vec<Ingredient>>> {
    let ingredients = state
        .ingredient_repository
        .search(query.name.as_deref())
        .await?;
    Ok(Json(ingredients))
}

pub async fn get_ingredient(
    State(state): State<AppState>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<Json<Ingredient>> {
    let ingredient = state
        .ingredient_repository
        .get(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(ingredient))
}
