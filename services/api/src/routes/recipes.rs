//! Recipe endpoints, collection toggles, short links and the cart export

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use axum_extra::extract::{Query, WithRejection};
use serde_json::json;
use tracing::info;

use super::IdPath;
use crate::{
    error::{ApiError, ApiResult, FieldErrors},
    image::RECIPE_IMAGE_DIR,
    middleware::AuthUser,
    models::{RecipeQuery, RecipeRequest, RecipeResponse, RecipeRow, RecipeShort},
    pagination::{Page, PageParams},
    repositories::{Collection, RecipeFilter},
    shopping_list::{self, ShoppingListFile},
    short_link::short_url,
    state::AppState,
    validation::{RecipeDraft, validate_recipe},
};

type RecipeBody = WithRejection<Json<RecipeRequest>, ApiError>;

/// Filtered page of recipes
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    uri: Uri,
    WithRejection(Query(query), _): WithRejection<Query<RecipeQuery>, ApiError>,
) -> ApiResult<Json<Page<RecipeResponse>>> {
    let viewer = viewer.map(|user| user.id);
    let params = PageParams::new(query.page, query.limit, state.config.page_size);
    let filter = RecipeFilter::new(
        query.author,
        query.tags.clone(),
        query.favorited_only(),
        query.in_cart_only(),
        viewer,
    );

    let (recipes, count) = state.recipe_repository.list(&filter, viewer, params).await?;

    Ok(Json(Page::new(
        recipes,
        count,
        params,
        &uri,
        &state.config.public_url,
    )))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<Json<RecipeResponse>> {
    let recipe = state
        .recipe_repository
        .get(id, viewer.map(|user| user.id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(recipe))
}

/// Reject ingredient or tag ids that do not exist
async fn check_references(state: &AppState, draft: &RecipeDraft) -> ApiResult<()> {
    let mut errors = FieldErrors::new();

    let missing = state
        .ingredient_repository
        .missing_ids(&draft.ingredient_ids())
        .await?;
    if !missing.is_empty() {
        errors.insert(
            "ingredients".to_string(),
            missing
                .iter()
                .map(|id| format!("Ingredient {} does not exist.", id))
                .collect(),
        );
    }

    let missing = state.tag_repository.missing_ids(&draft.tags).await?;
    if !missing.is_empty() {
        errors.insert(
            "tags".to_string(),
            missing
                .iter()
                .map(|id| format!("Tag {} does not exist.", id))
                .collect(),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

/// Recipe row the user may modify
async fn owned_recipe(state: &AppState, user: &AuthUser, id: i64) -> ApiResult<RecipeRow> {
    let recipe = state
        .recipe_repository
        .find_row(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    if recipe.author_id != user.id {
        return Err(ApiError::Forbidden);
    }
    Ok(recipe)
}

pub async fn create_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(payload), _): RecipeBody,
) -> ApiResult<impl IntoResponse> {
    let draft = validate_recipe(payload, true)?;
    check_references(&state, &draft).await?;

    let image = draft
        .image
        .as_ref()
        .ok_or_else(|| ApiError::field("image", "This field is required."))?;
    let path = state.media.save(RECIPE_IMAGE_DIR, image).await?;

    let id = match state.recipe_repository.create(user.id, &draft, &path).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&path).await;
            return Err(e.into());
        }
    };

    let recipe = state
        .recipe_repository
        .get(id, Some(user.id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Replace a recipe; the image is kept unless a new one is sent
pub async fn update_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
    body: Bytes,
) -> ApiResult<Json<RecipeResponse>> {
    let current = owned_recipe(&state, &user, id).await?;

    // Ownership is settled before the body is parsed
    let Json(payload) = Json::<RecipeRequest>::from_bytes(&body)?;
    let draft = validate_recipe(payload, false)?;
    check_references(&state, &draft).await?;

    let new_image = match &draft.image {
        Some(image) => Some(state.media.save(RECIPE_IMAGE_DIR, image).await?),
        None => None,
    };

    if let Err(e) = state
        .recipe_repository
        .update(id, &draft, new_image.as_deref())
        .await
    {
        if let Some(path) = &new_image {
            state.media.remove(path).await;
        }
        return Err(e.into());
    }
    if new_image.is_some() {
        state.media.remove(&current.image).await;
    }

    let recipe = state
        .recipe_repository
        .get(id, Some(user.id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<StatusCode> {
    let recipe = owned_recipe(&state, &user, id).await?;

    if !state.recipe_repository.delete(id).await? {
        return Err(ApiError::NotFound);
    }
    state.media.remove(&recipe.image).await;

    info!("User {} deleted recipe {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Short link to the recipe page
pub async fn get_link(
    State(state): State<AppState>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<impl IntoResponse> {
    if state.recipe_repository.find_row(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    let code = state.short_link_repository.get_or_create(id).await?;
    Ok(Json(json!({
        "short-link": short_url(&state.config.public_url, &code)
    })))
}

async fn add_to(
    state: &AppState,
    collection: Collection,
    user: &AuthUser,
    id: i64,
) -> ApiResult<(StatusCode, Json<RecipeShort>)> {
    let recipe = state
        .recipe_repository
        .short(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if !state
        .collection_repository
        .add(collection, user.id, id)
        .await?
    {
        return Err(ApiError::field("errors", collection.duplicate_message()));
    }

    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn remove_from(
    state: &AppState,
    collection: Collection,
    user: &AuthUser,
    id: i64,
) -> ApiResult<StatusCode> {
    if state.recipe_repository.find_row(id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    if !state
        .collection_repository
        .remove(collection, user.id, id)
        .await?
    {
        return Err(ApiError::field("errors", collection.missing_message()));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<(StatusCode, Json<RecipeShort>)> {
    add_to(&state, Collection::Favorites, &user, id).await
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<StatusCode> {
    remove_from(&state, Collection::Favorites, &user, id).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<(StatusCode, Json<RecipeShort>)> {
    add_to(&state, Collection::ShoppingCart, &user, id).await
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<StatusCode> {
    remove_from(&state, Collection::ShoppingCart, &user, id).await
}

/// Plain-text ingredient totals for everything in the cart
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<ShoppingListFile> {
    let items = state.recipe_repository.shopping_list(user.id).await?;
    Ok(ShoppingListFile(shopping_list::render(&items)))
}
