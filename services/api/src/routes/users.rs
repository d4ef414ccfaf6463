//! User, avatar, password and subscription endpoints

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, Uri},
    response::IntoResponse,
};
use axum_extra::extract::{Query, WithRejection};
use tracing::info;

use super::IdPath;
use crate::{
    error::{ApiError, ApiResult, FieldErrors},
    image::{AVATAR_DIR, decode_data_uri},
    middleware::AuthUser,
    models::{
        AvatarRequest, AvatarResponse, CreateUserRequest, CreatedUserResponse, SetPasswordRequest,
        SubscriptionQuery, SubscriptionResponse, UserResponse,
    },
    pagination::{Page, PageParams, PageQuery},
    repositories::user::verify_password,
    state::AppState,
    validation::{validate_new_user, validate_password},
};

/// Register a new user
pub async fn create_user(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CreateUserRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let new_user = validate_new_user(payload)?;

    let (email_taken, username_taken) = state
        .user_repository
        .taken(&new_user.email, &new_user.username)
        .await?;
    let mut errors = FieldErrors::new();
    if email_taken {
        errors.insert(
            "email".to_string(),
            vec!["A user with this email already exists.".to_string()],
        );
    }
    if username_taken {
        errors.insert(
            "username".to_string(),
            vec!["A user with this username already exists.".to_string()],
        );
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    // a concurrent registration can still win the unique constraint
    let user = state.user_repository.create(&new_user).await?.ok_or_else(|| {
        ApiError::non_field("A user with this email or username already exists.")
    })?;

    info!("Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }),
    ))
}

/// Page of all users
pub async fn list_users(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    uri: Uri,
    WithRejection(Query(query), _): WithRejection<Query<PageQuery>, ApiError>,
) -> ApiResult<Json<Page<UserResponse>>> {
    let params = PageParams::new(query.page, query.limit, state.config.page_size);
    let (users, count) = state
        .user_repository
        .list(viewer.map(|user| user.id), params)
        .await?;

    Ok(Json(Page::new(
        users,
        count,
        params,
        &uri,
        &state.config.public_url,
    )))
}

pub async fn get_user(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    WithRejection(Path(id), _): IdPath,
) -> ApiResult<Json<UserResponse>> {
    let user = state
        .user_repository
        .profile(id, viewer.map(|user| user.id))
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(user))
}

/// Profile of the authenticated user
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<UserResponse>> {
    // a token can outlive its account
    let profile = state
        .user_repository
        .profile(user.id, Some(user.id))
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(profile))
}

/// Upload a new avatar, replacing any previous one
pub async fn set_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<AvatarRequest>, ApiError>,
) -> ApiResult<Json<AvatarResponse>> {
    let value = payload.avatar.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(ApiError::field("avatar", "This field is required."));
    }
    let image = decode_data_uri(&value).map_err(|e| ApiError::field("avatar", e.to_string()))?;

    let path = state.media.save(AVATAR_DIR, &image).await?;
    let previous = match state.user_repository.set_avatar(user.id, Some(&path)).await {
        Ok(previous) => previous,
        Err(e) => {
            state.media.remove(&path).await;
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        state.media.remove(&previous).await;
    }

    Ok(Json(AvatarResponse {
        avatar: state.user_repository.avatar_url(&path),
    }))
}

/// Clear the avatar
pub async fn delete_avatar(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    if let Some(previous) = state.user_repository.set_avatar(user.id, None).await? {
        state.media.remove(&previous).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Change the password after checking the current one
pub async fn set_password(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Json(payload), _): WithRejection<Json<SetPasswordRequest>, ApiError>,
) -> ApiResult<StatusCode> {
    let new_password = payload.new_password.unwrap_or_default();
    let current_password = payload.current_password.unwrap_or_default();

    let mut errors = FieldErrors::new();
    if let Err(message) = validate_password(&new_password) {
        errors.insert("new_password".to_string(), vec![message]);
    }
    if current_password.is_empty() {
        errors.insert(
            "current_password".to_string(),
            vec!["This field is required.".to_string()],
        );
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let row = state
        .user_repository
        .find_by_id(user.id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !verify_password(&row.password_hash, &current_password)? {
        return Err(ApiError::field("current_password", "Incorrect password."));
    }

    state
        .user_repository
        .set_password(user.id, &new_password)
        .await?;

    info!("User {} changed password", user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Authors the user follows, with their latest recipes
pub async fn subscriptions(
    State(state): State<AppState>,
    user: AuthUser,
    uri: Uri,
    WithRejection(Query(query), _): WithRejection<Query<SubscriptionQuery>, ApiError>,
) -> ApiResult<Json<Page<SubscriptionResponse>>> {
    let params = PageParams::new(query.page, query.limit, state.config.page_size);
    let (authors, count) = state
        .subscription_repository
        .list(user.id, params, query.recipes_limit)
        .await?;

    Ok(Json(Page::new(
        authors,
        count,
        params,
        &uri,
        &state.config.public_url,
    )))
}

/// Follow an author
pub async fn subscribe(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(author_id), _): IdPath,
    WithRejection(Query(query), _): WithRejection<Query<SubscriptionQuery>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let author = state
        .user_repository
        .profile(author_id, Some(user.id))
        .await?
        .ok_or(ApiError::NotFound)?;

    if author.id == user.id {
        return Err(ApiError::field("errors", "You cannot subscribe to yourself."));
    }

    if !state
        .subscription_repository
        .subscribe(user.id, author_id)
        .await?
    {
        return Err(ApiError::field(
            "errors",
            "You are already subscribed to this author.",
        ));
    }

    let author = UserResponse {
        is_subscribed: true,
        ..author
    };
    let entry = state
        .subscription_repository
        .entry(author, query.recipes_limit)
        .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Stop following an author
pub async fn unsubscribe(
    State(state): State<AppState>,
    user: AuthUser,
    WithRejection(Path(author_id), _): IdPath,
) -> ApiResult<StatusCode> {
    if state.user_repository.find_by_id(author_id).await?.is_none() {
        return Err(ApiError::NotFound);
    }

    if !state
        .subscription_repository
        .unsubscribe(user.id, author_id)
        .await?
    {
        return Err(ApiError::field(
            "errors",
            "You are not subscribed to this author.",
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}
