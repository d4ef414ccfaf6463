//! User and subscription models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::recipe::RecipeShort;

/// User row as stored
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// Registration payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Registration payload after validation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Response for a freshly registered user
#[derive(Debug, Clone, Serialize)]
pub struct CreatedUserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Public user representation
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

/// Author entry in the subscription list
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

/// Query parameters for subscription endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Cap on nested recipes per author
    pub recipes_limit: Option<i64>,
}

/// Request for a token
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Response for token generation
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// Password change payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SetPasswordRequest {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

/// Avatar upload payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AvatarRequest {
    /// Base64 data URI
    pub avatar: Option<String>,
}

/// Avatar upload response
#[derive(Debug, Clone, Serialize)]
pub struct AvatarResponse {
    pub avatar: String,
}
