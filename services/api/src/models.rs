//! API models for request and response payloads

pub mod catalog;
pub mod recipe;
pub mod user;

pub use catalog::{Ingredient, IngredientQuery, Tag};
pub use recipe::{
    IngredientAmount, RecipeIngredient, RecipeQuery, RecipeRequest, RecipeResponse, RecipeRow,
    RecipeShort,
};
pub use user::{
    AvatarRequest, AvatarResponse, CreateUserRequest, CreatedUserResponse, LoginRequest,
    NewUser, SetPasswordRequest, SubscriptionQuery, SubscriptionResponse, TokenResponse,
    UserResponse, UserRow,
};
