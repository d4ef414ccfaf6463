//! Recipe models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{catalog::Tag, user::UserResponse};

/// Recipe row as stored; `image` is a path relative to the media root
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Ingredient reference in a recipe payload
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// Create/update payload. Every field is optional at the wire level so that
/// missing fields surface as field-keyed validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeRequest {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i64>>,
    /// Base64 data URI
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

/// Ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Full recipe representation
#[derive(Debug, Clone, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Compact recipe representation used by favorites, the cart and subscriptions
#[derive(Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// Query parameters for the recipe list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecipeQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<i64>,
    /// Tag slugs; a recipe matches if it carries any of them
    pub tags: Vec<String>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true") | Some("True"))
}

impl RecipeQuery {
    pub fn favorited_only(&self) -> bool {
        flag(&self.is_favorited)
    }

    pub fn in_cart_only(&self) -> bool {
        flag(&self.is_in_shopping_cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::FromRequestParts, http::Request};
    use axum_extra::extract::Query;

    async fn parse(uri: &str) -> RecipeQuery {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Query::<RecipeQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_repeated_tags_are_collected() {
        let query = parse("/api/recipes/?tags=breakfast&tags=lunch&is_favorited=1&page=2").await;
        assert_eq!(query.tags, vec!["breakfast", "lunch"]);
        assert!(query.favorited_only());
        assert!(!query.in_cart_only());
        assert_eq!(query.page, Some(2));
    }

    #[tokio::test]
    async fn test_zero_flag_is_false() {
        let query = parse("/api/recipes/?is_in_shopping_cart=0").await;
        assert!(!query.in_cart_only());
        assert!(query.tags.is_empty());
    }

    #[tokio::test]
    async fn test_single_tag_and_author() {
        let query = parse("/api/recipes/?tags=dinner&author=4").await;
        assert_eq!(query.tags, vec!["dinner"]);
        assert_eq!(query.author, Some(4));
    }
}
