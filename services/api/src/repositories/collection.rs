//! Favorites and shopping cart membership

use anyhow::Result;
use sqlx::PgPool;
use tracing::debug;

/// Per-user recipe collections sharing one table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Favorites,
    ShoppingCart,
}

impl Collection {
    fn table(self) -> &'static str {
        match self {
            Collection::Favorites => "favorites",
            Collection::ShoppingCart => "shopping_carts",
        }
    }

    /// Message for adding a recipe that is already present
    pub fn duplicate_message(self) -> &'static str {
        match self {
            Collection::Favorites => "Recipe is already in favorites.",
            Collection::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    /// Message for removing a recipe that is absent
    pub fn missing_message(self) -> &'static str {
        match self {
            Collection::Favorites => "Recipe is not in favorites.",
            Collection::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

/// Collection repository
#[derive(Clone)]
pub struct CollectionRepository {
    pool: PgPool,
}

impl CollectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a recipe; `false` if it was already there
    pub async fn add(&self, collection: Collection, user_id: i64, recipe_id: i64) -> Result<bool> {
        let query = format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            collection.table()
        );
        let result = sqlx::query(&query)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        debug!("{:?} add {} by {}: {}", collection, recipe_id, user_id, result.rows_affected());
        Ok(result.rows_affected() > 0)
    }

    /// Remove a recipe; `false` if it was not there
    pub async fn remove(&self, collection: Collection, user_id: i64, recipe_id: i64) -> Result<bool> {
        let query = format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            collection.table()
        );
        let result = sqlx::query(&query)
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
