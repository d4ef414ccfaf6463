//! Subscription repository

use std::collections::HashMap;

use anyhow::Result;
use sqlx::{PgPool, Row};
use tracing::info;

use super::user::profile_from_row;
use crate::{
    image::MediaStore,
    models::{RecipeShort, SubscriptionResponse, UserResponse},
    pagination::PageParams,
};

/// Subscription repository
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
    media: MediaStore,
}

impl SubscriptionRepository {
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    /// Follow `author_id`; `false` if already following
    pub async fn subscribe(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!("User {} subscribed to {}", user_id, author_id);
        }
        Ok(result.rows_affected() > 0)
    }

    /// Unfollow `author_id`; `false` if not following
    pub async fn unsubscribe(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Page of followed authors, most recent subscription first
    pub async fn list(
        &self,
        user_id: i64,
        params: PageParams,
        recipes_limit: Option<i64>,
    ) -> Result<(Vec<SubscriptionResponse>, i64)> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
                   TRUE AS is_subscribed
            FROM subscriptions s
            JOIN users u ON u.id = s.author_id
            WHERE s.user_id = $1
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let authors = rows
            .iter()
            .map(|row| profile_from_row(row, &self.media))
            .collect();

        Ok((self.with_recipes(authors, recipes_limit).await?, count))
    }

    /// Subscription entry for a single author
    pub async fn entry(
        &self,
        author: UserResponse,
        recipes_limit: Option<i64>,
    ) -> Result<SubscriptionResponse> {
        let mut entries = self.with_recipes(vec![author], recipes_limit).await?;
        entries
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Subscription entry vanished"))
    }

    async fn with_recipes(
        &self,
        authors: Vec<UserResponse>,
        recipes_limit: Option<i64>,
    ) -> Result<Vec<SubscriptionResponse>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }

        let author_ids: Vec<i64> = authors.iter().map(|author| author.id).collect();
        // negative limits are ignored
        let recipes_limit = recipes_limit.filter(|limit| *limit >= 0);

        let recipe_rows = sqlx::query(
            r#"
            SELECT id, author_id, name, image, cooking_time
            FROM (
                SELECT r.id, r.author_id, r.name, r.image, r.cooking_time,
                       ROW_NUMBER() OVER (
                           PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC
                       ) AS position
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::BIGINT IS NULL OR position <= $2
            ORDER BY author_id, position
            "#,
        )
        .bind(&author_ids)
        .bind(recipes_limit)
        .fetch_all(&self.pool)
        .await?;

        let mut recipes: HashMap<i64, Vec<RecipeShort>> = HashMap::new();
        for row in &recipe_rows {
            let image: String = row.get("image");
            recipes
                .entry(row.get("author_id"))
                .or_default()
                .push(RecipeShort {
                    id: row.get("id"),
                    name: row.get("name"),
                    image: self.media.url(&image),
                    cooking_time: row.get("cooking_time"),
                });
        }

        let count_rows = sqlx::query(
            r#"
            SELECT author_id, COUNT(*) AS recipes_count
            FROM recipes
            WHERE author_id = ANY($1)
            GROUP BY author_id
            "#,
        )
        .bind(&author_ids)
        .fetch_all(&self.pool)
        .await?;
        let counts: HashMap<i64, i64> = count_rows
            .iter()
            .map(|row| (row.get("author_id"), row.get("recipes_count")))
            .collect();

        Ok(authors
            .into_iter()
            .map(|user| SubscriptionResponse {
                recipes: recipes.remove(&user.id).unwrap_or_default(),
                recipes_count: counts.get(&user.id).copied().unwrap_or(0),
                user,
            })
            .collect())
    }
}
