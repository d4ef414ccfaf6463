//! Short link repository

use anyhow::{Result, bail};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::short_link::generate_code;

const MAX_ATTEMPTS: usize = 5;

/// Short link repository
#[derive(Clone)]
pub struct ShortLinkRepository {
    pool: PgPool,
}

impl ShortLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn code_for(&self, recipe_id: i64) -> Result<Option<String>> {
        let code = sqlx::query_scalar("SELECT code FROM short_links WHERE recipe_id = $1")
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(code)
    }

    /// The recipe's code, created on first request
    pub async fn get_or_create(&self, recipe_id: i64) -> Result<String> {
        if let Some(code) = self.code_for(recipe_id).await? {
            return Ok(code);
        }

        for _ in 0..MAX_ATTEMPTS {
            let code = generate_code();
            let inserted: Option<String> = sqlx::query_scalar(
                r#"
                INSERT INTO short_links (code, recipe_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                RETURNING code
                "#,
            )
            .bind(&code)
            .bind(recipe_id)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(code) = inserted {
                info!("Created short link {} for recipe {}", code, recipe_id);
                return Ok(code);
            }

            // either a concurrent request linked this recipe or the code collided
            if let Some(code) = self.code_for(recipe_id).await? {
                return Ok(code);
            }
            warn!("Short code collision on {}, retrying", code);
        }

        bail!("Could not allocate a short code for recipe {}", recipe_id)
    }

    /// Recipe id behind a code
    pub async fn resolve(&self, code: &str) -> Result<Option<i64>> {
        let recipe_id = sqlx::query_scalar("SELECT recipe_id FROM short_links WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(recipe_id)
    }
}
