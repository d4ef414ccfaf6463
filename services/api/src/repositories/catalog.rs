//! Tag and ingredient repositories

use anyhow::Result;
use sqlx::{PgPool, QueryBuilder};
use tracing::info;

use crate::models::{Ingredient, Tag};

/// Escape LIKE wildcards so user input only ever matches literally
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Tag repository
#[derive(Clone)]
pub struct TagRepository {
    pool: PgPool,
}

impl TagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All tags, ordered by id
    pub async fn list(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    /// Requested ids that do not exist
    pub async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(super::missing_ids(ids, &found))
    }

    /// Bulk insert, skipping tags whose name or slug already exists
    pub async fn insert_many(&self, tags: &[(String, String)]) -> Result<u64> {
        if tags.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::new("INSERT INTO tags (name, slug) ");
        builder.push_values(tags, |mut row, (name, slug)| {
            row.push_bind(name).push_bind(slug);
        });
        builder.push(" ON CONFLICT DO NOTHING");

        let inserted = builder.build().execute(&self.pool).await?.rows_affected();
        info!("Inserted {} of {} tags", inserted, tags.len());
        Ok(inserted)
    }
}

/// Ingredient repository
#[derive(Clone)]
pub struct IngredientRepository {
    pool: PgPool,
}

impl IngredientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ingredients ordered by name, optionally filtered by a case-insensitive prefix
    pub async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let ingredients = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>(
                    r#"
                    SELECT id, name, measurement_unit
                    FROM ingredients
                    WHERE lower(name) LIKE lower($1)
                    ORDER BY name, id
                    "#,
                )
                .bind(like_prefix(prefix))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(ingredients)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ingredient)
    }

    /// Requested ids that do not exist
    pub async fn missing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(super::missing_ids(ids, &found))
    }

    /// Bulk insert, skipping existing (name, unit) pairs
    pub async fn insert_many(&self, ingredients: &[(String, String)]) -> Result<u64> {
        let mut inserted = 0;

        // keep each statement well under the bind parameter limit
        for chunk in ingredients.chunks(1000) {
            let mut builder =
                QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
            builder.push_values(chunk, |mut row, (name, unit)| {
                row.push_bind(name).push_bind(unit);
            });
            builder.push(" ON CONFLICT DO NOTHING");
            inserted += builder.build().execute(&self.pool).await?.rows_affected();
        }

        info!("Inserted {} of {} ingredients", inserted, ingredients.len());
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("sug"), "sug%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix("a\\b"), "a\\\\b%");
    }
}
