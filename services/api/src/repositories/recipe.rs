//! Recipe repository for database operations

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::info;

use super::user::profile_from_row;
use crate::{
    image::MediaStore,
    models::{RecipeIngredient, RecipeResponse, RecipeRow, RecipeShort, Tag, UserResponse},
    pagination::PageParams,
    shopping_list::ShoppingListItem,
    validation::RecipeDraft,
};

/// Resolved recipe list filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    /// Tag slugs, any-of
    pub tags: Vec<String>,
    pub favorited_by: Option<i64>,
    pub in_cart_of: Option<i64>,
    /// Set when a viewer-relative filter was requested anonymously
    pub match_nothing: bool,
}

impl RecipeFilter {
    /// Resolve flags against the viewer
    pub fn new(
        author: Option<i64>,
        tags: Vec<String>,
        favorited_only: bool,
        in_cart_only: bool,
        viewer: Option<i64>,
    ) -> Self {
        Self {
            author,
            tags,
            favorited_by: viewer.filter(|_| favorited_only),
            in_cart_of: viewer.filter(|_| in_cart_only),
            match_nothing: viewer.is_none() && (favorited_only || in_cart_only),
        }
    }

    fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        if self.match_nothing {
            builder.push(" AND FALSE");
            return;
        }
        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }
        if !self.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(self.tags.clone())
                .push("))");
        }
        if let Some(user_id) = self.favorited_by {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if let Some(user_id) = self.in_cart_of {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ",
                )
                .push_bind(user_id)
                .push(")");
        }
    }
}

/// Recipe repository
#[derive(Clone)]
pub struct RecipeRepository {
    pool: PgPool,
    media: MediaStore,
}

impl RecipeRepository {
    /// Create a new recipe repository
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    /// Filtered page of recipes, newest first, plus the total match count
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        viewer: Option<i64>,
        params: PageParams,
    ) -> Result<(Vec<RecipeResponse>, i64)> {
        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
        filter.push_conditions(&mut count_query);
        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::new(
            "SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date \
             FROM recipes r WHERE TRUE",
        );
        filter.push_conditions(&mut query);
        query
            .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let recipes = self.hydrate(rows, viewer).await?;

        Ok((recipes, count))
    }

    /// Stored row, used for ownership checks
    pub async fn find_row(&self, id: i64) -> Result<Option<RecipeRow>> {
        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, author_id, name, image, text, cooking_time, pub_date
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Full representation of one recipe as seen by `viewer`
    pub async fn get(&self, id: i64, viewer: Option<i64>) -> Result<Option<RecipeResponse>> {
        let Some(row) = self.find_row(id).await? else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row], viewer).await?.pop())
    }

    /// Compact representation of one recipe
    pub async fn short(&self, id: i64) -> Result<Option<RecipeShort>> {
        Ok(self.find_row(id).await?.map(|row| self.to_short(&row)))
    }

    pub(crate) fn to_short(&self, row: &RecipeRow) -> RecipeShort {
        RecipeShort {
            id: row.id,
            name: row.name.clone(),
            image: self.media.url(&row.image),
            cooking_time: row.cooking_time,
        }
    }

    /// Insert a recipe with its ingredient and tag links
    pub async fn create(&self, author_id: i64, draft: &RecipeDraft, image: &str) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO recipes (author_id, name, image, text, cooking_time)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(author_id)
        .bind(&draft.name)
        .bind(image)
        .bind(&draft.text)
        .bind(draft.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_links(&mut tx, id, draft).await?;
        tx.commit().await?;

        info!("Created recipe {} for author {}", id, author_id);
        Ok(id)
    }

    /// Replace every field and link; the image only changes when `image` is set
    pub async fn update(&self, id: i64, draft: &RecipeDraft, image: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE recipes
            SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
            WHERE id = $5
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.text)
        .bind(draft.cooking_time)
        .bind(image)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        Self::insert_links(&mut tx, id, draft).await?;
        tx.commit().await?;

        info!("Updated recipe {}", id);
        Ok(())
    }

    async fn insert_links(
        tx: &mut Transaction<'_, Postgres>,
        recipe_id: i64,
        draft: &RecipeDraft,
    ) -> Result<()> {
        if !draft.ingredients.is_empty() {
            let mut builder = QueryBuilder::new(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ",
            );
            builder.push_values(&draft.ingredients, |mut row, &(ingredient_id, amount)| {
                row.push_bind(recipe_id)
                    .push_bind(ingredient_id)
                    .push_bind(amount);
            });
            builder.build().execute(&mut **tx).await?;
        }

        if !draft.tags.is_empty() {
            let mut builder = QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
            builder.push_values(&draft.tags, |mut row, &tag_id| {
                row.push_bind(recipe_id).push_bind(tag_id);
            });
            builder.build().execute(&mut **tx).await?;
        }

        Ok(())
    }

    /// Delete a recipe; links, favorites, cart entries and short codes cascade
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Ingredient totals across every recipe in the user's cart
    pub async fn shopping_list(&self, user_id: i64) -> Result<Vec<ShoppingListItem>> {
        let items = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS amount
            FROM shopping_carts c
            JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            GROUP BY i.id, i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Attach tags, ingredients, authors and viewer flags with one query each
    pub async fn hydrate(
        &self,
        rows: Vec<RecipeRow>,
        viewer: Option<i64>,
    ) -> Result<Vec<RecipeResponse>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let author_ids: Vec<i64> = rows
            .iter()
            .map(|row| row.author_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        let tag_rows = sqlx::query(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.slug
            FROM recipe_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in &tag_rows {
            tags.entry(row.get("recipe_id")).or_default().push(Tag {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
            });
        }

        let mut ingredients: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
        let ingredient_rows = sqlx::query(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in &ingredient_rows {
            ingredients
                .entry(row.get("recipe_id"))
                .or_default()
                .push(RecipeIngredient {
                    id: row.get("id"),
                    name: row.get("name"),
                    measurement_unit: row.get("measurement_unit"),
                    amount: row.get("amount"),
                });
        }

        let author_rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.user_id = $2 AND s.author_id = u.id
                   ) AS is_subscribed
            FROM users u
            WHERE u.id = ANY($1)
            "#,
        )
        .bind(&author_ids)
        .bind(viewer)
        .fetch_all(&self.pool)
        .await?;
        let authors: HashMap<i64, UserResponse> = author_rows
            .iter()
            .map(|row| {
                let author = profile_from_row(row, &self.media);
                (author.id, author)
            })
            .collect();

        let (favorited, in_cart) = match viewer {
            Some(user_id) => (
                self.marked(MarkTable::Favorites, user_id, &ids).await?,
                self.marked(MarkTable::ShoppingCarts, user_id, &ids).await?,
            ),
            None => (HashSet::new(), HashSet::new()),
        };

        rows.into_iter()
            .map(|row| -> Result<RecipeResponse> {
                let author = authors
                    .get(&row.author_id)
                    .cloned()
                    .with_context(|| format!("Author {} of recipe {} is missing", row.author_id, row.id))?;
                Ok(RecipeResponse {
                    id: row.id,
                    tags: tags.remove(&row.id).unwrap_or_default(),
                    author,
                    ingredients: ingredients.remove(&row.id).unwrap_or_default(),
                    is_favorited: favorited.contains(&row.id),
                    is_in_shopping_cart: in_cart.contains(&row.id),
                    image: self.media.url(&row.image),
                    name: row.name,
                    text: row.text,
                    cooking_time: row.cooking_time,
                })
            })
            .collect()
    }

    async fn marked(&self, table: MarkTable, user_id: i64, ids: &[i64]) -> Result<HashSet<i64>> {
        let query = match table {
            MarkTable::Favorites => {
                "SELECT recipe_id FROM favorites WHERE user_id = $1 AND recipe_id = ANY($2)"
            }
            MarkTable::ShoppingCarts => {
                "SELECT recipe_id FROM shopping_carts WHERE user_id = $1 AND recipe_id = ANY($2)"
            }
        };
        let marked: Vec<i64> = sqlx::query_scalar(query)
            .bind(user_id)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(marked.into_iter().collect())
    }
}

#[derive(Clone, Copy)]
enum MarkTable {
    Favorites,
    ShoppingCarts,
}
