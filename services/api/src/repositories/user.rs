//! User repository for database operations

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use common::error::DatabaseError;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use crate::{
    image::MediaStore,
    models::{NewUser, UserResponse, UserRow},
    pagination::PageParams,
};

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored hash
pub fn verify_password(password_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Map a row carrying the profile columns plus `is_subscribed`
pub(crate) fn profile_from_row(row: &PgRow, media: &MediaStore) -> UserResponse {
    let avatar: Option<String> = row.get("avatar");
    UserResponse {
        email: row.get("email"),
        id: row.get("id"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_subscribed: row.get("is_subscribed"),
        avatar: avatar.map(|path| media.url(&path)),
    }
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
    media: MediaStore,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool, media: MediaStore) -> Self {
        Self { pool, media }
    }

    /// Which of `email` / `username` are already registered
    pub async fn taken(&self, email: &str, username: &str) -> Result<(bool, bool)> {
        let row = sqlx::query(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE email = $1) AS email_taken,
                EXISTS (SELECT 1 FROM users WHERE username = $2) AS username_taken
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.get("email_taken"), row.get("username_taken")))
    }

    /// Create a new user; `None` when the e-mail or username is taken
    pub async fn create(&self, new_user: &NewUser) -> Result<Option<UserRow>> {
        info!("Creating new user: {}", new_user.username);

        let password_hash = hash_password(&new_user.password)?;

        let result = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, username, first_name, last_name, password_hash, avatar
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                let e = DatabaseError::from(e);
                if e.is_unique_violation() {
                    Ok(None)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Find a user by e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, username, first_name, last_name, password_hash, avatar
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, username, first_name, last_name, password_hash, avatar
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Public profile of `id` as seen by `viewer`
    pub async fn profile(&self, id: i64, viewer: Option<i64>) -> Result<Option<UserResponse>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.user_id = $2 AND s.author_id = u.id
                   ) AS is_subscribed
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .bind(viewer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| profile_from_row(&row, &self.media)))
    }

    /// Page of all users, oldest account first
    pub async fn list(
        &self,
        viewer: Option<i64>,
        params: PageParams,
    ) -> Result<(Vec<UserResponse>, i64)> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
                   EXISTS (
                       SELECT 1 FROM subscriptions s
                       WHERE s.user_id = $1 AND s.author_id = u.id
                   ) AS is_subscribed
            FROM users u
            ORDER BY u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(viewer)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let users = rows
            .iter()
            .map(|row| profile_from_row(row, &self.media))
            .collect();

        Ok((users, count))
    }

    /// Replace the password hash
    pub async fn set_password(&self, id: i64, password: &str) -> Result<()> {
        let password_hash = hash_password(password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(&password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set or clear the avatar path, returning the previous one
    pub async fn set_avatar(&self, id: i64, avatar: Option<&str>) -> Result<Option<String>> {
        let previous: Option<Option<String>> = sqlx::query_scalar(
            r#"
            UPDATE users u
            SET avatar = $1, updated_at = NOW()
            FROM (SELECT avatar FROM users WHERE id = $2) old
            WHERE u.id = $2
            RETURNING old.avatar
            "#,
        )
        .bind(avatar)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(previous.flatten())
    }

    /// Public URL of a stored avatar
    pub fn avatar_url(&self, path: &str) -> String {
        self.media.url(path)
    }
}
