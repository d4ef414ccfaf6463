//! Application state shared across handlers

use std::sync::Arc;

use common::cache::RedisPool;
use sqlx::PgPool;

use crate::{
    config::ServerConfig,
    image::MediaStore,
    jwt::JwtService,
    rate_limiter::RateLimiter,
    repositories::{
        CollectionRepository, IngredientRepository, RecipeRepository, ShortLinkRepository,
        SubscriptionRepository, TagRepository, UserRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
    pub media: MediaStore,
    pub user_repository: UserRepository,
    pub tag_repository: TagRepository,
    pub ingredient_repository: IngredientRepository,
    pub recipe_repository: RecipeRepository,
    pub collection_repository: CollectionRepository,
    pub subscription_repository: SubscriptionRepository,
    pub short_link_repository: ShortLinkRepository,
}

impl AppState {
    /// Wire repositories around the shared pools
    pub fn new(
        db_pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        rate_limiter: RateLimiter,
        config: ServerConfig,
    ) -> Self {
        let media = MediaStore::new(config.media_root.clone(), &config.public_url);

        Self {
            user_repository: UserRepository::new(db_pool.clone(), media.clone()),
            tag_repository: TagRepository::new(db_pool.clone()),
            ingredient_repository: IngredientRepository::new(db_pool.clone()),
            recipe_repository: RecipeRepository::new(db_pool.clone(), media.clone()),
            collection_repository: CollectionRepository::new(db_pool.clone()),
            subscription_repository: SubscriptionRepository::new(db_pool.clone(), media.clone()),
            short_link_repository: ShortLinkRepository::new(db_pool),
            redis_pool,
            jwt_service,
            rate_limiter,
            config: Arc::new(config),
            media,
        }
    }
}
