//! Repositories for database operations

pub mod catalog;
pub mod collection;
pub mod recipe;
pub mod short_link;
pub mod subscription;
pub mod user;

pub use catalog::{IngredientRepository, TagRepository};
pub use collection::{Collection, CollectionRepository};
pub use recipe::{RecipeFilter, RecipeRepository};
pub use short_link::ShortLinkRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;

/// Ids from `requested` that are absent from `found`, in request order
pub(crate) fn missing_ids(requested: &[i64], found: &[i64]) -> Vec<i64> {
    let found: std::collections::HashSet<i64> = found.iter().copied().collect();
    requested
        .iter()
        .copied()
        .filter(|id| !found.contains(id))
        .collect()
}
