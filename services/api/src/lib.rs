//! Foodgram API service
//!
//! Recipe sharing backend: users publish recipes, follow authors, keep
//! favorites and a shopping cart, and export aggregated shopping lists.

pub mod config;
pub mod error;
pub mod image;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod shopping_list;
pub mod short_link;
pub mod state;
pub mod validation;

use sqlx::migrate::Migrator;

pub use routes::create_router;
pub use state::AppState;

/// Embedded schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
