//! End-to-end flows against a live PostgreSQL and Redis
//!
//! Run with `cargo test -p foodgram-api -- --ignored` after exporting
//! `DATABASE_URL` and `REDIS_URL`.

use anyhow::Result;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode, header},
};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, init_pool, run_migrations},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use foodgram_api::{
    AppState, MIGRATOR,
    config::ServerConfig,
    create_router,
    image::MediaStore,
    jwt::{JwtConfig, JwtService},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{IngredientRepository, RecipeRepository, TagRepository},
    validation::RecipeDraft,
};

const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

struct TestApp {
    router: Router,
    pool: PgPool,
}

impl TestApp {
    async fn new() -> Result<Self> {
        let pool = init_pool(&DatabaseConfig::from_env()?).await?;
        run_migrations(&pool, &MIGRATOR).await?;
        let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
        let jwt_service = JwtService::new(JwtConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            access_token_expiry: 600,
        });
        let config = ServerConfig {
            media_root: std::env::temp_dir().join(format!("foodgram-it-{}", Uuid::new_v4())),
            ..ServerConfig::default()
        };

        let router = create_router(AppState::new(
            pool.clone(),
            redis_pool,
            jwt_service,
            RateLimiter::new(RateLimiterConfig::default()),
            config,
        ));

        Ok(Self { router, pool })
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Bytes) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes)
    }

    /// Send a raw body that need not be valid JSON
    async fn call_text(&self, method: &str, uri: &str, token: &str, body: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Token {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    async fn json(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = self.call(method, uri, token, body).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Register and log in a fresh user, returning `(id, token)`
    async fn user(&self) -> (i64, String) {
        let suffix = Uuid::new_v4().simple().to_string();
        let email = format!("cook-{}@example.com", suffix);
        let (status, created) = self
            .json(
                "POST",
                "/api/users/",
                None,
                Some(json!({
                    "email": email,
                    "username": format!("cook_{}", &suffix[..12]),
                    "first_name": "Test",
                    "last_name": "Cook",
                    "password": "s3cret-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", created);

        let (status, login) = self
            .json(
                "POST",
                "/api/auth/token/login/",
                None,
                Some(json!({ "email": email, "password": "s3cret-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", login);

        (
            created["id"].as_i64().unwrap(),
            login["auth_token"].as_str().unwrap().to_string(),
        )
    }

    /// Fresh tag and ingredients, returning `(tag_id, ingredient_ids, ingredient_name)`
    async fn catalog(&self) -> (i64, Vec<i64>, String) {
        let suffix = &Uuid::new_v4().simple().to_string()[..10];
        let slug = format!("tag-{}", suffix);
        TagRepository::new(self.pool.clone())
            .insert_many(&[(format!("Tag {}", suffix), slug.clone())])
            .await
            .unwrap();
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE slug = $1")
            .bind(&slug)
            .fetch_one(&self.pool)
            .await
            .unwrap();

        let name = format!("flour-{}", suffix);
        let rows = vec![
            (name.clone(), "g".to_string()),
            (format!("eggs-{}", suffix), "pcs".to_string()),
        ];
        IngredientRepository::new(self.pool.clone())
            .insert_many(&rows)
            .await
            .unwrap();
        let ingredient_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM ingredients WHERE name LIKE $1 ORDER BY name DESC",
        )
        .bind(format!("%-{}", suffix))
        .fetch_all(&self.pool)
        .await
        .unwrap();

        (tag_id, ingredient_ids, name)
    }

    async fn recipe(&self, token: &str, tag: i64, ingredients: Value) -> i64 {
        let (status, recipe) = self
            .json(
                "POST",
                "/api/recipes/",
                Some(token),
                Some(json!({
                    "ingredients": ingredients,
                    "tags": [tag],
                    "image": PIXEL,
                    "name": "Pancakes",
                    "text": "Mix and fry.",
                    "cooking_time": 15,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", recipe);
        recipe["id"].as_i64().unwrap()
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_logout_revokes_token() -> Result<()> {
    let app = TestApp::new().await?;
    let (id, token) = app.user().await;

    let (status, me) = app.json("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id);
    assert_eq!(me["is_subscribed"], false);

    let (status, _) = app
        .call("POST", "/api/auth/token/logout/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_bad_credentials() -> Result<()> {
    let app = TestApp::new().await?;
    let (status, body) = app
        .json(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "whatever-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["non_field_errors"].is_array());
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_recipe_validation() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;

    let (status, body) = app
        .json(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(json!({
                "ingredients": [],
                "tags": [],
                "image": PIXEL,
                "name": "Nothing",
                "text": "Empty",
                "cooking_time": 1,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ingredients"].is_array());
    assert!(body["tags"].is_array());

    let (status, body) = app
        .json(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(json!({
                "ingredients": [
                    { "id": ingredients[0], "amount": 1 },
                    { "id": ingredients[0], "amount": 2 },
                ],
                "tags": [tag],
                "image": PIXEL,
                "name": "Twice",
                "text": "Duplicate",
                "cooking_time": 1,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ingredients"][0], "Ingredients must not repeat.");

    let (status, body) = app
        .json(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(json!({
                "ingredients": [{ "id": i64::MAX, "amount": 1 }],
                "tags": [tag],
                "image": PIXEL,
                "name": "Ghost",
                "text": "Unknown ingredient",
                "cooking_time": 1,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["ingredients"].is_array());
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_favorite_twice_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    let recipe = app
        .recipe(&token, tag, json!([{ "id": ingredients[0], "amount": 5 }]))
        .await;
    let uri = format!("/api/recipes/{}/favorite/", recipe);

    let (status, body) = app.json("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], recipe);

    let (status, body) = app.json("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].is_array());

    let (status, recipe_body) = app
        .json("GET", &format!("/api/recipes/{}/", recipe), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recipe_body["is_favorited"], true);

    let (status, _) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_shopping_cart_sums_shared_ingredients() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user().await;
    let (tag, ingredients, flour) = app.catalog().await;

    let first = app
        .recipe(
            &token,
            tag,
            json!([
                { "id": ingredients[0], "amount": 100 },
                { "id": ingredients[1], "amount": 2 },
            ]),
        )
        .await;
    let second = app
        .recipe(&token, tag, json!([{ "id": ingredients[0], "amount": 250 }]))
        .await;

    for recipe in [first, second] {
        let (status, _) = app
            .call(
                "POST",
                &format!("/api/recipes/{}/shopping_cart/", recipe),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, bytes) = app
        .call("GET", "/api/recipes/download_shopping_cart/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes.to_vec())?;
    assert!(text.starts_with("Foodgram shopping list:\n"));
    assert!(text.contains(&format!("{}, 350 g\n", flour)), "{}", text);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_subscriptions() -> Result<()> {
    let app = TestApp::new().await?;
    let (me, token) = app.user().await;
    let (author, author_token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    app.recipe(&author_token, tag, json!([{ "id": ingredients[0], "amount": 1 }]))
        .await;
    app.recipe(&author_token, tag, json!([{ "id": ingredients[1], "amount": 1 }]))
        .await;

    let (status, _) = app
        .call("POST", &format!("/api/users/{}/subscribe/", me), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/users/{}/subscribe/?recipes_limit=1", author);
    let (status, body) = app.json("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 2);
    assert_eq!(body["recipes"].as_array().map(Vec::len), Some(1));

    let (status, _) = app.call("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = app
        .json("GET", "/api/users/subscriptions/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["id"], author);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_only_author_can_modify_recipe() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, author_token) = app.user().await;
    let (_, other_token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    let recipe = app
        .recipe(&author_token, tag, json!([{ "id": ingredients[0], "amount": 3 }]))
        .await;
    let uri = format!("/api/recipes/{}/", recipe);

    let update = json!({
        "ingredients": [{ "id": ingredients[1], "amount": 4 }],
        "tags": [tag],
        "name": "Renamed",
        "text": "Changed",
        "cooking_time": 20,
    });

    let (status, _) = app
        .call("PATCH", &uri, Some(&other_token), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json("PATCH", &uri, Some(&author_token), Some(update))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["ingredients"][0]["id"], ingredients[1]);
    assert_eq!(body["ingredients"][0]["amount"], 4);

    let (status, _) = app.call("DELETE", &uri, Some(&author_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_short_link_redirects() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    let recipe = app
        .recipe(&token, tag, json!([{ "id": ingredients[0], "amount": 1 }]))
        .await;

    let uri = format!("/api/recipes/{}/get-link/", recipe);
    let (status, first) = app.json("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = app.json("GET", &uri, None, None).await;
    assert_eq!(first, second);

    let link = first["short-link"].as_str().unwrap();
    let path = link.trim_start_matches("http://localhost:8000");
    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("http://localhost:8000/recipes/{}/", recipe).as_str()
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_anonymous_favorites_filter_is_empty() -> Result<()> {
    let app = TestApp::new().await?;
    let (status, page) = app
        .json("GET", "/api/recipes/?is_favorited=1", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 0);
    assert_eq!(page["next"], Value::Null);
    assert_eq!(page["previous"], Value::Null);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_update_checks_ownership_before_body() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, author_token) = app.user().await;
    let (_, other_token) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    let recipe = app
        .recipe(&author_token, tag, json!([{ "id": ingredients[0], "amount": 3 }]))
        .await;
    let uri = format!("/api/recipes/{}/", recipe);

    let status = app.call_text("PATCH", &uri, &other_token, "{not json").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status = app
        .call_text("PATCH", "/api/recipes/9223372036854775807/", &other_token, "{not json")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let status = app.call_text("PATCH", &uri, &author_token, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_failed_create_leaves_no_recipe() -> Result<()> {
    let app = TestApp::new().await?;
    let (author, _) = app.user().await;
    let (tag, ingredients, _) = app.catalog().await;
    let repository = RecipeRepository::new(
        app.pool.clone(),
        MediaStore::new(std::env::temp_dir(), "http://localhost:8000"),
    );

    let draft = RecipeDraft {
        name: "Half written".to_string(),
        text: "Should roll back".to_string(),
        cooking_time: 5,
        ingredients: vec![(ingredients[0], 1), (i64::MAX, 1)],
        tags: vec![tag],
        image: None,
    };
    assert!(repository.create(author, &draft, "recipes/images/none.png").await.is_err());

    let draft = RecipeDraft {
        ingredients: vec![(ingredients[0], 1)],
        tags: vec![tag, i64::MAX],
        ..draft
    };
    assert!(repository.create(author, &draft, "recipes/images/none.png").await.is_err());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author)
        .fetch_one(&app.pool)
        .await?;
    assert_eq!(count, 0);

    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recipe_ingredients WHERE ingredient_id = $1",
    )
    .bind(ingredients[0])
    .fetch_one(&app.pool)
    .await?;
    assert_eq!(orphans, 0);
    Ok(())
}
