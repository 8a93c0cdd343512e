//! Shared helpers for HTTP-level integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use taleforge_api::auth::jwt::{generate_access_token, JwtConfig};
use taleforge_api::config::ServerConfig;
use taleforge_api::router::build_app_router;
use taleforge_api::state::AppState;
use taleforge_core::roles::{ROLE_ADMIN, ROLE_READER};
use taleforge_core::types::DbId;
use taleforge_db::models::user::{CreateUser, User};
use taleforge_db::repositories::UserRepo;
use taleforge_events::{EventBus, PlatformEvent};
use tokio::sync::broadcast;
use tower::ServiceExt;

const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with development defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        chapter_unlock_coins: 100,
        free_chapters: 2,
        ledger_reconcile_interval_secs: 3600,
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with_events(pool).0
}

/// Like [`build_test_app`], plus a receiver for everything the app publishes.
pub fn build_test_app_with_events(pool: PgPool) -> (Router, broadcast::Receiver<PlatformEvent>) {
    let config = test_config();
    let pricing = config.chapter_pricing().expect("test pricing is valid");
    let event_bus = Arc::new(EventBus::default());
    let receiver = event_bus.subscribe();

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        event_bus,
        pricing: Arc::new(pricing),
    };
    (build_app_router(state, &config), receiver)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

pub fn token(user_id: DbId, role: &str, plan: &str) -> String {
    generate_access_token(user_id, role, plan, &test_config().jwt).expect("token generation")
}

pub fn reader_token(user: &User) -> String {
    token(user.id, ROLE_READER, &user.plan)
}

pub fn admin_token(user: &User) -> String {
    token(user.id, ROLE_ADMIN, &user.plan)
}

pub async fn new_user(pool: &PgPool, username: &str, plan: &str) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            username: username.to_string(),
            plan: Some(plan.to_string()),
        },
    )
    .await
    .expect("user creation should succeed")
}

// ---------------------------------------------------------------------------
// Story graph
// ---------------------------------------------------------------------------

/// start(1) -adventure-> adventure(2) -mystery-> chapter3(3) -horror-> chapter4(4) -comedy-> chapter5(5),
/// plus start(1) -romance-> romance(2), a dead end.
pub struct StoryFixture {
    pub story_id: DbId,
    pub start: DbId,
    pub adventure: DbId,
    pub romance: DbId,
    pub chapter3: DbId,
    pub chapter4: DbId,
    pub chapter5: DbId,
}

async fn insert_node(pool: &PgPool, version_id: DbId, step_no: i32, is_start: bool, title: &str) -> DbId {
    let (id,): (DbId,) = sqlx::query_as(
        "INSERT INTO story_nodes (version_id, step_no, is_start, title, content)
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(version_id)
    .bind(step_no)
    .bind(is_start)
    .bind(title)
    .bind(format!("{title} content"))
    .fetch_one(pool)
    .await
    .expect("node insert should succeed");
    id
}

async fn insert_choice(pool: &PgPool, from: DbId, to: DbId, genre_key: &str) {
    sqlx::query(
        "INSERT INTO story_choices (from_node_id, to_node_id, genre_key, label)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(from)
    .bind(to)
    .bind(genre_key)
    .bind(format!("Go {genre_key}"))
    .execute(pool)
    .await
    .expect("choice insert should succeed");
}

pub async fn seed_story(pool: &PgPool, title: &str) -> StoryFixture {
    let (story_id,): (DbId,) = sqlx::query_as("INSERT INTO stories (title) VALUES ($1) RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("story insert should succeed");
    let (version_id,): (DbId,) = sqlx::query_as(
        "INSERT INTO story_versions (story_id, version_number) VALUES ($1, 1) RETURNING id",
    )
    .bind(story_id)
    .fetch_one(pool)
    .await
    .expect("version insert should succeed");
    sqlx::query("UPDATE stories SET published_version_id = $2 WHERE id = $1")
        .bind(story_id)
        .bind(version_id)
        .execute(pool)
        .await
        .expect("publish should succeed");

    let start = insert_node(pool, version_id, 1, true, "Opening").await;
    let adventure = insert_node(pool, version_id, 2, false, "Into the Wilds").await;
    let romance = insert_node(pool, version_id, 2, false, "A Chance Meeting").await;
    let chapter3 = insert_node(pool, version_id, 3, false, "The Locked Door").await;
    let chapter4 = insert_node(pool, version_id, 4, false, "Whispers").await;
    let chapter5 = insert_node(pool, version_id, 5, false, "Finale").await;

    insert_choice(pool, start, adventure, "adventure").await;
    insert_choice(pool, start, romance, "romance").await;
    insert_choice(pool, adventure, chapter3, "mystery").await;
    insert_choice(pool, chapter3, chapter4, "horror").await;
    insert_choice(pool, chapter4, chapter5, "comedy").await;

    StoryFixture {
        story_id,
        start,
        adventure,
        romance,
        chapter3,
        chapter4,
        chapter5,
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_anonymous(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, token: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_empty(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
