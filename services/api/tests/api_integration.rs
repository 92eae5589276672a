//! End-to-end tests against a live PostgreSQL instance.
//!
//! These tests require the `DATABASE_URL` environment variable to point at
//! a reachable database; each test skips itself when it is not set. The
//! router is served on an ephemeral local port and driven over HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use api::jwt::{JwtConfig, JwtService};
use api::models::{NewUser, User};
use api::password::PasswordContext;
use api::repositories::{DealRepository, UserRepository};
use api::routes;
use api::state::AppState;

const TEST_JWT_SECRET: &str = "integration-test-secret";

static EMAIL_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL not set, skipping integration test");
            return None;
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to test database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to apply migrations");

    Some(pool)
}

fn test_jwt_service() -> JwtService {
    JwtService::new(JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry: 900,
    })
}

async fn spawn_server(pool: PgPool) -> SocketAddr {
    let state = AppState {
        db_pool: pool.clone(),
        user_repository: UserRepository::new(pool.clone()),
        deal_repository: DealRepository::new(pool),
        jwt_service: test_jwt_service(),
        password_context: PasswordContext::new(),
    };

    let app = routes::create_router(state, Duration::from_secs(30));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });

    addr
}

fn unique_email(prefix: &str) -> String {
    let counter = EMAIL_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .subsec_nanos();
    format!("{}-{}-{}-{}@example.com", prefix, std::process::id(), nanos, counter)
}

async fn seed_user(pool: &PgPool, email: &str, password: &str, is_superuser: bool) -> User {
    let repo = UserRepository::new(pool.clone());
    let hashed = PasswordContext::new().hash(password).expect("hash failed");
    let new_user = NewUser {
        name: "Test".to_string(),
        surname: "User".to_string(),
        patronymic: None,
        email: email.to_string(),
        avatar_filename: None,
        is_verified: false,
        is_superuser,
        password: password.to_string(),
    };
    repo.create(&new_user, &hashed).await.expect("seed failed")
}

fn token_for(user: &User) -> String {
    test_jwt_service()
        .generate_access_token(user)
        .expect("token generation failed")
}

#[tokio::test]
async fn test_health_and_authentication_boundary() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // Protected routes refuse missing and malformed tokens
    let resp = client
        .get(format!("http://{addr}/users/me"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(format!("http://{addr}/users/me"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_issues_usable_token() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let email = unique_email("login");
    seed_user(&pool, &email, "pw", false).await;

    let resp = client
        .post(format!("http://{addr}/auth/token"))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("http://{addr}/auth/token"))
        .json(&json!({ "email": email, "password": "pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["token_type"], "Bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("http://{addr}/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["email"], email);

    // The projection never carries credential or privilege fields
    assert!(me.get("hashed_password").is_none());
    assert!(me.get("password").is_none());
    assert!(me.get("is_superuser").is_none());
}

#[tokio::test]
async fn test_user_administration_requires_superuser() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let member = seed_user(&pool, &unique_email("member"), "pw", false).await;
    let admin = seed_user(&pool, &unique_email("admin"), "pw", true).await;

    let resp = client
        .get(format!("http://{addr}/users"))
        .bearer_auth(token_for(&member))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Not enough privileges to perform requested action"
    );

    let resp = client
        .get(format!("http://{addr}/users"))
        .bearer_auth(token_for(&admin))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: Vec<Value> = resp.json().await.unwrap();
    let emails: Vec<&str> = listed
        .iter()
        .filter_map(|user| user["email"].as_str())
        .collect();
    assert!(emails.contains(&member.email.as_str()));
    assert!(emails.contains(&admin.email.as_str()));
    for user in &listed {
        assert!(user.get("hashed_password").is_none());
    }

    // Administrative create, regular caller first
    let draft = json!({
        "name": "New",
        "surname": "Hire",
        "email": unique_email("hire"),
        "password": "pw"
    });
    let resp = client
        .post(format!("http://{addr}/users/me"))
        .bearer_auth(token_for(&member))
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .post(format!("http://{addr}/users/me"))
        .bearer_auth(token_for(&admin))
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["is_verified"], false);

    // Duplicate email is a conflict
    let resp = client
        .post(format!("http://{addr}/users/me"))
        .bearer_auth(token_for(&admin))
        .json(&draft)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn test_deal_lifecycle() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let alice = seed_user(&pool, &unique_email("alice"), "pw", false).await;
    let bob = seed_user(&pool, &unique_email("bob"), "pw", false).await;
    let alice_token = token_for(&alice);
    let bob_token = token_for(&bob);

    // Create: caller becomes creator, status defaults, creator is enrolled
    let resp = client
        .post(format!("http://{addr}/deals/"))
        .bearer_auth(&alice_token)
        .json(&json!({ "title": "T" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deal: Value = resp.json().await.unwrap();
    let deal_id = deal["id"].as_i64().unwrap();
    assert_eq!(deal["title"], "T");
    assert_eq!(deal["status"], "active");
    assert_eq!(deal["creator_id"].as_i64().unwrap(), alice.id);
    let participant_ids: Vec<i64> = deal["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_i64().unwrap())
        .collect();
    assert_eq!(participant_ids, vec![alice.id]);

    // Read allowed for the creator, denied for an outsider
    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // Participant listing mirrors the read predicate
    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}/users"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let users: Vec<Value> = resp.json().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["id"].as_i64().unwrap(), alice.id);

    // Update one field, the rest stay put
    let resp = client
        .put(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .json(&json!({ "status": "successful" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["status"], "successful");
    assert_eq!(updated["title"], "T");
    assert_eq!(updated["created_at"], deal["created_at"]);

    // Delete requires the creator
    let resp = client
        .delete(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .delete(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deleted: Value = resp.json().await.unwrap();
    assert_eq!(deleted["title"], "T");

    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Deal not found");
}

#[tokio::test]
async fn test_membership_gates_update_but_not_delete() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let alice = seed_user(&pool, &unique_email("alice"), "pw", false).await;
    let carol = seed_user(&pool, &unique_email("carol"), "pw", false).await;
    let alice_token = token_for(&alice);
    let carol_token = token_for(&carol);

    let resp = client
        .post(format!("http://{addr}/deals/"))
        .bearer_auth(&alice_token)
        .json(&json!({ "title": "Joint venture" }))
        .send()
        .await
        .unwrap();
    let deal: Value = resp.json().await.unwrap();
    let deal_id = deal["id"].as_i64().unwrap();

    // Enroll carol by replacing the participant set
    let resp = client
        .put(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .json(&json!({ "users": [alice.id, carol.id] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    let mut participant_ids: Vec<i64> = updated["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_i64().unwrap())
        .collect();
    participant_ids.sort_unstable();
    let mut expected = vec![alice.id, carol.id];
    expected.sort_unstable();
    assert_eq!(participant_ids, expected);

    // A participant may read and update
    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .put(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&carol_token)
        .json(&json!({ "description": "Carol was here" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // But never delete
    let resp = client
        .delete(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&carol_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .delete(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // The deleted projection reports the membership the deal had, even
    // though the cascade removes those rows with the deal
    let deleted: Value = resp.json().await.unwrap();
    let mut deleted_ids: Vec<i64> = deleted["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_i64().unwrap())
        .collect();
    deleted_ids.sort_unstable();
    assert_eq!(deleted_ids, expected);
}

#[tokio::test]
async fn test_deal_checks_run_in_order() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let alice = seed_user(&pool, &unique_email("alice"), "pw", false).await;
    let ghost = seed_user(&pool, &unique_email("ghost"), "pw", false).await;
    let alice_token = token_for(&alice);
    let ghost_token = token_for(&ghost);

    let resp = client
        .post(format!("http://{addr}/deals/"))
        .bearer_auth(&alice_token)
        .json(&json!({ "title": "Ordered" }))
        .send()
        .await
        .unwrap();
    let deal: Value = resp.json().await.unwrap();
    let deal_id = deal["id"].as_i64().unwrap();

    // Missing deal reports first, even for a caller that exists
    let resp = client
        .get(format!("http://{addr}/deals/999999999"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Deal not found");

    // A token for a deleted user fails the caller lookup, not the predicate
    UserRepository::new(pool.clone())
        .delete(ghost.id)
        .await
        .expect("delete failed")
        .expect("ghost user missing");

    let resp = client
        .get(format!("http://{addr}/deals/{deal_id}"))
        .bearer_auth(&ghost_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_partial_user_update_keeps_unset_fields() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let user = seed_user(&pool, &unique_email("patch"), "pw", false).await;
    let token = token_for(&user);

    let resp = client
        .put(format!("http://{addr}/users/me"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Renamed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["name"], "Renamed");
    assert_eq!(updated["surname"], "User");
    assert_eq!(updated["email"], user.email);

    // An empty patch is an identity operation
    let before: Value = client
        .get(format!("http://{addr}/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .put(format!("http://{addr}/users/me"))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let after: Value = resp.json().await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_get_or_create_by_email_is_idempotent() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let repo = UserRepository::new(pool.clone());

    let email = unique_email("bootstrap");
    let first = repo.get_or_create_by_email(&email).await.unwrap();
    let second = repo.get_or_create_by_email(&email).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.email, email);

    // The bootstrap record carries only the email
    assert_eq!(first.name, "");
    assert_eq!(first.surname, "");
    assert!(!first.is_verified);
    assert!(!first.is_superuser);
    assert_eq!(first.hashed_password, "");

    // A record without a credential cannot log in
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/auth/token"))
        .json(&json!({ "email": email, "password": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_own_deals_listing_is_scoped_to_caller() {
    let pool = match test_pool().await {
        Some(pool) => pool,
        None => return,
    };
    let addr = spawn_server(pool.clone()).await;
    let client = reqwest::Client::new();

    let alice = seed_user(&pool, &unique_email("alice"), "pw", false).await;
    let bob = seed_user(&pool, &unique_email("bob"), "pw", false).await;
    let alice_token = token_for(&alice);
    let bob_token = token_for(&bob);

    for title in ["First", "Second"] {
        let resp = client
            .post(format!("http://{addr}/deals/"))
            .bearer_auth(&alice_token)
            .json(&json!({ "title": title }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = client
        .get(format!("http://{addr}/users/me/deals"))
        .bearer_auth(&alice_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deals: Vec<Value> = resp.json().await.unwrap();
    let titles: Vec<&str> = deals
        .iter()
        .filter_map(|deal| deal["title"].as_str())
        .collect();
    assert!(titles.contains(&"First"));
    assert!(titles.contains(&"Second"));
    for deal in &deals {
        let ids: Vec<i64> = deal["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["id"].as_i64().unwrap())
            .collect();
        assert!(ids.contains(&alice.id));
    }

    let resp = client
        .get(format!("http://{addr}/users/me/deals"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let deals: Vec<Value> = resp.json().await.unwrap();
    assert!(deals.is_empty());
}
