//! Router tests against the in-memory backend

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use borrowedwords_server::{
    api,
    clock::ManualClock,
    config::AppConfig,
    models::user::UserClaims,
    repository::{memory::MemoryStore, Repository},
    services::{notifications::LogNotifier, Services},
    AppState,
};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    lender: String,
    borrower: String,
    stranger: String,
}

async fn spawn_app() -> TestApp {
    let config = AppConfig::default();
    let secret = config.auth.jwt_secret.clone();

    let store = MemoryStore::new();
    let ann = store.insert_user("ann", Some("ann@example.org"), Some("Oxford")).await;
    let ben = store.insert_user("ben", Some("ben@example.org"), None).await;
    let cat = store.insert_user("cat", None, None).await;

    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()));
    let services = Services::new(Repository::in_memory(store), Arc::new(LogNotifier), clock.clone());
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let token = |id: i32, name: &str| UserClaims::new(id, name, 1).create_token(&secret).unwrap();

    TestApp {
        router: api::router(state),
        clock,
        lender: token(ann.id, &ann.username),
        borrower: token(ben.id, &ben.username),
        stranger: token(cat.id, &cat.username),
    }
}

impl TestApp {
    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(format!("/api/v1{}", uri));
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), body).await
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    async fn create_book(&self) -> i64 {
        let (status, body) = self
            .post(
                "/books",
                &self.lender,
                Some(json!({
                    "title": "The Left Hand of Darkness",
                    "author": "Ursula K. Le Guin",
                    "genre": "SCI_FI",
                    "daily_rental_price": "2.00"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }

    async fn request_borrow(&self, book_id: i64) -> i64 {
        let (status, body) = self
            .post("/transactions", &self.borrower, Some(json!({ "book_id": book_id })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["status"], "PENDING");
        body["id"].as_i64().unwrap()
    }

    async fn book_available(&self, book_id: i64) -> bool {
        let (status, body) = self.call(Method::GET, &format!("/books/{}", book_id), None, None).await;
        assert_eq!(status, StatusCode::OK);
        body["is_available"].as_bool().unwrap()
    }
}

#[tokio::test]
async fn test_full_lending_cycle() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;
    let tx_id = app.request_borrow(book_id).await;
    assert!(app.book_available(book_id).await);

    let (status, body) = app.post(&format!("/transactions/{}/accept", tx_id), &app.lender, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACCEPTED");
    assert_eq!(body["due_date"], "2024-06-17");
    assert!(!app.book_available(book_id).await);

    app.clock.advance(Duration::days(3));
    let (status, body) = app
        .post(&format!("/transactions/{}/mark-returned", tx_id), &app.borrower, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "RETURNED");
    assert!(body["final_rental_fee"].is_null());

    let (status, body) = app
        .post(&format!("/transactions/{}/confirm-return", tx_id), &app.lender, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["final_rental_fee"], "6.00");
    assert!(app.book_available(book_id).await);

    let (_, stats) = app.get("/transactions/stats", &app.borrower).await;
    assert_eq!(stats["completed_as_borrower"], 1);
    assert_eq!(stats["active_as_borrower"], 0);
    let (_, stats) = app.get("/transactions/stats", &app.lender).await;
    assert_eq!(stats["completed_as_lender"], 1);
}

#[tokio::test]
async fn test_reject_then_mark_returned_conflicts() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;
    let tx_id = app.request_borrow(book_id).await;

    let (status, body) = app.post(&format!("/transactions/{}/reject", tx_id), &app.lender, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "REJECTED");
    assert!(app.book_available(book_id).await);

    let (status, _) = app
        .post(&format!("/transactions/{}/mark-returned", tx_id), &app.borrower, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(app.book_available(book_id).await);
}

#[tokio::test]
async fn test_cancel_then_accept_conflicts() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;
    let tx_id = app.request_borrow(book_id).await;

    let (status, body) = app.post(&format!("/transactions/{}/cancel", tx_id), &app.borrower, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = app.post(&format!("/transactions/{}/accept", tx_id), &app.lender, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("already been processed"));
}

#[tokio::test]
async fn test_role_and_access_checks() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;

    let (status, _) = app
        .post("/transactions", &app.lender, Some(json!({ "book_id": book_id })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let tx_id = app.request_borrow(book_id).await;

    let (status, _) = app.post(&format!("/transactions/{}/accept", tx_id), &app.borrower, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&format!("/transactions/{}", tx_id), &app.stranger).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/transactions/999", &app.lender).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::GET, "/transactions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_by_type() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;
    let tx_id = app.request_borrow(book_id).await;

    let (status, body) = app.get("/transactions?type=incoming", &app.lender).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], tx_id);

    let (_, body) = app.get("/transactions?type=outgoing", &app.lender).await;
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = app.get("/transactions", &app.borrower).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/transactions?type=sideways", &app.lender).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_listing_and_updates() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;

    let (status, body) = app.call(Method::GET, "/books?genre=SCI_FI", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["location"], "Oxford");

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/books/{}", book_id),
            Some(app.borrower.as_str()),
            Some(json!({ "daily_rental_price": "1.00" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post("/books", &app.lender, Some(json!({ "title": "", "author": "Nobody" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, mine) = app.get("/books/mine", &app.lender).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, mine) = app.get("/books/mine", &app.borrower).await;
    assert!(mine.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let app = spawn_app().await;
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_second_request_cannot_be_accepted_while_lent() {
    let app = spawn_app().await;
    let book_id = app.create_book().await;
    let first = app.request_borrow(book_id).await;
    let (status, second) = app
        .post("/transactions", &app.stranger, Some(json!({ "book_id": book_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.post(&format!("/transactions/{}/accept", first), &app.lender, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(&format!("/transactions/{}/accept", second["id"]), &app.lender, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!app.book_available(book_id).await);
}
