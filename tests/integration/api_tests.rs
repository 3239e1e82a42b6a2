//! API integration tests against a running server
//!
//! Expects two existing users with ids `LENDER_ID` and `BORROWER_ID`
//! (defaults 1 and 2) and the server's `JWT_SECRET`.

use borrowedwords_server::models::user::UserClaims;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn token_for(env_key: &str, default_id: i32) -> String {
    let user_id = std::env::var(env_key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_id);
    let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    UserClaims::new(user_id, &format!("user{}", user_id), 1)
        .create_token(&secret)
        .expect("Failed to create token")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_unauthenticated_request_rejected() {
    let client = Client::new();

    let response = client
        .get(format!("{}/transactions", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn test_borrow_and_reject() {
    let client = Client::new();
    let lender = token_for("LENDER_ID", 1);
    let borrower = token_for("BORROWER_ID", 2);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&lender)
        .json(&json!({
            "title": "Integration Test Book",
            "author": "Test Author",
            "daily_rental_price": "1.50"
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), StatusCode::CREATED);
    let book: Value = response.json().await.expect("Failed to parse book");

    let response = client
        .post(format!("{}/transactions", BASE_URL))
        .bearer_auth(&borrower)
        .json(&json!({ "book_id": book["id"] }))
        .send()
        .await
        .expect("Failed to request borrow");
    assert_eq!(response.status(), StatusCode::CREATED);
    let transaction: Value = response.json().await.expect("Failed to parse transaction");
    assert_eq!(transaction["status"], "PENDING");

    let response = client
        .post(format!("{}/transactions/{}/reject", BASE_URL, transaction["id"]))
        .bearer_auth(&lender)
        .send()
        .await
        .expect("Failed to reject");
    assert!(response.status().is_success());
    let transaction: Value = response.json().await.expect("Failed to parse transaction");
    assert_eq!(transaction["status"], "REJECTED");
}

#[tokio::test]
#[ignore]
async fn test_invalid_transaction_type() {
    let client = Client::new();

    let response = client
        .get(format!("{}/transactions?type=everything", BASE_URL))
        .bearer_auth(token_for("LENDER_ID", 1))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore]
async fn test_unknown_user_gets_not_found() {
    let client = Client::new();
    let lender = token_for("LENDER_ID", 1);
    let ghost = token_for("UNKNOWN_USER_ID", 987_654);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&ghost)
        .json(&json!({ "title": "Nobody's Book", "author": "Nobody", "location": "Nowhere" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&lender)
        .json(&json!({ "title": "Lent Book", "author": "Someone" }))
        .send()
        .await
        .expect("Failed to create book");
    let book: Value = response.json().await.expect("Failed to parse book");

    let response = client
        .post(format!("{}/transactions", BASE_URL))
        .bearer_auth(&ghost)
        .json(&json!({ "book_id": book["id"] }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
