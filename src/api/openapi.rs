//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, transactions};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BorrowedWords API",
        version = "1.0.0",
        description = "Peer-to-peer book lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::list_my_books,
        books::get_book,
        books::create_book,
        books::update_book,
        // Transactions
        transactions::list_transactions,
        transactions::create_transaction,
        transactions::get_transaction,
        transactions::accept,
        transactions::reject,
        transactions::mark_returned,
        transactions::confirm_return,
        transactions::cancel,
        transactions::get_stats,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::enums::Genre,
            crate::models::enums::BookCondition,
            // Transactions
            crate::models::transaction::CreateTransaction,
            crate::models::transaction::TransactionDetails,
            crate::models::transaction::TransactionStats,
            crate::models::enums::TransactionStatus,
            crate::models::user::UserShort,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book listings"),
        (name = "transactions", description = "Borrow requests and returns")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
