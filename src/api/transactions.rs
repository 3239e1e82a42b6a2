//! Borrow transaction endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::transaction::{CreateTransaction, TransactionDetails, TransactionListQuery, TransactionStats},
    AppState,
};

use super::AuthenticatedUser;

/// List transactions the caller takes part in
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions, newest first", body = Vec<TransactionDetails>),
        (status = 400, description = "Unknown transaction type"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<TransactionListQuery>,
) -> AppResult<Json<Vec<TransactionDetails>>> {
    let kind = query.transaction_type()?;
    let transactions = state.services.transactions.list(&actor, kind).await?;
    Ok(Json(transactions))
}

/// Request to borrow a book
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = CreateTransaction,
    responses(
        (status = 201, description = "Borrow requested", body = TransactionDetails),
        (status = 403, description = "Caller owns the book"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is not available")
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Json(request): Json<CreateTransaction>,
) -> AppResult<(StatusCode, Json<TransactionDetails>)> {
    let transaction = state
        .services
        .transactions
        .request_borrow(&actor, request.book_id)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Get a transaction (borrower or lender only)
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Transaction details", body = TransactionDetails),
        (status = 403, description = "Caller is not a participant"),
        (status = 404, description = "Transaction not found")
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    let transaction = state.services.transactions.get(&actor, id).await?;
    Ok(Json(transaction))
}

/// Accept a pending request (lender)
#[utoipa::path(
    post,
    path = "/transactions/{id}/accept",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Request accepted", body = TransactionDetails),
        (status = 403, description = "Caller is not the lender"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction has already been processed")
    )
)]
pub async fn accept(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    Ok(Json(state.services.transactions.accept(&actor, id).await?))
}

/// Reject a pending request (lender)
#[utoipa::path(
    post,
    path = "/transactions/{id}/reject",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Request rejected", body = TransactionDetails),
        (status = 403, description = "Caller is not the lender"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction has already been processed")
    )
)]
pub async fn reject(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    Ok(Json(state.services.transactions.reject(&actor, id).await?))
}

/// Mark the book as handed back (borrower)
#[utoipa::path(
    post,
    path = "/transactions/{id}/mark-returned",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Marked as returned", body = TransactionDetails),
        (status = 403, description = "Caller is not the borrower"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction is not accepted")
    )
)]
pub async fn mark_returned(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    Ok(Json(state.services.transactions.mark_returned(&actor, id).await?))
}

/// Confirm the book is back and charge the fee (lender)
#[utoipa::path(
    post,
    path = "/transactions/{id}/confirm-return",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Return confirmed, fee computed", body = TransactionDetails),
        (status = 403, description = "Caller is not the lender"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction is not marked as returned")
    )
)]
pub async fn confirm_return(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    Ok(Json(state.services.transactions.confirm_return(&actor, id).await?))
}

/// Withdraw a pending request (borrower)
#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Request cancelled", body = TransactionDetails),
        (status = 403, description = "Caller is not the borrower"),
        (status = 404, description = "Transaction not found"),
        (status = 409, description = "Transaction is no longer pending")
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<TransactionDetails>> {
    Ok(Json(state.services.transactions.cancel(&actor, id).await?))
}

/// Transaction counters for the caller
#[utoipa::path(
    get,
    path = "/transactions/stats",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counters", body = TransactionStats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
) -> AppResult<Json<TransactionStats>> {
    let stats = state.services.transactions.stats(&actor).await?;
    Ok(Json(stats))
}
