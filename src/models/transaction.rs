//! Borrow transaction model and related types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookShort;
use super::enums::TransactionStatus;
use super::user::UserShort;
use crate::error::{AppError, AppResult};

/// Borrow transaction from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BorrowTransaction {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    /// Owner of the book when the request was made
    pub lender_id: i32,
    pub status: TransactionStatus,
    pub request_date: DateTime<Utc>,
    pub accept_date: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub return_date: Option<DateTime<Utc>>,
    pub final_rental_fee: Option<Decimal>,
}

impl BorrowTransaction {
    pub fn is_participant(&self, actor_id: i32) -> bool {
        self.borrower_id == actor_id || self.lender_id == actor_id
    }

    /// Overdue when the book is still out past its due date
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => self.status.can_be_overdue() && today > due,
            None => false,
        }
    }
}

/// A transaction about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub book_id: i32,
    pub borrower_id: i32,
    pub lender_id: i32,
    pub request_date: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_transaction(self, id: i32) -> BorrowTransaction {
        BorrowTransaction {
            id,
            book_id: self.book_id,
            borrower_id: self.borrower_id,
            lender_id: self.lender_id,
            status: TransactionStatus::Pending,
            request_date: self.request_date,
            accept_date: None,
            due_date: None,
            return_date: None,
            final_rental_fee: None,
        }
    }
}

/// A transaction with the book and both parties resolved
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub transaction: BorrowTransaction,
    pub book: BookShort,
    pub borrower: UserShort,
    pub lender: UserShort,
}

/// Transaction representation returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionDetails {
    pub id: i32,
    pub book: BookShort,
    pub borrower: UserShort,
    pub lender: UserShort,
    pub status: TransactionStatus,
    pub request_date: DateTime<Utc>,
    pub accept_date: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
    pub return_date: Option<DateTime<Utc>>,
    pub final_rental_fee: Option<Decimal>,
    pub is_overdue: bool,
}

impl TransactionDetails {
    pub fn from_record(record: TransactionRecord, today: NaiveDate) -> Self {
        let is_overdue = record.transaction.is_overdue_on(today);
        let tx = record.transaction;
        Self {
            id: tx.id,
            book: record.book,
            borrower: record.borrower,
            lender: record.lender,
            status: tx.status,
            request_date: tx.request_date,
            accept_date: tx.accept_date,
            due_date: tx.due_date,
            return_date: tx.return_date,
            final_rental_fee: tx.final_rental_fee,
            is_overdue,
        }
    }
}

/// Which side of the transactions to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Actor is the lender
    Incoming,
    /// Actor is the borrower
    Outgoing,
}

/// Transaction list query parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    /// `incoming` (as lender) or `outgoing` (as borrower); all when omitted
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl TransactionListQuery {
    pub fn transaction_type(&self) -> AppResult<Option<TransactionType>> {
        match self.kind.as_deref() {
            None | Some("") => Ok(None),
            Some("incoming") => Ok(Some(TransactionType::Incoming)),
            Some("outgoing") => Ok(Some(TransactionType::Outgoing)),
            Some(other) => Err(AppError::BadRequest(format!(
                "Invalid transaction type '{}', expected 'incoming' or 'outgoing'",
                other
            ))),
        }
    }
}

/// Borrow request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransaction {
    pub book_id: i32,
}

/// Per-actor transaction counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionStats {
    pub completed_as_borrower: i64,
    pub completed_as_lender: i64,
    pub pending_as_lender: i64,
    /// Book currently out with the actor (accepted, borrowed or returned unconfirmed)
    pub active_as_borrower: i64,
    pub overdue_as_borrower: i64,
}

impl TransactionStats {
    /// Tally the transactions `actor_id` takes part in
    pub fn tally<'a>(
        actor_id: i32,
        transactions: impl IntoIterator<Item = &'a BorrowTransaction>,
        today: NaiveDate,
    ) -> Self {
        let mut stats = Self::default();
        for tx in transactions {
            if tx.borrower_id == actor_id {
                if tx.status == TransactionStatus::Completed {
                    stats.completed_as_borrower += 1;
                }
                if tx.status.book_is_out() {
                    stats.active_as_borrower += 1;
                }
                if tx.is_overdue_on(today) {
                    stats.overdue_as_borrower += 1;
                }
            }
            if tx.lender_id == actor_id {
                match tx.status {
                    TransactionStatus::Completed => stats.completed_as_lender += 1,
                    TransactionStatus::Pending => stats.pending_as_lender += 1,
                    _ => {}
                }
            }
        }
        stats
    }
}
