//! Borrow transaction state machine
//!
//! ```text
//! PENDING --accept--> ACCEPTED --mark_returned--> RETURNED --confirm_return--> COMPLETED
//!    |--reject--> REJECTED
//!    `--cancel--> CANCELLED
//! ```
//!
//! These functions are pure: storage backends load the transaction and its
//! book under a lock, call [`apply`], then persist the transaction together
//! with the availability change in the returned [`Outcome`].

pub mod fees;

use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        enums::TransactionStatus,
        transaction::{BorrowTransaction, NewTransaction},
    },
};

/// Days between acceptance and the due date
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Participant role required by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Lender,
    Borrower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept,
    Reject,
    MarkReturned,
    ConfirmReturn,
    Cancel,
}

impl Transition {
    pub fn required_role(self) -> Role {
        match self {
            Transition::Accept | Transition::Reject | Transition::ConfirmReturn => Role::Lender,
            Transition::MarkReturned | Transition::Cancel => Role::Borrower,
        }
    }

    /// The only status this transition may start from
    pub fn from_status(self) -> TransactionStatus {
        match self {
            Transition::Accept | Transition::Reject | Transition::Cancel => TransactionStatus::Pending,
            Transition::MarkReturned => TransactionStatus::Accepted,
            Transition::ConfirmReturn => TransactionStatus::Returned,
        }
    }

    pub fn to_status(self) -> TransactionStatus {
        match self {
            Transition::Accept => TransactionStatus::Accepted,
            Transition::Reject => TransactionStatus::Rejected,
            Transition::MarkReturned => TransactionStatus::Returned,
            Transition::ConfirmReturn => TransactionStatus::Completed,
            Transition::Cancel => TransactionStatus::Cancelled,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::MarkReturned => "mark_returned",
            Transition::ConfirmReturn => "confirm_return",
            Transition::Cancel => "cancel",
        }
    }

    fn forbidden_message(self) -> &'static str {
        match self {
            Transition::Accept => "Only the lender can accept this request",
            Transition::Reject => "Only the lender can reject this request",
            Transition::MarkReturned => "Only the borrower can mark this book as returned",
            Transition::ConfirmReturn => "Only the lender can confirm this return",
            Transition::Cancel => "Only the borrower can cancel this request",
        }
    }

    fn conflict_message(self, current: TransactionStatus) -> String {
        match self {
            Transition::Accept | Transition::Reject => {
                format!("This request has already been processed (status {})", current)
            }
            Transition::MarkReturned => {
                format!("Only accepted borrows can be marked as returned (status {})", current)
            }
            Transition::ConfirmReturn => {
                format!("The book has not been marked as returned (status {})", current)
            }
            Transition::Cancel => {
                format!("Only pending requests can be cancelled (status {})", current)
            }
        }
    }
}

/// Side effects a storage backend must commit with the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outcome {
    /// New value for the book's availability flag, if it changes
    pub book_available: Option<bool>,
}

/// Check a borrow request and build the PENDING transaction.
///
/// Book availability is left untouched until the lender accepts.
pub fn request_borrow(actor_id: i32, book: &Book, now: DateTime<Utc>) -> AppResult<NewTransaction> {
    if book.owner_id == actor_id {
        return Err(AppError::Authorization("You cannot borrow your own book".to_string()));
    }
    if !book.is_available {
        return Err(AppError::Conflict("This book is not available for borrowing".to_string()));
    }

    Ok(NewTransaction {
        book_id: book.id,
        borrower_id: actor_id,
        lender_id: book.owner_id,
        request_date: now,
    })
}

/// Apply `transition` on behalf of `actor_id`.
///
/// On error `tx` may be partially modified; callers apply to a copy or roll back.
pub fn apply(
    tx: &mut BorrowTransaction,
    book: &Book,
    actor_id: i32,
    transition: Transition,
    now: DateTime<Utc>,
) -> AppResult<Outcome> {
    if tx.book_id != book.id {
        return Err(AppError::Internal(format!(
            "Transaction {} loaded with book {} instead of {}",
            tx.id, book.id, tx.book_id
        )));
    }

    let allowed = match transition.required_role() {
        Role::Lender => tx.lender_id == actor_id,
        Role::Borrower => tx.borrower_id == actor_id,
    };
    if !allowed {
        return Err(AppError::Authorization(transition.forbidden_message().to_string()));
    }

    if tx.status != transition.from_status() {
        return Err(AppError::Conflict(transition.conflict_message(tx.status)));
    }

    let mut outcome = Outcome::default();
    match transition {
        Transition::Accept => {
            // Another request for the same book may already have been accepted
            if !book.is_available {
                return Err(AppError::Conflict(
                    "This book is not available for borrowing".to_string(),
                ));
            }
            tx.accept_date = Some(now);
            if tx.due_date.is_none() {
                tx.due_date = Some(now.date_naive() + Duration::days(LOAN_PERIOD_DAYS));
            }
            outcome.book_available = Some(false);
        }
        Transition::MarkReturned => {
            tx.return_date = Some(now);
        }
        Transition::ConfirmReturn => {
            let returned_at = tx.return_date.ok_or_else(|| {
                AppError::Internal(format!("Returned transaction {} has no return date", tx.id))
            })?;
            let fee = fees::compute_fee(tx.accept_date, returned_at, book.daily_rental_price)
                .ok_or_else(|| {
                    AppError::Internal(format!("Returned transaction {} was never accepted", tx.id))
                })?;
            tx.final_rental_fee = Some(fee);
            outcome.book_available = Some(true);
        }
        Transition::Reject | Transition::Cancel => {}
    }
    tx.status = transition.to_status();

    check_invariants(tx)?;
    Ok(outcome)
}

/// Date and fee consistency of a transaction
pub fn check_invariants(tx: &BorrowTransaction) -> AppResult<()> {
    if let (Some(due), Some(accepted)) = (tx.due_date, tx.accept_date) {
        if due <= accepted.date_naive() {
            return Err(AppError::Validation(
                "Due date must be after acceptance date".to_string(),
            ));
        }
    }
    if let (Some(returned), Some(accepted)) = (tx.return_date, tx.accept_date) {
        if returned < accepted {
            return Err(AppError::Validation(
                "Return date cannot be before acceptance date".to_string(),
            ));
        }
    }
    if tx.borrower_id == tx.lender_id {
        return Err(AppError::Validation(
            "Borrower and lender must be different users".to_string(),
        ));
    }
    let completed = tx.status == TransactionStatus::Completed;
    if completed != tx.final_rental_fee.is_some() {
        return Err(AppError::Internal(format!(
            "Transaction {} has status {} with fee {:?}",
            tx.id, tx.status, tx.final_rental_fee
        )));
    }
    Ok(())
}
