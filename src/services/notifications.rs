//! Notification sink for lending events

use async_trait::async_trait;
use std::sync::Arc;

use crate::{error::AppResult, models::transaction::TransactionRecord};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Tell the lender the borrower has marked the book as returned
    async fn book_returned(&self, record: &TransactionRecord) -> AppResult<()>;

    /// Remind the borrower that the book is past its due date
    async fn book_overdue(&self, record: &TransactionRecord) -> AppResult<()>;
}

/// Notifier that only writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn book_returned(&self, record: &TransactionRecord) -> AppResult<()> {
        tracing::info!(
            transaction_id = record.transaction.id,
            lender = %record.lender.username,
            "Book \"{}\" marked as returned",
            record.book.title
        );
        Ok(())
    }

    async fn book_overdue(&self, record: &TransactionRecord) -> AppResult<()> {
        tracing::info!(
            transaction_id = record.transaction.id,
            borrower = %record.borrower.username,
            "Book \"{}\" is overdue",
            record.book.title
        );
        Ok(())
    }
}

/// Send the return notice on a background task. Failures are logged and dropped.
pub fn dispatch_returned(notifier: Arc<dyn Notifier>, record: TransactionRecord) {
    tokio::spawn(async move {
        if let Err(e) = notifier.book_returned(&record).await {
            tracing::warn!(
                transaction_id = record.transaction.id,
                "Failed to send return notification: {}",
                e
            );
        }
    });
}
