//! Overdue loan reminders

use chrono::NaiveDate;
use std::sync::Arc;

use crate::{error::AppResult, repository::Repository, services::notifications::Notifier};

#[derive(Clone)]
pub struct OverdueService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl OverdueService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Remind every borrower whose loan was due before `today`.
    /// Returns the number of reminders delivered; failed ones are logged and skipped.
    pub async fn send_reminders(&self, today: NaiveDate) -> AppResult<usize> {
        let overdue = self.repository.transactions.list_overdue(today).await?;
        tracing::info!("Found {} overdue transactions", overdue.len());

        let mut sent = 0;
        for record in &overdue {
            match self.notifier.book_overdue(record).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::warn!(
                    transaction_id = record.transaction.id,
                    borrower = %record.borrower.username,
                    "Failed to send overdue reminder: {}",
                    e
                ),
            }
        }

        tracing::info!("Sent {} of {} overdue reminders", sent, overdue.len());
        Ok(sent)
    }
}
