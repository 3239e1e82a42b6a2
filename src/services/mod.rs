//! Business logic services

pub mod books;
pub mod email;
pub mod notifications;
pub mod overdue;
pub mod transactions;

use std::sync::Arc;

use crate::{clock::Clock, config::EmailConfig, error::AppResult, repository::Repository};
use notifications::Notifier;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub transactions: transactions::TransactionsService,
    pub overdue: overdue::OverdueService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            books: books::BooksService::new(repository.clone(), clock.clone()),
            transactions: transactions::TransactionsService::new(
                repository.clone(),
                notifier.clone(),
                clock,
            ),
            overdue: overdue::OverdueService::new(repository.clone(), notifier),
            repository,
        }
    }

    /// Readiness check on the storage backend
    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}

/// Pick the notifier for the email configuration: SMTP when enabled, log otherwise
pub fn notifier_for(config: &EmailConfig) -> Arc<dyn Notifier> {
    if config.enabled {
        Arc::new(email::EmailService::new(config.clone()))
    } else {
        tracing::info!("Email disabled, notifications will only be logged");
        Arc::new(notifications::LogNotifier)
    }
}
