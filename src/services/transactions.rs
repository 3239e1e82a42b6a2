//! Borrow transaction service

use std::sync::Arc;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        transaction::{TransactionDetails, TransactionRecord, TransactionStats, TransactionType},
        user::Actor,
    },
    repository::Repository,
    services::notifications::{self, Notifier},
    workflow::Transition,
};

#[derive(Clone)]
pub struct TransactionsService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl TransactionsService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            notifier,
            clock,
        }
    }

    fn details(&self, record: TransactionRecord) -> TransactionDetails {
        TransactionDetails::from_record(record, self.clock.today())
    }

    /// Ask to borrow a book; creates a PENDING transaction
    pub async fn request_borrow(&self, actor: &Actor, book_id: i32) -> AppResult<TransactionDetails> {
        let record = self
            .repository
            .transactions
            .create(actor.id, book_id, self.clock.now())
            .await?;

        tracing::info!(
            transaction_id = record.transaction.id,
            book_id,
            borrower_id = actor.id,
            "Borrow requested"
        );
        Ok(self.details(record))
    }

    pub async fn list(&self, actor: &Actor, kind: Option<TransactionType>) -> AppResult<Vec<TransactionDetails>> {
        let records = self.repository.transactions.list_for_actor(actor.id, kind).await?;
        let today = self.clock.today();
        Ok(records
            .into_iter()
            .map(|r| TransactionDetails::from_record(r, today))
            .collect())
    }

    /// Get a transaction; only its borrower and lender may see it
    pub async fn get(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        let record = self.repository.transactions.get_by_id(id).await?;
        if !record.transaction.is_participant(actor.id) {
            return Err(AppError::Authorization(
                "Only the borrower or the lender can view this transaction".to_string(),
            ));
        }
        Ok(self.details(record))
    }

    pub async fn accept(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        self.run(actor, id, Transition::Accept).await
    }

    pub async fn reject(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        self.run(actor, id, Transition::Reject).await
    }

    /// Borrower hands the book back; the lender is notified in the background
    pub async fn mark_returned(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        self.run(actor, id, Transition::MarkReturned).await
    }

    /// Lender confirms the book is back; computes the final fee
    pub async fn confirm_return(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        self.run(actor, id, Transition::ConfirmReturn).await
    }

    pub async fn cancel(&self, actor: &Actor, id: i32) -> AppResult<TransactionDetails> {
        self.run(actor, id, Transition::Cancel).await
    }

    async fn run(&self, actor: &Actor, id: i32, transition: Transition) -> AppResult<TransactionDetails> {
        let record = match self
            .repository
            .transactions
            .transition(id, actor.id, transition, self.clock.now())
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(
                    transaction_id = id,
                    actor_id = actor.id,
                    transition = transition.name(),
                    "Transition refused: {}",
                    e
                );
                return Err(e);
            }
        };

        tracing::info!(
            transaction_id = id,
            actor_id = actor.id,
            transition = transition.name(),
            status = %record.transaction.status,
            "Transaction updated"
        );

        if transition == Transition::MarkReturned {
            notifications::dispatch_returned(self.notifier.clone(), record.clone());
        }

        Ok(self.details(record))
    }

    /// Counters over every transaction the actor takes part in
    pub async fn stats(&self, actor: &Actor) -> AppResult<TransactionStats> {
        let records = self.repository.transactions.list_for_actor(actor.id, None).await?;
        Ok(TransactionStats::tally(
            actor.id,
            records.iter().map(|r| &r.transaction),
            self.clock.today(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        models::{
            book::{BookQuery, CreateBook},
            enums::{BookCondition, Genre, TransactionStatus},
        },
        repository::memory::MemoryStore,
        services::{books::BooksService, notifications::MockNotifier},
    };
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    struct Fixture {
        books: BooksService,
        transactions: TransactionsService,
        clock: Arc<ManualClock>,
        lender: Actor,
        borrower: Actor,
        second_borrower: Actor,
        book_id: i32,
    }

    fn quiet_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_book_returned().returning(|_| Ok(()));
        notifier
    }

    async fn fixture(notifier: MockNotifier) -> Fixture {
        let store = MemoryStore::new();
        let a = store.insert_user("ann", Some("ann@example.org"), Some("York")).await;
        let b = store.insert_user("ben", Some("ben@example.org"), None).await;
        let c = store.insert_user("cat", None, None).await;
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()));
        let repository = Repository::in_memory(store);

        let books = BooksService::new(repository.clone(), clock.clone());
        let transactions = TransactionsService::new(repository, Arc::new(notifier), clock.clone());

        let lender = Actor::new(a.id, a.username);
        let borrower = Actor::new(b.id, b.username);
        let second_borrower = Actor::new(c.id, c.username);
        let book = books
            .create_book(
                &lender,
                CreateBook {
                    title: "Kindred".to_string(),
                    author: "Octavia E. Butler".to_string(),
                    isbn: None,
                    description: None,
                    genre: Genre::SciFi,
                    condition: BookCondition::Good,
                    daily_rental_price: Some(Decimal::new(200, 2)),
                    location: None,
                },
            )
            .await
            .unwrap();

        Fixture {
            books,
            transactions,
            clock,
            lender,
            borrower,
            second_borrower,
            book_id: book.id,
        }
    }

    async fn book_available(f: &Fixture) -> bool {
        f.books.get_book(f.book_id).await.unwrap().is_available
    }

    #[tokio::test]
    async fn test_borrow_accept_return_confirm() {
        let f = fixture(quiet_notifier()).await;

        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(book_available(&f).await);

        let tx = f.transactions.accept(&f.lender, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Accepted);
        assert_eq!(tx.due_date, NaiveDate::from_ymd_opt(2024, 3, 18));
        assert!(!tx.book.is_available);
        assert!(!book_available(&f).await);

        f.clock.advance(Duration::days(3));
        let tx = f.transactions.mark_returned(&f.borrower, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Returned);
        assert_eq!(tx.final_rental_fee, None);

        let tx = f.transactions.confirm_return(&f.lender, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.final_rental_fee, Some(Decimal::new(600, 2)));
        assert!(book_available(&f).await);
    }

    #[tokio::test]
    async fn test_reject_keeps_book_available() {
        let f = fixture(quiet_notifier()).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();

        let tx = f.transactions.reject(&f.lender, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Rejected);
        assert!(book_available(&f).await);

        let err = f.transactions.mark_returned(&f.borrower, tx.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(book_available(&f).await);
    }

    #[tokio::test]
    async fn test_cancel_then_accept_conflicts() {
        let f = fixture(quiet_notifier()).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();

        let tx = f.transactions.cancel(&f.borrower, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Cancelled);

        let err = f.transactions.accept(&f.lender, tx.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_owner_cannot_borrow_own_book() {
        let f = fixture(quiet_notifier()).await;
        let err = f.transactions.request_borrow(&f.lender, f.book_id).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        assert!(f.transactions.list(&f.lender, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_book_cannot_be_requested() {
        let f = fixture(quiet_notifier()).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        f.transactions.accept(&f.lender, tx.id).await.unwrap();

        let err = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let err = f.transactions.request_borrow(&f.borrower, 4242).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_book_is_lent_to_one_borrower_at_a_time() {
        let f = fixture(quiet_notifier()).await;
        let first = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        let second = f.transactions.request_borrow(&f.second_borrower, f.book_id).await.unwrap();

        f.transactions.accept(&f.lender, first.id).await.unwrap();
        let err = f.transactions.accept(&f.lender, second.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let second = f.transactions.get(&f.second_borrower, second.id).await.unwrap();
        assert_eq!(second.status, TransactionStatus::Pending);

        f.transactions.mark_returned(&f.borrower, first.id).await.unwrap();
        f.transactions.confirm_return(&f.lender, first.id).await.unwrap();
        assert!(book_available(&f).await);

        // Once the book is back, the waiting request can go through
        let second = f.transactions.accept(&f.lender, second.id).await.unwrap();
        assert_eq!(second.status, TransactionStatus::Accepted);
        assert!(!book_available(&f).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_accepts_succeed_once() {
        let f = fixture(quiet_notifier()).await;
        let id = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap().id;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = f.transactions.clone();
                let lender = f.lender.clone();
                tokio::spawn(async move { service.accept(&lender, id).await })
            })
            .collect();

        let mut accepted = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(details) => {
                    assert_eq!(details.status, TransactionStatus::Accepted);
                    accepted += 1;
                }
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!((accepted, conflicts), (1, 1));
    }

    #[tokio::test]
    async fn test_return_notification_failure_is_swallowed() {
        let (sent_tx, mut sent_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut notifier = MockNotifier::new();
        notifier.expect_book_returned().times(1).returning(move |record| {
            let _ = sent_tx.send(record.lender.username.clone());
            Err(AppError::Internal("SMTP unavailable".to_string()))
        });

        let f = fixture(notifier).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        f.transactions.accept(&f.lender, tx.id).await.unwrap();
        let tx = f.transactions.mark_returned(&f.borrower, tx.id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Returned);

        let notified = tokio::time::timeout(std::time::Duration::from_secs(5), sent_rx.recv())
            .await
            .unwrap();
        assert_eq!(notified.as_deref(), Some("ann"));
    }

    #[tokio::test]
    async fn test_unknown_borrower_is_not_found() {
        let f = fixture(quiet_notifier()).await;
        let ghost = Actor::new(4711, "ghost");
        let err = f.transactions.request_borrow(&ghost, f.book_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(f.transactions.list(&f.lender, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_participants_can_view() {
        let f = fixture(quiet_notifier()).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        let stranger = Actor::new(999, "mallory");

        assert!(f.transactions.get(&f.lender, tx.id).await.is_ok());
        assert!(f.transactions.get(&f.borrower, tx.id).await.is_ok());
        let err = f.transactions.get(&stranger, tx.id).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_overdue_and_stats() {
        let f = fixture(quiet_notifier()).await;
        let tx = f.transactions.request_borrow(&f.borrower, f.book_id).await.unwrap();
        f.transactions.accept(&f.lender, tx.id).await.unwrap();

        f.clock.advance(Duration::days(15));
        let tx = f.transactions.get(&f.borrower, tx.id).await.unwrap();
        assert!(tx.is_overdue);

        let stats = f.transactions.stats(&f.borrower).await.unwrap();
        assert_eq!(stats.active_as_borrower, 1);
        assert_eq!(stats.overdue_as_borrower, 1);
        assert_eq!(stats.completed_as_borrower, 0);

        let lender_stats = f.transactions.stats(&f.lender).await.unwrap();
        assert_eq!(lender_stats.pending_as_lender, 0);

        let listed = f.books.list_books(&BookQuery { is_available: Some(true), ..Default::default() }).await.unwrap();
        assert!(listed.is_empty());
    }
}
