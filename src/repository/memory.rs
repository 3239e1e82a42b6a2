//! In-memory storage backend
//!
//! All records live behind one `RwLock`. A transition holds the write lock
//! across load, state machine and write-back, so transitions on the same
//! transaction are serialized and a failed transition leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BooksStore, TransactionsStore, UsersStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, BookShort, NewBook, UpdateBook},
        transaction::{BorrowTransaction, TransactionRecord, TransactionType},
        user::UserShort,
    },
    workflow::{self, Transition},
};

#[derive(Debug, Default)]
struct MemoryState {
    users: BTreeMap<i32, UserShort>,
    books: BTreeMap<i32, Book>,
    transactions: BTreeMap<i32, BorrowTransaction>,
    last_user_id: i32,
    last_book_id: i32,
    last_transaction_id: i32,
}

impl MemoryState {
    fn user(&self, id: i32) -> AppResult<&UserShort> {
        self.users
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn transaction(&self, id: i32) -> AppResult<&BorrowTransaction> {
        self.transactions
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))
    }

    fn record(&self, tx: &BorrowTransaction) -> AppResult<TransactionRecord> {
        Ok(TransactionRecord {
            book: BookShort::from(self.book(tx.book_id)?),
            borrower: self.user(tx.borrower_id)?.clone(),
            lender: self.user(tx.lender_id)?.clone(),
            transaction: tx.clone(),
        })
    }

    /// Records matching `keep`, newest request first
    fn records_where(&self, keep: impl Fn(&BorrowTransaction) -> bool) -> AppResult<Vec<TransactionRecord>> {
        let mut matching: Vec<&BorrowTransaction> =
            self.transactions.values().filter(|tx| keep(tx)).collect();
        matching.sort_by(|a, b| b.request_date.cmp(&a.request_date).then(b.id.cmp(&a.id)));
        matching.into_iter().map(|tx| self.record(tx)).collect()
    }
}

/// Shared in-memory store; clones share the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user account. Accounts are normally provisioned by the
    /// authentication service; this stands in for it.
    pub async fn insert_user(
        &self,
        username: &str,
        email: Option<&str>,
        location: Option<&str>,
    ) -> UserShort {
        let mut state = self.state.write().await;
        state.last_user_id += 1;
        let user = UserShort {
            id: state.last_user_id,
            username: username.to_string(),
            email: email.map(str::to_string),
            location: location.map(str::to_string),
        };
        state.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<UserShort> {
        self.state.read().await.user(id).cloned()
    }
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let mut state = self.state.write().await;
        state.user(book.owner_id)?;
        state.last_book_id += 1;
        let book = book.into_book(state.last_book_id);
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.state.read().await.book(id).cloned()
    }

    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let ordering = query
            .ordering()
            .ok_or_else(|| AppError::BadRequest("Unsupported ordering".to_string()))?;

        let state = self.state.read().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|book| query.matches(book))
            .cloned()
            .collect();
        books.sort_by(|a, b| ordering.compare(a, b));
        Ok(books)
    }

    async fn update(&self, id: i32, changes: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;
        changes.apply_to(book);
        book.updated_at = now;
        Ok(book.clone())
    }
}

#[async_trait]
impl TransactionsStore for MemoryStore {
    async fn create(&self, borrower_id: i32, book_id: i32, now: DateTime<Utc>) -> AppResult<TransactionRecord> {
        let mut state = self.state.write().await;

        state.user(borrower_id)?;
        let new = workflow::request_borrow(borrower_id, state.book(book_id)?, now)?;

        state.last_transaction_id += 1;
        let tx = new.into_transaction(state.last_transaction_id);
        let record = state.record(&tx)?;
        state.transactions.insert(tx.id, tx);
        Ok(record)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<TransactionRecord> {
        let state = self.state.read().await;
        state.record(state.transaction(id)?)
    }

    async fn list_for_actor(
        &self,
        actor_id: i32,
        kind: Option<TransactionType>,
    ) -> AppResult<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        state.records_where(|tx| match kind {
            Some(TransactionType::Incoming) => tx.lender_id == actor_id,
            Some(TransactionType::Outgoing) => tx.borrower_id == actor_id,
            None => tx.is_participant(actor_id),
        })
    }

    async fn transition(
        &self,
        id: i32,
        actor_id: i32,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<TransactionRecord> {
        let mut state = self.state.write().await;

        let mut tx = state.transaction(id)?.clone();
        let mut book = state.book(tx.book_id)?.clone();

        let outcome = workflow::apply(&mut tx, &book, actor_id, transition, now)?;
        if let Some(available) = outcome.book_available {
            book.is_available = available;
            book.updated_at = now;
        }

        // Commit both records together
        state.books.insert(book.id, book);
        state.transactions.insert(tx.id, tx.clone());
        state.record(&tx)
    }

    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        let mut records = state.records_where(|tx| tx.is_overdue_on(today))?;
        records.sort_by_key(|r| r.transaction.due_date);
        Ok(records)
    }
}
