//! Repository layer for persistence
//!
//! Each store is a trait with a PostgreSQL implementation and an in-memory
//! implementation sharing one lock ([`memory::MemoryStore`]).

pub mod books;
pub mod memory;
pub mod transactions;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, NewBook, UpdateBook},
        transaction::{TransactionRecord, TransactionType},
        user::UserShort,
    },
    workflow::Transition,
};

#[async_trait]
pub trait UsersStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<UserShort>;
}

#[async_trait]
pub trait BooksStore: Send + Sync {
    async fn create(&self, book: NewBook) -> AppResult<Book>;

    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>>;

    /// Write the editable fields; availability is never touched here
    async fn update(&self, id: i32, changes: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book>;
}

#[async_trait]
pub trait TransactionsStore: Send + Sync {
    /// Check the book under lock and insert a PENDING transaction
    async fn create(&self, borrower_id: i32, book_id: i32, now: DateTime<Utc>) -> AppResult<TransactionRecord>;

    async fn get_by_id(&self, id: i32) -> AppResult<TransactionRecord>;

    /// Transactions `actor_id` takes part in, newest request first
    async fn list_for_actor(
        &self,
        actor_id: i32,
        kind: Option<TransactionType>,
    ) -> AppResult<Vec<TransactionRecord>>;

    /// Run one state machine transition atomically with its book update
    async fn transition(
        &self,
        id: i32,
        actor_id: i32,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<TransactionRecord>;

    /// Accepted or borrowed transactions whose due date is before `today`
    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<TransactionRecord>>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub users: Arc<dyn UsersStore>,
    pub books: Arc<dyn BooksStore>,
    pub transactions: Arc<dyn TransactionsStore>,
    pool: Option<Pool<Postgres>>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::UsersRepository::new(pool.clone())),
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            transactions: Arc::new(transactions::TransactionsRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Create a repository over an in-memory store
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            transactions: Arc::new(store),
            pool: None,
        }
    }

    /// Check that the backing database answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }
}
