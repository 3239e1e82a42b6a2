//! Borrow transactions repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use super::{books, users, TransactionsStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookShort,
        transaction::{BorrowTransaction, TransactionRecord, TransactionType},
        user::UserShort,
    },
    workflow::{self, Transition},
};

const RECORD_SELECT: &str = r#"
    SELECT t.id, t.book_id, t.borrower_id, t.lender_id, t.status, t.request_date,
           t.accept_date, t.due_date, t.return_date, t.final_rental_fee,
           b.title AS book_title, b.author AS book_author,
           b.daily_rental_price AS book_daily_rental_price,
           b.is_available AS book_is_available, b.location AS book_location,
           br.username AS borrower_username, br.email AS borrower_email,
           br.location AS borrower_location,
           ld.username AS lender_username, ld.email AS lender_email,
           ld.location AS lender_location
    FROM borrow_transactions t
    JOIN books b ON b.id = t.book_id
    JOIN users br ON br.id = t.borrower_id
    JOIN users ld ON ld.id = t.lender_id
"#;

fn record_from_row(row: &PgRow) -> Result<TransactionRecord, sqlx::Error> {
    let transaction = BorrowTransaction {
        id: row.try_get("id")?,
        book_id: row.try_get("book_id")?,
        borrower_id: row.try_get("borrower_id")?,
        lender_id: row.try_get("lender_id")?,
        status: row.try_get("status")?,
        request_date: row.try_get("request_date")?,
        accept_date: row.try_get("accept_date")?,
        due_date: row.try_get("due_date")?,
        return_date: row.try_get("return_date")?,
        final_rental_fee: row.try_get("final_rental_fee")?,
    };

    Ok(TransactionRecord {
        book: BookShort {
            id: transaction.book_id,
            title: row.try_get("book_title")?,
            author: row.try_get("book_author")?,
            daily_rental_price: row.try_get("book_daily_rental_price")?,
            is_available: row.try_get("book_is_available")?,
            location: row.try_get("book_location")?,
        },
        borrower: UserShort {
            id: transaction.borrower_id,
            username: row.try_get("borrower_username")?,
            email: row.try_get("borrower_email")?,
            location: row.try_get("borrower_location")?,
        },
        lender: UserShort {
            id: transaction.lender_id,
            username: row.try_get("lender_username")?,
            email: row.try_get("lender_email")?,
            location: row.try_get("lender_location")?,
        },
        transaction,
    })
}

#[derive(Clone)]
pub struct TransactionsRepository {
    pool: Pool<Postgres>,
}

impl TransactionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_records(&self, query: &str, bind: i32) -> AppResult<Vec<TransactionRecord>> {
        let rows = sqlx::query(query).bind(bind).fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[async_trait]
impl TransactionsStore for TransactionsRepository {
    async fn create(&self, borrower_id: i32, book_id: i32, now: DateTime<Utc>) -> AppResult<TransactionRecord> {
        let mut db_tx = self.pool.begin().await?;

        users::ensure_exists(&mut *db_tx, borrower_id).await?;
        let book = books::get_for_update(&mut *db_tx, book_id).await?;
        let new = workflow::request_borrow(borrower_id, &book, now)?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO borrow_transactions (book_id, borrower_id, lender_id, status, request_date)
            VALUES ($1, $2, $3, 'PENDING', $4)
            RETURNING id
            "#,
        )
        .bind(new.book_id)
        .bind(new.borrower_id)
        .bind(new.lender_id)
        .bind(new.request_date)
        .fetch_one(&mut *db_tx)
        .await?;

        db_tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: i32) -> AppResult<TransactionRecord> {
        let query = format!("{} WHERE t.id = $1", RECORD_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;
        Ok(record_from_row(&row)?)
    }

    async fn list_for_actor(
        &self,
        actor_id: i32,
        kind: Option<TransactionType>,
    ) -> AppResult<Vec<TransactionRecord>> {
        let filter = match kind {
            Some(TransactionType::Incoming) => "t.lender_id = $1",
            Some(TransactionType::Outgoing) => "t.borrower_id = $1",
            None => "(t.borrower_id = $1 OR t.lender_id = $1)",
        };
        let query = format!(
            "{} WHERE {} ORDER BY t.request_date DESC, t.id DESC",
            RECORD_SELECT, filter
        );
        self.fetch_records(&query, actor_id).await
    }

    async fn transition(
        &self,
        id: i32,
        actor_id: i32,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AppResult<TransactionRecord> {
        let mut db_tx = self.pool.begin().await?;

        let mut tx = sqlx::query_as::<_, BorrowTransaction>(
            "SELECT * FROM borrow_transactions WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *db_tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        let book = books::get_for_update(&mut *db_tx, tx.book_id).await?;

        // Any early return drops `db_tx`, rolling back both rows
        let outcome = workflow::apply(&mut tx, &book, actor_id, transition, now)?;

        sqlx::query(
            r#"
            UPDATE borrow_transactions
            SET status = $2, accept_date = $3, due_date = $4, return_date = $5, final_rental_fee = $6
            WHERE id = $1
            "#,
        )
        .bind(tx.id)
        .bind(tx.status)
        .bind(tx.accept_date)
        .bind(tx.due_date)
        .bind(tx.return_date)
        .bind(tx.final_rental_fee)
        .execute(&mut *db_tx)
        .await?;

        if let Some(available) = outcome.book_available {
            books::set_availability(&mut *db_tx, book.id, available, now).await?;
        }

        db_tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<TransactionRecord>> {
        let query = format!(
            "{} WHERE t.status IN ('ACCEPTED', 'BORROWED') AND t.due_date < $1 ORDER BY t.due_date",
            RECORD_SELECT
        );
        let rows = sqlx::query(&query).bind(today).fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
