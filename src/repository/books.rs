//! Books repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{users, BooksStore};
use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, NewBook, UpdateBook},
};

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Lock a book row for the rest of the enclosing database transaction
pub(crate) async fn get_for_update(conn: &mut PgConnection, id: i32) -> AppResult<Book> {
    sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
}

/// Availability writes happen only inside a transition's database transaction
pub(crate) async fn set_availability(
    conn: &mut PgConnection,
    id: i32,
    available: bool,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let result = sqlx::query("UPDATE books SET is_available = $1, updated_at = $2 WHERE id = $3")
        .bind(available)
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Book with id {} not found", id)));
    }
    Ok(())
}

#[async_trait]
impl BooksStore for BooksRepository {
    async fn create(&self, book: NewBook) -> AppResult<Book> {
        let mut conn = self.pool.acquire().await?;
        users::ensure_exists(&mut *conn, book.owner_id).await?;

        let row = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                owner_id, title, author, isbn, description, genre, condition,
                daily_rental_price, is_available, location, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $10)
            RETURNING *
            "#,
        )
        .bind(book.owner_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.description)
        .bind(book.genre)
        .bind(book.condition)
        .bind(book.daily_rental_price)
        .bind(&book.location)
        .bind(book.created_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(row)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn list(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let ordering = query
            .ordering()
            .ok_or_else(|| AppError::BadRequest("Unsupported ordering".to_string()))?;

        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM books WHERE 1=1");

        if let Some(genre) = query.genre {
            builder.push(" AND genre = ").push_bind(genre);
        }
        if let Some(condition) = query.condition {
            builder.push(" AND condition = ").push_bind(condition);
        }
        if let Some(available) = query.is_available {
            builder.push(" AND is_available = ").push_bind(available);
        }
        if let Some(min) = query.min_price {
            builder.push(" AND daily_rental_price >= ").push_bind(min);
        }
        if let Some(max) = query.max_price {
            builder.push(" AND daily_rental_price <= ").push_bind(max);
        }
        if let Some(owner_id) = query.owner_id {
            builder.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(ref author) = query.author {
            builder.push(" AND author ILIKE ").push_bind(format!("%{}%", author));
        }
        if let Some(ref location) = query.location {
            builder.push(" AND location ILIKE ").push_bind(format!("%{}%", location));
        }
        if let Some(ref search) = query.search {
            let pattern = format!("%{}%", search);
            builder
                .push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR author ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder.push(" ORDER BY ").push(ordering.sql());

        let books = builder.build_query_as::<Book>().fetch_all(&self.pool).await?;
        Ok(books)
    }

    async fn update(&self, id: i32, changes: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                description = COALESCE($5, description),
                genre = COALESCE($6, genre),
                condition = COALESCE($7, condition),
                daily_rental_price = COALESCE($8, daily_rental_price),
                location = COALESCE($9, location),
                updated_at = $10
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(&changes.isbn)
        .bind(&changes.description)
        .bind(changes.genre)
        .bind(changes.condition)
        .bind(changes.daily_rental_price)
        .bind(&changes.location)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }
}
