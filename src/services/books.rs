//! Book registry service

use std::sync::Arc;
use validator::Validate;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, NewBook, UpdateBook},
        user::Actor,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
    clock: Arc<dyn Clock>,
}

impl BooksService {
    pub fn new(repository: Repository, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// List a new book owned by `actor`. The owner's location fills in a missing one.
    pub async fn create_book(&self, actor: &Actor, request: CreateBook) -> AppResult<Book> {
        request.validate()?;

        let location = match request.location.filter(|l| !l.trim().is_empty()) {
            Some(location) => Some(location),
            None => self.repository.users.get_by_id(actor.id).await?.location,
        };

        let book = NewBook {
            owner_id: actor.id,
            title: request.title,
            author: request.author,
            isbn: request.isbn,
            description: request.description,
            genre: request.genre,
            condition: request.condition,
            daily_rental_price: request
                .daily_rental_price
                .unwrap_or_else(CreateBook::default_daily_rental_price),
            location,
            created_at: self.clock.now(),
        };

        let book = self.repository.books.create(book).await?;
        tracing::info!(book_id = book.id, owner_id = actor.id, "Book listed: {}", book.title);
        Ok(book)
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        self.repository.books.list(query).await
    }

    /// Books owned by `actor`, whatever their availability
    pub async fn list_my_books(&self, actor: &Actor) -> AppResult<Vec<Book>> {
        let query = BookQuery {
            owner_id: Some(actor.id),
            ..Default::default()
        };
        self.repository.books.list(&query).await
    }

    /// Update listing fields; only the owner may do this
    pub async fn update_book(&self, actor: &Actor, id: i32, changes: UpdateBook) -> AppResult<Book> {
        changes.validate()?;

        let book = self.repository.books.get_by_id(id).await?;
        if book.owner_id != actor.id {
            return Err(AppError::Authorization(
                "Only the owner can update this book".to_string(),
            ));
        }

        self.repository.books.update(id, &changes, self.clock.now()).await
    }
}
