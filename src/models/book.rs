//! Book listing model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use super::enums::{BookCondition, Genre};

/// Highest daily price a listing may ask
pub const MAX_DAILY_RENTAL_PRICE: i64 = 1000;

/// Book listing from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub genre: Genre,
    pub condition: BookCondition,
    pub daily_rental_price: Decimal,
    pub is_available: bool,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book summary embedded in transactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub daily_rental_price: Decimal,
    pub is_available: bool,
    pub location: Option<String>,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            daily_rental_price: book.daily_rental_price,
            is_available: book.is_available,
            location: book.location.clone(),
        }
    }
}

fn validate_daily_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        let mut err = ValidationError::new("daily_rental_price");
        err.message = Some("Rental price cannot be negative".into());
        return Err(err);
    }
    if *price > Decimal::from(MAX_DAILY_RENTAL_PRICE) {
        let mut err = ValidationError::new("daily_rental_price");
        err.message = Some("Rental price seems too high".into());
        return Err(err);
    }
    Ok(())
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author must be 1-100 characters"))]
    pub author: String,
    #[validate(length(max = 13, message = "ISBN must be at most 13 characters"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Genre,
    #[serde(default)]
    pub condition: BookCondition,
    /// Defaults to 0.50
    #[validate(custom(function = "validate_daily_price"))]
    pub daily_rental_price: Option<Decimal>,
    /// Defaults to the owner's location
    pub location: Option<String>,
}

impl CreateBook {
    pub fn default_daily_rental_price() -> Decimal {
        Decimal::new(50, 2)
    }
}

/// A listing with every default resolved, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub owner_id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub genre: Genre,
    pub condition: BookCondition,
    pub daily_rental_price: Decimal,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewBook {
    pub fn into_book(self, id: i32) -> Book {
        Book {
            id,
            owner_id: self.owner_id,
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            description: self.description,
            genre: self.genre,
            condition: self.condition,
            daily_rental_price: self.daily_rental_price,
            is_available: true,
            location: self.location,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Update book request (owner only). Availability is not editable here.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Author must be 1-100 characters"))]
    pub author: Option<String>,
    #[validate(length(max = 13, message = "ISBN must be at most 13 characters"))]
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub genre: Option<Genre>,
    pub condition: Option<BookCondition>,
    #[validate(custom(function = "validate_daily_price"))]
    pub daily_rental_price: Option<Decimal>,
    pub location: Option<String>,
}

impl UpdateBook {
    /// Apply the provided fields onto `book`
    pub fn apply_to(&self, book: &mut Book) {
        if let Some(ref title) = self.title {
            book.title = title.clone();
        }
        if let Some(ref author) = self.author {
            book.author = author.clone();
        }
        if self.isbn.is_some() {
            book.isbn = self.isbn.clone();
        }
        if self.description.is_some() {
            book.description = self.description.clone();
        }
        if let Some(genre) = self.genre {
            book.genre = genre;
        }
        if let Some(condition) = self.condition {
            book.condition = condition;
        }
        if let Some(price) = self.daily_rental_price {
            book.daily_rental_price = price;
        }
        if self.location.is_some() {
            book.location = self.location.clone();
        }
    }
}

/// Sort order for book listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookOrdering {
    CreatedAt,
    #[default]
    CreatedAtDesc,
    Price,
    PriceDesc,
    Title,
    TitleDesc,
}

impl BookOrdering {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(Self::CreatedAt),
            "-created_at" => Some(Self::CreatedAtDesc),
            "daily_rental_price" => Some(Self::Price),
            "-daily_rental_price" => Some(Self::PriceDesc),
            "title" => Some(Self::Title),
            "-title" => Some(Self::TitleDesc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at ASC, id ASC",
            Self::CreatedAtDesc => "created_at DESC, id DESC",
            Self::Price => "daily_rental_price ASC, id ASC",
            Self::PriceDesc => "daily_rental_price DESC, id DESC",
            Self::Title => "title ASC, id ASC",
            Self::TitleDesc => "title DESC, id DESC",
        }
    }

    pub fn compare(&self, a: &Book, b: &Book) -> std::cmp::Ordering {
        match self {
            Self::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            Self::CreatedAtDesc => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            Self::Price => a.daily_rental_price.cmp(&b.daily_rental_price).then(a.id.cmp(&b.id)),
            Self::PriceDesc => b.daily_rental_price.cmp(&a.daily_rental_price).then(b.id.cmp(&a.id)),
            Self::Title => a.title.cmp(&b.title).then(a.id.cmp(&b.id)),
            Self::TitleDesc => b.title.cmp(&a.title).then(b.id.cmp(&a.id)),
        }
    }
}

/// Book list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct BookQuery {
    pub genre: Option<Genre>,
    pub condition: Option<BookCondition>,
    pub is_available: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Case-insensitive substring of the author
    pub author: Option<String>,
    /// Substring of title, author or description
    pub search: Option<String>,
    /// Case-insensitive substring of the location
    pub location: Option<String>,
    pub owner_id: Option<i32>,
    /// One of `created_at`, `daily_rental_price`, `title`, optionally prefixed with `-`
    pub ordering: Option<String>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl BookQuery {
    pub fn ordering(&self) -> Option<BookOrdering> {
        match self.ordering.as_deref() {
            None => Some(BookOrdering::default()),
            Some(s) => BookOrdering::parse(s),
        }
    }

    /// In-process evaluation of the filters
    pub fn matches(&self, book: &Book) -> bool {
        if self.genre.is_some_and(|g| g != book.genre) {
            return false;
        }
        if self.condition.is_some_and(|c| c != book.condition) {
            return false;
        }
        if self.is_available.is_some_and(|a| a != book.is_available) {
            return false;
        }
        if self.min_price.is_some_and(|p| book.daily_rental_price < p) {
            return false;
        }
        if self.max_price.is_some_and(|p| book.daily_rental_price > p) {
            return false;
        }
        if self.owner_id.is_some_and(|o| o != book.owner_id) {
            return false;
        }
        if let Some(ref author) = self.author {
            if !contains_ci(&book.author, author) {
                return false;
            }
        }
        if let Some(ref location) = self.location {
            match book.location {
                Some(ref l) if contains_ci(l, location) => {}
                _ => return false,
            }
        }
        if let Some(ref search) = self.search {
            let in_description = book
                .description
                .as_deref()
                .is_some_and(|d| contains_ci(d, search));
            if !contains_ci(&book.title, search) && !contains_ci(&book.author, search) && !in_description {
                return false;
            }
        }
        true
    }
}
