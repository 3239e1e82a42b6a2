//! Data models for BorrowedWords

pub mod book;
pub mod enums;
pub mod transaction;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort};
pub use enums::{BookCondition, Genre, TransactionStatus};
pub use transaction::{BorrowTransaction, TransactionDetails, TransactionRecord};
pub use user::{Actor, UserShort};
