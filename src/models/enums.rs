//! Shared domain enums, stored as TEXT columns

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Implements string conversion and the SQLx TEXT mapping for a fieldless enum.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Genre
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Genre {
    #[default]
    Fiction,
    SciFi,
    Mystery,
    Thriller,
    Romance,
    Fantasy,
    Horror,
    Historical,
    Biography,
    SelfHelp,
    Business,
    Science,
    Technology,
    Art,
    Cooking,
    Travel,
    Other,
}

text_enum!(Genre {
    Fiction => "FICTION",
    SciFi => "SCI_FI",
    Mystery => "MYSTERY",
    Thriller => "THRILLER",
    Romance => "ROMANCE",
    Fantasy => "FANTASY",
    Horror => "HORROR",
    Historical => "HISTORICAL",
    Biography => "BIOGRAPHY",
    SelfHelp => "SELF_HELP",
    Business => "BUSINESS",
    Science => "SCIENCE",
    Technology => "TECHNOLOGY",
    Art => "ART",
    Cooking => "COOKING",
    Travel => "TRAVEL",
    Other => "OTHER",
});

// ---------------------------------------------------------------------------
// BookCondition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookCondition {
    New,
    LikeNew,
    #[default]
    Good,
    Fair,
    Poor,
}

text_enum!(BookCondition {
    New => "NEW",
    LikeNew => "LIKE_NEW",
    Good => "GOOD",
    Fair => "FAIR",
    Poor => "POOR",
});

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Borrow transaction status.
///
/// `Borrowed` is a storable value that no transition produces; it is treated
/// like `Accepted` wherever "the book is out" matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Accepted,
    Rejected,
    Borrowed,
    Returned,
    Completed,
    Cancelled,
}

text_enum!(TransactionStatus {
    Pending => "PENDING",
    Accepted => "ACCEPTED",
    Rejected => "REJECTED",
    Borrowed => "BORROWED",
    Returned => "RETURNED",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
});

impl TransactionStatus {
    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Rejected | TransactionStatus::Cancelled | TransactionStatus::Completed
        )
    }

    /// Statuses during which the book is physically with the borrower
    pub fn book_is_out(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Accepted | TransactionStatus::Borrowed | TransactionStatus::Returned
        )
    }

    /// Statuses in which a passed due date makes the transaction overdue
    pub fn can_be_overdue(&self) -> bool {
        matches!(self, TransactionStatus::Accepted | TransactionStatus::Borrowed)
    }
}
