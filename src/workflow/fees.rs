//! Rental fee calculation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Fee for holding a book from `accepted_at` to `ended_at` at `daily_rate`.
///
/// Whole days are counted, partial days round down, and any borrow is billed
/// at least one day. Returns `None` when the borrow was never accepted.
pub fn compute_fee(
    accepted_at: Option<DateTime<Utc>>,
    ended_at: DateTime<Utc>,
    daily_rate: Decimal,
) -> Option<Decimal> {
    let accepted_at = accepted_at?;
    let days_held = (ended_at - accepted_at).num_days().max(1);
    Some(Decimal::from(days_held) * daily_rate)
}
