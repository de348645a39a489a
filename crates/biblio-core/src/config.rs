//! Business-rule configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity and lending rules for a library instance.
///
/// The engine reads these at every borrow/return; they are fixed for the
/// lifetime of a [`crate::Library`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Display name for the library
    pub library_name: String,

    /// Domain appended to member emails submitted without an "@"
    pub domain: String,

    /// Days between borrow date and due date
    pub loan_period_days: i64,

    /// Maximum simultaneous borrowed loans per member
    pub max_books_per_member: u32,

    /// Penalty charged per day overdue
    pub penalty_rate: Decimal,

    /// Cap on the total penalty for a single loan
    pub max_penalty: Decimal,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_name: "Community Library".to_string(),
            domain: "library.local".to_string(),
            loan_period_days: 14,
            max_books_per_member: 3,
            penalty_rate: Decimal::new(500, 2),
            max_penalty: Decimal::new(5000, 2),
        }
    }
}

/// Snapshot of the running configuration, exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub library_name: String,
    pub domain: String,
    pub version: String,
    pub loan_period_days: i64,
    pub max_books_per_member: u32,
    pub penalty_rate: Decimal,
    pub max_penalty: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lending_rules() {
        let config = LibraryConfig::default();
        assert_eq!(config.loan_period_days, 14);
        assert_eq!(config.max_books_per_member, 3);
        assert_eq!(config.penalty_rate, Decimal::new(500, 2));
        assert_eq!(config.max_penalty, Decimal::new(5000, 2));
    }
}
