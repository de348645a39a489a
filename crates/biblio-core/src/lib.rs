//! # Biblio Core
//!
//! Core library for Biblio - a library-loan management backend.
//!
//! This crate provides the loan lifecycle engine, penalty calculation,
//! storage layer, and data models independent of any CLI or HTTP interface.
//!
//! ## Architecture
//!
//! - **store**: SQLite record store for books, members, and loans
//! - **library**: loan lifecycle engine and query/reporting layer
//! - **penalty**: overdue penalty calculation
//! - **config**: business rules (loan period, loan cap, penalty rate)
//!
//! The store enforces unique keys and referential integrity; the engine is
//! the only writer of loan state and the derived counters
//! (`Book::quantity`, `Member::books_loaned`) that mirror it.

pub mod config;
pub mod error;
pub mod library;
pub mod penalty;
pub mod store;

pub use config::{LibraryConfig, SystemInfo};
pub use error::{BiblioError, Result};
pub use library::Library;
pub use store::types::{Book, Loan, LoanStatus, Member, NewBook, NewMember};
pub use store::SqliteStore;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
