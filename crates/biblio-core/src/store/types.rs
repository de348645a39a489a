//! Core data types for the record store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LibraryConfig;
use crate::error::{BiblioError, Result};
use crate::penalty;

/// Lifecycle state of a loan: `Borrowed` until returned, then `Returned`
/// (terminal).
///
/// "Overdue" is deliberately not a stored state. It is derived by
/// comparing a borrowed loan's due date against the current date, so the
/// two representations can never diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Borrowed => "Borrowed",
            LoanStatus::Returned => "Returned",
        }
    }

    pub(crate) fn parse(value: &str) -> Result<Self> {
        match value {
            "Borrowed" => Ok(LoanStatus::Borrowed),
            "Returned" => Ok(LoanStatus::Returned),
            other => Err(BiblioError::Storage(format!(
                "Invalid loan status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A title in the catalog.
///
/// `quantity` counts copies currently available for loan. It is a derived
/// counter kept in lockstep with the loan table by the lifecycle engine;
/// callers must not mutate it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub isbn: String,
    pub quantity: u32,
}

/// A registered member.
///
/// `books_loaned` mirrors the count of the member's loans with status
/// `Borrowed`, maintained by the lifecycle engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub membership_type: String,
    pub join_date: NaiveDate,
    pub books_loaned: u32,
}

/// A borrow/return record linking exactly one book to one member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,

    /// Fee frozen at return time; zero while the loan is out.
    pub penalty_fee: Decimal,
}

impl Loan {
    /// Whether this loan is overdue as of `as_of`.
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.status == LoanStatus::Borrowed && self.due_date < as_of
    }

    /// The penalty owed on this loan as of `as_of`.
    ///
    /// For returned loans the stored `penalty_fee` is authoritative and
    /// is never recomputed. For loans still out the penalty accrues live
    /// from the due date.
    pub fn penalty_due(&self, as_of: NaiveDate, config: &LibraryConfig) -> Decimal {
        match self.status {
            LoanStatus::Returned => self.penalty_fee,
            LoanStatus::Borrowed => penalty::live_penalty(
                self.due_date,
                as_of,
                config.penalty_rate,
                config.max_penalty,
            ),
        }
    }
}

/// Input for cataloguing a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub isbn: String,
    pub quantity: u32,
}

impl NewBook {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        isbn: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: None,
            isbn: isbn.into(),
            quantity,
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }
}

/// Input for registering a new member.
///
/// `join_date` defaults to the day the member is added; seeds and imports
/// can backdate it.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub membership_type: String,
    pub join_date: Option<NaiveDate>,
}

impl NewMember {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        membership_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            student_id: None,
            membership_type: membership_type.into(),
            join_date: None,
        }
    }

    pub fn with_student_id(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = Some(student_id.into());
        self
    }

    pub fn with_join_date(mut self, join_date: NaiveDate) -> Self {
        self.join_date = Some(join_date);
        self
    }
}
