//! Raw row types for database queries, before parsing into domain types.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::types::{Book, Loan, LoanStatus, Member};
use crate::error::{BiblioError, Result};

pub(crate) fn parse_uuid(value: &str, field: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| BiblioError::Storage(format!("Invalid {} UUID: {}", field, e)))
}

pub(crate) fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| BiblioError::Storage(format!("Invalid {} date: {}", field, e)))
}

fn parse_counter(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| BiblioError::Storage(format!("Invalid {} counter: {}", field, value)))
}

/// Raw row data from the books table.
#[derive(Debug)]
pub(crate) struct BookRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub isbn: String,
    pub quantity: i64,
}

impl TryFrom<BookRow> for Book {
    type Error = BiblioError;

    fn try_from(row: BookRow) -> Result<Self> {
        Ok(Book {
            id: parse_uuid(&row.id, "book")?,
            title: row.title,
            author: row.author,
            genre: row.genre,
            isbn: row.isbn,
            quantity: parse_counter(row.quantity, "quantity")?,
        })
    }
}

/// Raw row data from the members table.
#[derive(Debug)]
pub(crate) struct MemberRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub membership_type: String,
    pub join_date: String,
    pub books_loaned: i64,
}

impl TryFrom<MemberRow> for Member {
    type Error = BiblioError;

    fn try_from(row: MemberRow) -> Result<Self> {
        Ok(Member {
            id: parse_uuid(&row.id, "member")?,
            name: row.name,
            email: row.email,
            student_id: row.student_id,
            membership_type: row.membership_type,
            join_date: parse_date(&row.join_date, "join_date")?,
            books_loaned: parse_counter(row.books_loaned, "books_loaned")?,
        })
    }
}

/// Raw row data from the transactions table.
#[derive(Debug)]
pub(crate) struct LoanRow {
    pub id: String,
    pub book_id: String,
    pub member_id: String,
    pub borrow_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: String,
    pub penalty_fee: String,
}

impl TryFrom<LoanRow> for Loan {
    type Error = BiblioError;

    fn try_from(row: LoanRow) -> Result<Self> {
        let return_date = row
            .return_date
            .as_deref()
            .map(|value| parse_date(value, "return_date"))
            .transpose()?;
        let penalty_fee = Decimal::from_str(&row.penalty_fee)
            .map_err(|e| BiblioError::Storage(format!("Invalid penalty fee: {}", e)))?;

        Ok(Loan {
            id: parse_uuid(&row.id, "loan")?,
            book_id: parse_uuid(&row.book_id, "book")?,
            member_id: parse_uuid(&row.member_id, "member")?,
            borrow_date: parse_date(&row.borrow_date, "borrow_date")?,
            due_date: parse_date(&row.due_date, "due_date")?,
            return_date,
            status: LoanStatus::parse(&row.status)?,
            penalty_fee,
        })
    }
}
