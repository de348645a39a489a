//! Loan lifecycle engine and query layer.
//!
//! [`Library`] is the single entry point for every operation that touches
//! loan state. Borrow and return each run their read-check-mutate
//! sequence inside one SQL transaction behind the store's connection
//! lock, so the derived counters (`Book::quantity`,
//! `Member::books_loaned`) can never drift from the loan table: either
//! every effect commits or none do.

use std::path::Path;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::{LibraryConfig, SystemInfo};
use crate::error::{BiblioError, Result};
use crate::penalty;
use crate::store::types::{Book, Loan, LoanStatus, Member, NewBook, NewMember};
use crate::store::{self, SqliteStore};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// The loan lifecycle engine.
pub struct Library {
    store: SqliteStore,
    config: LibraryConfig,
}

impl Library {
    pub fn new(store: SqliteStore, config: LibraryConfig) -> Self {
        Self { store, config }
    }

    /// Open (creating if missing) the library database at `path`.
    pub fn open(path: &Path, config: LibraryConfig) -> Result<Self> {
        Ok(Self::new(SqliteStore::open(path)?, config))
    }

    /// Open a fresh in-memory library. Used by tests.
    pub fn in_memory(config: LibraryConfig) -> Result<Self> {
        Ok(Self::new(SqliteStore::open_in_memory()?, config))
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    // --- Catalog and membership ---

    /// Catalog a new book.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the ISBN is already catalogued.
    pub fn add_book(&self, new_book: NewBook) -> Result<Book> {
        let book = Book {
            id: Uuid::new_v4(),
            title: new_book.title,
            author: new_book.author,
            genre: new_book.genre,
            isbn: new_book.isbn,
            quantity: new_book.quantity,
        };
        self.store.insert_book(&book)?;
        tracing::debug!(book_id = %book.id, isbn = %book.isbn, "book catalogued");
        Ok(book)
    }

    /// Register a new member.
    ///
    /// An email submitted without an "@" is completed with the configured
    /// domain before the uniqueness check.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the resulting email is already registered.
    pub fn add_member(&self, new_member: NewMember) -> Result<Member> {
        let member = Member {
            id: Uuid::new_v4(),
            name: new_member.name,
            email: self.complete_email(&new_member.email),
            student_id: new_member.student_id,
            membership_type: new_member.membership_type,
            join_date: new_member.join_date.unwrap_or_else(today),
            books_loaned: 0,
        };
        self.store.insert_member(&member)?;
        tracing::debug!(member_id = %member.id, email = %member.email, "member registered");
        Ok(member)
    }

    fn complete_email(&self, email: &str) -> String {
        if email.contains('@') {
            email.to_string()
        } else {
            format!("{}@{}", email, self.config.domain)
        }
    }

    pub fn get_book(&self, id: &Uuid) -> Result<Book> {
        self.store
            .get_book(id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Book {} not found", id)))
    }

    pub fn get_member(&self, id: &Uuid) -> Result<Member> {
        self.store
            .get_member(id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Member {} not found", id)))
    }

    pub fn get_loan(&self, id: &Uuid) -> Result<Loan> {
        self.store
            .get_loan(id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Loan {} not found", id)))
    }

    pub fn list_books(&self) -> Result<Vec<Book>> {
        self.store.list_books()
    }

    pub fn list_members(&self) -> Result<Vec<Member>> {
        self.store.list_members()
    }

    pub fn list_loans(&self) -> Result<Vec<Loan>> {
        self.store.list_loans()
    }

    /// Update a book's catalog fields. The quantity counter is engine
    /// state and is not touched here; see [`Library::set_book_quantity`].
    pub fn update_book(&self, book: &Book) -> Result<Book> {
        self.store.update_book(book)?;
        Ok(book.clone())
    }

    /// Update a member's profile. Emails are completed with the
    /// configured domain the same way as on registration.
    pub fn update_member(&self, member: &Member) -> Result<Member> {
        let mut updated = member.clone();
        updated.email = self.complete_email(&member.email);
        self.store.update_member(&updated)?;
        Ok(updated)
    }

    /// Correct a book's available-copy count (new stock, lost copies).
    pub fn set_book_quantity(&self, id: &Uuid, quantity: u32) -> Result<()> {
        self.store.set_book_quantity(id, quantity)
    }

    /// Delete a book and, by cascade, its loan history.
    pub fn delete_book(&self, id: &Uuid) -> Result<()> {
        self.store.delete_book(id)?;
        tracing::info!(book_id = %id, "book deleted with loan history");
        Ok(())
    }

    /// Delete a member and, by cascade, their loan history.
    pub fn delete_member(&self, id: &Uuid) -> Result<()> {
        self.store.delete_member(id)?;
        tracing::info!(member_id = %id, "member deleted with loan history");
        Ok(())
    }

    // --- Loan lifecycle ---

    /// Borrow a book for a member, dated today.
    pub fn borrow(&self, book_id: &Uuid, member_id: &Uuid) -> Result<Loan> {
        self.borrow_on(book_id, member_id, today())
    }

    /// Borrow a book for a member, dated `borrow_date`.
    ///
    /// Preconditions, first failure wins: the book exists (`NotFound`),
    /// the member exists (`NotFound`), a copy is available
    /// (`Unavailable`), and the member is under the loan cap
    /// (`LimitExceeded`). On success the loan insert, quantity decrement,
    /// and loan-counter increment commit as one transaction.
    pub fn borrow_on(
        &self,
        book_id: &Uuid,
        member_id: &Uuid,
        borrow_date: NaiveDate,
    ) -> Result<Loan> {
        let mut conn = self.store.lock_conn()?;
        let tx = conn.transaction()?;

        let book = store::fetch_book(&tx, book_id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Book {} not found", book_id)))?;
        let member = store::fetch_member(&tx, member_id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Member {} not found", member_id)))?;

        if book.quantity == 0 {
            return Err(BiblioError::Unavailable(format!(
                "No copies of \"{}\" available",
                book.title
            )));
        }
        if member.books_loaned >= self.config.max_books_per_member {
            return Err(BiblioError::LimitExceeded(format!(
                "{} has reached the maximum of {} borrowed books",
                member.name, self.config.max_books_per_member
            )));
        }

        let loan = Loan {
            id: Uuid::new_v4(),
            book_id: book.id,
            member_id: member.id,
            borrow_date,
            due_date: borrow_date + Duration::days(self.config.loan_period_days),
            return_date: None,
            status: LoanStatus::Borrowed,
            penalty_fee: Decimal::ZERO,
        };
        store::insert_loan(&tx, &loan)?;
        store::update_quantity(&tx, &book.id, book.quantity - 1)?;
        store::update_loan_count(&tx, &member.id, member.books_loaned + 1)?;
        tx.commit()?;

        tracing::info!(
            loan_id = %loan.id,
            book = %book.title,
            member = %member.name,
            due = %loan.due_date,
            "book borrowed"
        );
        Ok(loan)
    }

    /// Return a loan, dated today.
    pub fn return_book(&self, loan_id: &Uuid) -> Result<Loan> {
        self.return_book_on(loan_id, today())
    }

    /// Return a loan, dated `return_date`.
    ///
    /// The overdue penalty is computed against the due date and frozen
    /// into the loan; from then on the stored fee is authoritative. The
    /// status flip, fee freeze, quantity increment, and loan-counter
    /// decrement commit as one transaction. A loan counter already at
    /// zero means the counters have desynced from the loan table and the
    /// whole return fails with `Integrity`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown loan and `AlreadyReturned` if
    /// the loan is closed.
    pub fn return_book_on(&self, loan_id: &Uuid, return_date: NaiveDate) -> Result<Loan> {
        let mut conn = self.store.lock_conn()?;
        let tx = conn.transaction()?;

        let loan = store::fetch_loan(&tx, loan_id)?
            .ok_or_else(|| BiblioError::NotFound(format!("Loan {} not found", loan_id)))?;
        if loan.status == LoanStatus::Returned {
            return Err(BiblioError::AlreadyReturned(format!(
                "Loan {} was already returned",
                loan_id
            )));
        }

        // Cascade rules guarantee both ends of an open loan still exist.
        let book = store::fetch_book(&tx, &loan.book_id)?.ok_or_else(|| {
            BiblioError::Integrity(format!("Loan {} references a missing book", loan_id))
        })?;
        let member = store::fetch_member(&tx, &loan.member_id)?.ok_or_else(|| {
            BiblioError::Integrity(format!("Loan {} references a missing member", loan_id))
        })?;
        if member.books_loaned == 0 {
            return Err(BiblioError::Integrity(format!(
                "Member {} has an open loan but a zero loan counter",
                member.id
            )));
        }

        let fee = penalty::live_penalty(
            loan.due_date,
            return_date,
            self.config.penalty_rate,
            self.config.max_penalty,
        );
        let returned = Loan {
            return_date: Some(return_date),
            status: LoanStatus::Returned,
            penalty_fee: fee,
            ..loan
        };
        store::finalize_loan_return(&tx, &returned)?;
        store::update_quantity(&tx, &book.id, book.quantity + 1)?;
        store::update_loan_count(&tx, &member.id, member.books_loaned - 1)?;
        tx.commit()?;

        tracing::info!(
            loan_id = %returned.id,
            book = %book.title,
            member = %member.name,
            penalty = %returned.penalty_fee,
            "book returned"
        );
        Ok(returned)
    }

    // --- Reporting ---

    /// Borrowed loans past their due date as of `as_of`.
    pub fn overdue_loans(&self, as_of: NaiveDate) -> Result<Vec<Loan>> {
        self.store.overdue_loans(as_of)
    }

    /// A member's full loan history, most recent borrow first.
    pub fn member_history(&self, member_id: &Uuid) -> Result<Vec<Loan>> {
        self.get_member(member_id)?;
        self.store.loans_for_member(member_id)
    }

    /// A book's full loan history, most recent borrow first.
    pub fn book_history(&self, book_id: &Uuid) -> Result<Vec<Loan>> {
        self.get_book(book_id)?;
        self.store.loans_for_book(book_id)
    }

    pub fn search_books(&self, query: &str) -> Result<Vec<Book>> {
        self.store.search_books(query)
    }

    pub fn search_members(&self, query: &str) -> Result<Vec<Member>> {
        self.store.search_members(query)
    }

    /// Verify the store's invariants; see [`SqliteStore::check_integrity`].
    pub fn check_integrity(&self) -> Result<()> {
        self.store.check_integrity()
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            library_name: self.config.library_name.clone(),
            domain: self.config.domain.clone(),
            version: crate::VERSION.to_string(),
            loan_period_days: self.config.loan_period_days,
            max_books_per_member: self.config.max_books_per_member,
            penalty_rate: self.config.penalty_rate,
            max_penalty: self.config.max_penalty,
        }
    }

    /// Load a small sample data set: three books, three members, one
    /// overdue loan, one current loan, one returned loan.
    ///
    /// Loans are driven through the engine rather than inserted raw so
    /// the derived counters stay truthful. Fails with `Conflict` if the
    /// sample records already exist.
    pub fn seed_sample_data(&self) -> Result<()> {
        let now = today();

        let gatsby = self.add_book(
            NewBook::new(
                "The Great Gatsby",
                "F. Scott Fitzgerald",
                "978-0743273565",
                3,
            )
            .with_genre("Classic Fiction"),
        )?;
        let orwell = self.add_book(
            NewBook::new("1984", "George Orwell", "978-0451524935", 2)
                .with_genre("Science Fiction"),
        )?;
        let mockingbird = self.add_book(
            NewBook::new("To Kill a Mockingbird", "Harper Lee", "978-0446310789", 4)
                .with_genre("Literary Fiction"),
        )?;

        let john = self.add_member(
            NewMember::new("John Smith", "john.smith", "Student")
                .with_student_id("STU2024001")
                .with_join_date(now - Duration::days(120)),
        )?;
        let sarah = self.add_member(
            NewMember::new("Sarah Johnson", "sarah.j", "Faculty")
                .with_join_date(now - Duration::days(200)),
        )?;
        let michael = self.add_member(
            NewMember::new("Michael Brown", "m.brown", "Student")
                .with_student_id("STU2024003")
                .with_join_date(now - Duration::days(90)),
        )?;

        self.borrow_on(&gatsby.id, &john.id, now - Duration::days(20))?;
        self.borrow_on(&orwell.id, &sarah.id, now - Duration::days(10))?;
        let closed = self.borrow_on(&mockingbird.id, &michael.id, now - Duration::days(30))?;
        self.return_book_on(&closed.id, now - Duration::days(17))?;

        Ok(())
    }
}
