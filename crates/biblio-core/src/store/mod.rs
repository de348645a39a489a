//! SQLite-backed record store.
//!
//! Durable storage for books, members, and loans. The store owns
//! unique-key enforcement (ISBN, email) and referential integrity; the
//! lifecycle engine in [`crate::library`] owns loan state and the derived
//! counters. Multi-statement mutations run inside a scoped SQL
//! transaction so a failure rolls back every partial effect.
//!
//! Deleting a book or member cascade-deletes its loan history (foreign
//! keys with `ON DELETE CASCADE`); there are never orphan loans.

mod row;
pub mod types;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{BiblioError, Result};
use row::{BookRow, LoanRow, MemberRow};
use types::{Book, Loan, Member};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    genre TEXT,
    isbn TEXT NOT NULL UNIQUE,
    quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0)
);

CREATE TABLE IF NOT EXISTS members (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    student_id TEXT,
    membership_type TEXT NOT NULL,
    join_date TEXT NOT NULL,
    books_loaned INTEGER NOT NULL DEFAULT 0 CHECK (books_loaned >= 0)
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    book_id TEXT NOT NULL,
    member_id TEXT NOT NULL,
    borrow_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    return_date TEXT,
    status TEXT NOT NULL,
    penalty_fee TEXT NOT NULL,

    FOREIGN KEY(book_id) REFERENCES books(id) ON DELETE CASCADE,
    FOREIGN KEY(member_id) REFERENCES members(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS transactions_book_id ON transactions(book_id);
CREATE INDEX IF NOT EXISTS transactions_member_id ON transactions(member_id);
"#;

const BOOK_COLUMNS: &str = "id, title, author, genre, isbn, quantity";
const MEMBER_COLUMNS: &str =
    "id, name, email, student_id, membership_type, join_date, books_loaned";
const LOAN_COLUMNS: &str =
    "id, book_id, member_id, borrow_date, due_date, return_date, status, penalty_fee";

/// SQLite record store for the library.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `path`, creating file and schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a fresh in-memory store. Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the database connection, returning an error if the mutex is
    /// poisoned.
    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BiblioError::Storage("SQLite connection poisoned".to_string()))
    }

    // --- Book operations ---

    /// Insert a new book.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty title/author/ISBN and `Conflict`
    /// when the ISBN is already catalogued.
    pub fn insert_book(&self, book: &Book) -> Result<()> {
        if book.title.trim().is_empty() {
            return Err(BiblioError::Validation("Book title is required".to_string()));
        }
        if book.author.trim().is_empty() {
            return Err(BiblioError::Validation(
                "Book author is required".to_string(),
            ));
        }
        if book.isbn.trim().is_empty() {
            return Err(BiblioError::Validation("Book ISBN is required".to_string()));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row("SELECT id FROM books WHERE isbn = ?", [&book.isbn], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(BiblioError::Conflict(format!(
                "ISBN {} is already catalogued",
                book.isbn
            )));
        }

        tx.execute(
            "INSERT INTO books (id, title, author, genre, isbn, quantity) VALUES (?, ?, ?, ?, ?, ?)",
            (
                book.id.to_string(),
                &book.title,
                &book.author,
                &book.genre,
                &book.isbn,
                i64::from(book.quantity),
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get a book by id, `Ok(None)` if not found.
    pub fn get_book(&self, id: &Uuid) -> Result<Option<Book>> {
        let conn = self.lock_conn()?;
        fetch_book(&conn, id)
    }

    /// List all books ordered by title.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM books ORDER BY title",
            BOOK_COLUMNS
        ))?;
        let rows = stmt.query_map([], book_row)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(Book::try_from(row?)?);
        }
        Ok(books)
    }

    /// Case-insensitive substring search over title, author, genre, and
    /// ISBN, OR-combined.
    pub fn search_books(&self, query: &str) -> Result<Vec<Book>> {
        let pattern = like_pattern(query);
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM books \
             WHERE lower(title) LIKE ?1 \
                OR lower(author) LIKE ?1 \
                OR lower(coalesce(genre, '')) LIKE ?1 \
                OR lower(isbn) LIKE ?1 \
             ORDER BY title",
            BOOK_COLUMNS
        ))?;
        let rows = stmt.query_map([pattern], book_row)?;

        let mut books = Vec::new();
        for row in rows {
            books.push(Book::try_from(row?)?);
        }
        Ok(books)
    }

    /// Update a book's catalog fields (not its quantity counter).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` when the new
    /// ISBN belongs to a different book.
    pub fn update_book(&self, book: &Book) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM books WHERE id = ?",
                [book.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(BiblioError::NotFound(format!("Book {} not found", book.id)));
        }

        let conflict: Option<String> = tx
            .query_row(
                "SELECT id FROM books WHERE isbn = ? AND id != ?",
                (&book.isbn, book.id.to_string()),
                |row| row.get(0),
            )
            .optional()?;
        if conflict.is_some() {
            return Err(BiblioError::Conflict(format!(
                "ISBN {} is already catalogued",
                book.isbn
            )));
        }

        tx.execute(
            "UPDATE books SET title = ?, author = ?, genre = ?, isbn = ? WHERE id = ?",
            (
                &book.title,
                &book.author,
                &book.genre,
                &book.isbn,
                book.id.to_string(),
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Set a book's available-copy count directly (stock correction).
    pub fn set_book_quantity(&self, id: &Uuid, quantity: u32) -> Result<()> {
        let conn = self.lock_conn()?;
        let updated = update_quantity(&conn, id, quantity)?;
        if updated == 0 {
            return Err(BiblioError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }

    /// Delete a book. Cascade-deletes its loan history.
    pub fn delete_book(&self, id: &Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute("DELETE FROM books WHERE id = ?", [id.to_string()])?;
        if deleted == 0 {
            return Err(BiblioError::NotFound(format!("Book {} not found", id)));
        }
        Ok(())
    }

    // --- Member operations ---

    /// Insert a new member.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty name/email/membership type and
    /// `Conflict` when the email is already registered.
    pub fn insert_member(&self, member: &Member) -> Result<()> {
        if member.name.trim().is_empty() {
            return Err(BiblioError::Validation(
                "Member name is required".to_string(),
            ));
        }
        if member.email.trim().is_empty() {
            return Err(BiblioError::Validation(
                "Member email is required".to_string(),
            ));
        }
        if member.membership_type.trim().is_empty() {
            return Err(BiblioError::Validation(
                "Membership type is required".to_string(),
            ));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM members WHERE email = ?",
                [&member.email],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(BiblioError::Conflict(format!(
                "Email {} is already registered",
                member.email
            )));
        }

        tx.execute(
            "INSERT INTO members (id, name, email, student_id, membership_type, join_date, books_loaned) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                member.id.to_string(),
                &member.name,
                &member.email,
                &member.student_id,
                &member.membership_type,
                date_text(member.join_date),
                i64::from(member.books_loaned),
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get a member by id, `Ok(None)` if not found.
    pub fn get_member(&self, id: &Uuid) -> Result<Option<Member>> {
        let conn = self.lock_conn()?;
        fetch_member(&conn, id)
    }

    /// List all members ordered by name.
    pub fn list_members(&self) -> Result<Vec<Member>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM members ORDER BY name",
            MEMBER_COLUMNS
        ))?;
        let rows = stmt.query_map([], member_row)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(Member::try_from(row?)?);
        }
        Ok(members)
    }

    /// Case-insensitive substring search over name, email, and student
    /// id, OR-combined.
    pub fn search_members(&self, query: &str) -> Result<Vec<Member>> {
        let pattern = like_pattern(query);
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM members \
             WHERE lower(name) LIKE ?1 \
                OR lower(email) LIKE ?1 \
                OR lower(coalesce(student_id, '')) LIKE ?1 \
             ORDER BY name",
            MEMBER_COLUMNS
        ))?;
        let rows = stmt.query_map([pattern], member_row)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(Member::try_from(row?)?);
        }
        Ok(members)
    }

    /// Update a member's profile fields (not the loan counter).
    pub fn update_member(&self, member: &Member) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM members WHERE id = ?",
                [member.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(BiblioError::NotFound(format!(
                "Member {} not found",
                member.id
            )));
        }

        let conflict: Option<String> = tx
            .query_row(
                "SELECT id FROM members WHERE email = ? AND id != ?",
                (&member.email, member.id.to_string()),
                |row| row.get(0),
            )
            .optional()?;
        if conflict.is_some() {
            return Err(BiblioError::Conflict(format!(
                "Email {} is already registered",
                member.email
            )));
        }

        tx.execute(
            "UPDATE members SET name = ?, email = ?, student_id = ?, membership_type = ? WHERE id = ?",
            (
                &member.name,
                &member.email,
                &member.student_id,
                &member.membership_type,
                member.id.to_string(),
            ),
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Delete a member. Cascade-deletes their loan history.
    pub fn delete_member(&self, id: &Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute("DELETE FROM members WHERE id = ?", [id.to_string()])?;
        if deleted == 0 {
            return Err(BiblioError::NotFound(format!("Member {} not found", id)));
        }
        Ok(())
    }

    // --- Loan queries ---

    /// Get a loan by id, `Ok(None)` if not found.
    pub fn get_loan(&self, id: &Uuid) -> Result<Option<Loan>> {
        let conn = self.lock_conn()?;
        fetch_loan(&conn, id)
    }

    /// List all loans, most recent borrow first.
    pub fn list_loans(&self) -> Result<Vec<Loan>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions ORDER BY borrow_date DESC",
            LOAN_COLUMNS
        ))?;
        let loans = collect_loans(stmt.query_map([], loan_row)?);
        loans
    }

    /// All loans for a member, most recent borrow first.
    pub fn loans_for_member(&self, member_id: &Uuid) -> Result<Vec<Loan>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE member_id = ? ORDER BY borrow_date DESC",
            LOAN_COLUMNS
        ))?;
        let loans = collect_loans(stmt.query_map([member_id.to_string()], loan_row)?);
        loans
    }

    /// All loans for a book, most recent borrow first.
    pub fn loans_for_book(&self, book_id: &Uuid) -> Result<Vec<Loan>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE book_id = ? ORDER BY borrow_date DESC",
            LOAN_COLUMNS
        ))?;
        let loans = collect_loans(stmt.query_map([book_id.to_string()], loan_row)?);
        loans
    }

    /// Borrowed loans whose due date has passed as of `as_of`, earliest
    /// due first.
    pub fn overdue_loans(&self, as_of: NaiveDate) -> Result<Vec<Loan>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions \
             WHERE status = 'Borrowed' AND due_date < ? \
             ORDER BY due_date",
            LOAN_COLUMNS
        ))?;
        let loans = collect_loans(stmt.query_map([date_text(as_of)], loan_row)?);
        loans
    }

    // --- Maintenance ---

    /// Check store integrity.
    ///
    /// Verifies foreign keys, that every member's `books_loaned` equals
    /// the count of their `Borrowed` loans, and that loan status and
    /// return dates agree.
    pub fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(BiblioError::Integrity(
                "Foreign key check failed".to_string(),
            ));
        }

        let desynced: Option<String> = conn
            .query_row(
                "SELECT m.id FROM members m \
                 WHERE m.books_loaned != ( \
                     SELECT COUNT(*) FROM transactions t \
                     WHERE t.member_id = m.id AND t.status = 'Borrowed' \
                 ) LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(member_id) = desynced {
            return Err(BiblioError::Integrity(format!(
                "Member {} loan counter disagrees with the loan table",
                member_id
            )));
        }

        let bad_status: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE status NOT IN ('Borrowed', 'Returned')",
            [],
            |row| row.get(0),
        )?;
        if bad_status > 0 {
            return Err(BiblioError::Integrity(
                "Loans with an unknown status".to_string(),
            ));
        }

        let date_mismatch: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions \
             WHERE (status = 'Returned' AND return_date IS NULL) \
                OR (status = 'Borrowed' AND return_date IS NOT NULL)",
            [],
            |row| row.get(0),
        )?;
        if date_mismatch > 0 {
            return Err(BiblioError::Integrity(
                "Loan status and return date disagree".to_string(),
            ));
        }

        Ok(())
    }
}

fn like_pattern(query: &str) -> String {
    format!("%{}%", query.to_lowercase())
}

pub(crate) fn date_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn book_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookRow> {
    Ok(BookRow {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        genre: row.get(3)?,
        isbn: row.get(4)?,
        quantity: row.get(5)?,
    })
}

fn member_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        student_id: row.get(3)?,
        membership_type: row.get(4)?,
        join_date: row.get(5)?,
        books_loaned: row.get(6)?,
    })
}

fn loan_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoanRow> {
    Ok(LoanRow {
        id: row.get(0)?,
        book_id: row.get(1)?,
        member_id: row.get(2)?,
        borrow_date: row.get(3)?,
        due_date: row.get(4)?,
        return_date: row.get(5)?,
        status: row.get(6)?,
        penalty_fee: row.get(7)?,
    })
}

fn collect_loans(rows: impl Iterator<Item = rusqlite::Result<LoanRow>>) -> Result<Vec<Loan>> {
    let mut loans = Vec::new();
    for row in rows {
        loans.push(Loan::try_from(row?)?);
    }
    Ok(loans)
}

// Row-level helpers over an open connection or transaction. The engine
// composes these inside a single SQL transaction so its read-check-mutate
// sequences commit or roll back as one unit.

pub(crate) fn fetch_book(conn: &Connection, id: &Uuid) -> Result<Option<Book>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS),
            [id.to_string()],
            book_row,
        )
        .optional()?;
    row.map(Book::try_from).transpose()
}

pub(crate) fn fetch_member(conn: &Connection, id: &Uuid) -> Result<Option<Member>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE id = ?", MEMBER_COLUMNS),
            [id.to_string()],
            member_row,
        )
        .optional()?;
    row.map(Member::try_from).transpose()
}

pub(crate) fn fetch_loan(conn: &Connection, id: &Uuid) -> Result<Option<Loan>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?", LOAN_COLUMNS),
            [id.to_string()],
            loan_row,
        )
        .optional()?;
    row.map(Loan::try_from).transpose()
}

pub(crate) fn insert_loan(conn: &Connection, loan: &Loan) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions \
         (id, book_id, member_id, borrow_date, due_date, return_date, status, penalty_fee) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            loan.id.to_string(),
            loan.book_id.to_string(),
            loan.member_id.to_string(),
            date_text(loan.borrow_date),
            date_text(loan.due_date),
            loan.return_date.map(date_text),
            loan.status.as_str(),
            loan.penalty_fee.to_string(),
        ),
    )?;
    Ok(())
}

pub(crate) fn finalize_loan_return(conn: &Connection, loan: &Loan) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET return_date = ?, status = ?, penalty_fee = ? WHERE id = ?",
        (
            loan.return_date.map(date_text),
            loan.status.as_str(),
            loan.penalty_fee.to_string(),
            loan.id.to_string(),
        ),
    )?;
    Ok(())
}

pub(crate) fn update_quantity(conn: &Connection, book_id: &Uuid, quantity: u32) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE books SET quantity = ? WHERE id = ?",
        (i64::from(quantity), book_id.to_string()),
    )?;
    Ok(updated)
}

pub(crate) fn update_loan_count(conn: &Connection, member_id: &Uuid, count: u32) -> Result<usize> {
    let updated = conn.execute(
        "UPDATE members SET books_loaned = ? WHERE id = ?",
        (i64::from(count), member_id.to_string()),
    )?;
    Ok(updated)
}
