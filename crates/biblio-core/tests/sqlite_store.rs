use biblio_core::{BiblioError, Library, LibraryConfig, NewBook, NewMember, SqliteStore};
use chrono::{Duration, Utc};

fn library_at(path: &std::path::Path) -> Library {
    Library::open(path, LibraryConfig::default()).expect("open library")
}

#[test]
fn test_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("library.db");

    let book_id = {
        let library = library_at(&path);
        let book = library
            .add_book(NewBook::new("1984", "George Orwell", "978-0451524935", 2))
            .expect("add book");
        book.id
    };

    let library = library_at(&path);
    let book = library.get_book(&book_id).expect("book persisted");
    assert_eq!(book.title, "1984");
    assert_eq!(book.quantity, 2);
}

#[test]
fn test_search_is_case_insensitive_across_fields() {
    let library = Library::in_memory(LibraryConfig::default()).expect("open library");
    library
        .add_book(
            NewBook::new(
                "The Great Gatsby",
                "F. Scott Fitzgerald",
                "978-0743273565",
                3,
            )
            .with_genre("Classic Fiction"),
        )
        .expect("add book");
    library
        .add_book(NewBook::new("1984", "George Orwell", "978-0451524935", 2))
        .expect("add book");

    assert_eq!(library.search_books("gatsby").expect("search").len(), 1);
    assert_eq!(library.search_books("FITZGERALD").expect("search").len(), 1);
    assert_eq!(library.search_books("classic").expect("search").len(), 1);
    assert_eq!(library.search_books("0743273565").expect("search").len(), 1);
    assert_eq!(library.search_books("978-0").expect("search").len(), 2);
    assert!(library.search_books("austen").expect("search").is_empty());

    // A book with no genre must not match genre searches spuriously
    assert!(library.search_books("fiction").expect("search").len() == 1);

    library
        .add_member(
            NewMember::new("John Smith", "john.smith@lib.test", "Student")
                .with_student_id("STU2024001"),
        )
        .expect("add member");
    assert_eq!(library.search_members("JOHN").expect("search").len(), 1);
    assert_eq!(library.search_members("stu2024").expect("search").len(), 1);
    assert_eq!(library.search_members("lib.test").expect("search").len(), 1);
    assert!(library.search_members("sarah").expect("search").is_empty());
}

#[test]
fn test_update_book_rechecks_isbn_uniqueness() {
    let library = Library::in_memory(LibraryConfig::default()).expect("open library");
    let orwell = library
        .add_book(NewBook::new("1984", "George Orwell", "978-0451524935", 2))
        .expect("add book");
    let gatsby = library
        .add_book(NewBook::new(
            "The Great Gatsby",
            "F. Scott Fitzgerald",
            "978-0743273565",
            3,
        ))
        .expect("add book");

    let mut edited = gatsby.clone();
    edited.isbn = orwell.isbn.clone();
    assert!(matches!(
        library.update_book(&edited).unwrap_err(),
        BiblioError::Conflict(_)
    ));

    // Keeping its own ISBN while editing other fields is fine
    let mut renamed = gatsby.clone();
    renamed.title = "The Great Gatsby (annotated)".to_string();
    library.update_book(&renamed).expect("update");
    assert_eq!(
        library.get_book(&gatsby.id).expect("book").title,
        "The Great Gatsby (annotated)"
    );
}

#[test]
fn test_set_quantity_and_missing_ids() {
    let library = Library::in_memory(LibraryConfig::default()).expect("open library");
    let book = library
        .add_book(NewBook::new("1984", "George Orwell", "978-0451524935", 2))
        .expect("add book");

    library.set_book_quantity(&book.id, 7).expect("set quantity");
    assert_eq!(library.get_book(&book.id).expect("book").quantity, 7);

    let ghost = uuid::Uuid::new_v4();
    assert!(matches!(
        library.set_book_quantity(&ghost, 1).unwrap_err(),
        BiblioError::NotFound(_)
    ));
    assert!(matches!(
        library.delete_book(&ghost).unwrap_err(),
        BiblioError::NotFound(_)
    ));
}

#[test]
fn test_empty_required_fields_fail_validation() {
    let library = Library::in_memory(LibraryConfig::default()).expect("open library");

    assert!(matches!(
        library
            .add_book(NewBook::new("", "George Orwell", "978-0451524935", 1))
            .unwrap_err(),
        BiblioError::Validation(_)
    ));
    assert!(matches!(
        library
            .add_book(NewBook::new("1984", "George Orwell", "  ", 1))
            .unwrap_err(),
        BiblioError::Validation(_)
    ));
    assert!(matches!(
        library
            .add_member(NewMember::new("", "alice", "Student"))
            .unwrap_err(),
        BiblioError::Validation(_)
    ));
    assert!(matches!(
        library
            .add_member(NewMember::new("Alice", "alice", ""))
            .unwrap_err(),
        BiblioError::Validation(_)
    ));
}

#[test]
fn test_integrity_check_catches_a_tampered_counter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("library.db");

    let library = library_at(&path);
    let book = library
        .add_book(NewBook::new("1984", "George Orwell", "978-0451524935", 2))
        .expect("add book");
    let member = library
        .add_member(NewMember::new("Alice", "alice", "Student"))
        .expect("add member");
    library
        .borrow_on(&book.id, &member.id, Utc::now().date_naive() - Duration::days(1))
        .expect("borrow");
    library.check_integrity().expect("healthy store");
    drop(library);

    // Bump the counter behind the engine's back
    let conn = rusqlite::Connection::open(&path).expect("open raw connection");
    conn.execute("UPDATE members SET books_loaned = books_loaned + 1", [])
        .expect("tamper");
    drop(conn);

    let library = library_at(&path);
    assert!(matches!(
        library.check_integrity().unwrap_err(),
        BiblioError::Integrity(_)
    ));
}

#[test]
fn test_store_can_be_used_directly() {
    let store = SqliteStore::open_in_memory().expect("open store");
    assert!(store.list_books().expect("books").is_empty());
    assert!(store.list_members().expect("members").is_empty());
    assert!(store.list_loans().expect("loans").is_empty());
    store.check_integrity().expect("empty store is consistent");
}
