use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{Duration, Utc};

fn bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_biblio"))
}

fn run(db: &Path, args: &[&str]) -> Output {
    Command::new(bin())
        .arg("--db")
        .arg(db)
        .args(args)
        .output()
        .expect("run biblio")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "command failed: stdout={}, stderr={}",
        stdout(output),
        stderr(output)
    );
}

fn last_token(text: &str) -> String {
    text.split_whitespace()
        .last()
        .expect("expected output token")
        .to_string()
}

fn json_array(output: &Output) -> Vec<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("parse json");
    value.as_array().expect("json array").clone()
}

#[test]
fn test_cli_init_seed_and_listings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");

    let init = run(&db, &["init", "--seed"]);
    assert_success(&init);
    assert!(stdout(&init).contains("Seeded 3 books, 3 members, 3 loans"));

    let books = run(&db, &["books", "--json"]);
    assert_success(&books);
    assert_eq!(json_array(&books).len(), 3);

    let members = run(&db, &["members", "--json"]);
    assert_success(&members);
    assert_eq!(json_array(&members).len(), 3);

    // Exactly one seeded loan is past due; it stays Borrowed in storage
    let overdue = run(&db, &["overdue", "--json"]);
    assert_success(&overdue);
    let loans = json_array(&overdue);
    assert_eq!(loans.len(), 1);
    assert_eq!(
        loans[0].get("status").and_then(|v| v.as_str()),
        Some("Borrowed")
    );
    assert_eq!(loans[0].get("overdue").and_then(|v| v.as_bool()), Some(true));
    // Six days late at 5.00/day
    assert_eq!(
        loans[0].get("penalty_due").and_then(|v| v.as_str()),
        Some("30.00")
    );

    let check = run(&db, &["check"]);
    assert_success(&check);
    assert!(stdout(&check).contains("Integrity check: OK"));
}

#[test]
fn test_cli_add_borrow_return_flow() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    assert_success(&run(&db, &["init"]));

    let add_book = run(
        &db,
        &[
            "add-book",
            "--title",
            "Dune",
            "--author",
            "Frank Herbert",
            "--isbn",
            "978-0441013593",
            "--quantity",
            "1",
        ],
    );
    assert_success(&add_book);
    let book_id = last_token(stdout(&add_book).trim());

    let add_member = run(
        &db,
        &["add-member", "--name", "Alice", "--email", "alice@example.org"],
    );
    assert_success(&add_member);
    let member_id = last_token(stdout(&add_member).trim());

    let borrow = run(&db, &["borrow", &book_id, &member_id]);
    assert_success(&borrow);
    assert!(stdout(&borrow).contains("Borrowed \"Dune\" for Alice"));
    let loan_id = last_token(stdout(&borrow).trim());

    // The only copy is out
    let add_other = run(
        &db,
        &["add-member", "--name", "Bob", "--email", "bob@example.org"],
    );
    assert_success(&add_other);
    let other_id = last_token(stdout(&add_other).trim());
    let refused = run(&db, &["borrow", &book_id, &other_id]);
    assert!(!refused.status.success());
    assert!(stderr(&refused).contains("Unavailable"));

    let returned = run(&db, &["return", &loan_id]);
    assert_success(&returned);
    assert!(stdout(&returned).contains("penalty 0"));

    let double = run(&db, &["return", &loan_id]);
    assert!(!double.status.success());
    assert!(stderr(&double).contains("Already returned"));

    let books = run(&db, &["books", "--json"]);
    assert_success(&books);
    let list = json_array(&books);
    assert_eq!(list[0].get("quantity").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn test_cli_overdue_penalty_is_capped_and_frozen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    assert_success(&run(&db, &["init"]));

    let add_book = run(
        &db,
        &[
            "add-book",
            "--title",
            "Dune",
            "--author",
            "Frank Herbert",
            "--isbn",
            "978-0441013593",
        ],
    );
    assert_success(&add_book);
    let book_id = last_token(stdout(&add_book).trim());
    let add_member = run(
        &db,
        &["add-member", "--name", "Alice", "--email", "alice@example.org"],
    );
    assert_success(&add_member);
    let member_id = last_token(stdout(&add_member).trim());
    assert_success(&run(&db, &["borrow", &book_id, &member_id]));

    // Backdate the loan so it is ten days overdue
    let today = Utc::now().date_naive();
    let conn = rusqlite::Connection::open(&db).expect("open database");
    conn.execute(
        "UPDATE transactions SET borrow_date = ?, due_date = ?",
        (
            (today - Duration::days(24)).format("%Y-%m-%d").to_string(),
            (today - Duration::days(10)).format("%Y-%m-%d").to_string(),
        ),
    )
    .expect("backdate loan");
    drop(conn);

    let overdue = run(&db, &["overdue", "--json"]);
    assert_success(&overdue);
    let loans = json_array(&overdue);
    assert_eq!(loans.len(), 1);
    assert_eq!(
        loans[0].get("penalty_due").and_then(|v| v.as_str()),
        Some("50.00")
    );
    let loan_id = loans[0]
        .get("id")
        .and_then(|v| v.as_str())
        .expect("loan id")
        .to_string();

    let returned = run(&db, &["return", &loan_id]);
    assert_success(&returned);
    assert!(stdout(&returned).contains("penalty 50.00"));

    // The frozen fee is what every later read reports
    let loans_after = run(&db, &["loans", "--json"]);
    assert_success(&loans_after);
    let list = json_array(&loans_after);
    assert_eq!(
        list[0].get("status").and_then(|v| v.as_str()),
        Some("Returned")
    );
    assert_eq!(
        list[0].get("penalty_fee").and_then(|v| v.as_str()),
        Some("50.00")
    );
    assert_eq!(
        list[0].get("penalty_due").and_then(|v| v.as_str()),
        Some("50.00")
    );
}

#[test]
fn test_cli_duplicate_isbn_and_email_domain() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    assert_success(&run(&db, &["init"]));

    let args = [
        "add-book",
        "--title",
        "Dune",
        "--author",
        "Frank Herbert",
        "--isbn",
        "978-0441013593",
    ];
    assert_success(&run(&db, &args));
    let duplicate = run(&db, &args);
    assert!(!duplicate.status.success());
    assert!(stderr(&duplicate).contains("Conflict"));

    // Bare local part picks up the configured domain
    assert_success(&run(
        &db,
        &["add-member", "--name", "Bob", "--email", "bob"],
    ));
    let members = run(&db, &["members", "--json"]);
    assert_success(&members);
    let list = json_array(&members);
    assert_eq!(
        list[0].get("email").and_then(|v| v.as_str()),
        Some("bob@library.local")
    );
}

#[test]
fn test_cli_check_detects_tampered_counter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    assert_success(&run(&db, &["init", "--seed"]));

    let conn = rusqlite::Connection::open(&db).expect("open database");
    conn.execute("UPDATE members SET books_loaned = books_loaned + 1", [])
        .expect("tamper");
    drop(conn);

    let check = run(&db, &["check"]);
    assert!(!check.status.success());
    assert!(stderr(&check).contains("Integrity check: FAILED"));
}

#[test]
fn test_cli_history_for_seeded_member() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    assert_success(&run(&db, &["init", "--seed"]));

    let members = run(&db, &["members", "--json"]);
    assert_success(&members);
    let john = json_array(&members)
        .into_iter()
        .find(|m| m.get("name").and_then(|v| v.as_str()) == Some("John Smith"))
        .expect("seeded member");
    let member_id = john
        .get("id")
        .and_then(|v| v.as_str())
        .expect("member id")
        .to_string();

    let history = run(&db, &["history", "--member", &member_id, "--json"]);
    assert_success(&history);
    assert_eq!(json_array(&history).len(), 1);

    let neither = run(&db, &["history"]);
    assert!(!neither.status.success());
}

#[test]
fn test_cli_config_file_overrides() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = dir.path().join("library.db");
    let config_path = dir.path().join("biblio.toml");
    std::fs::write(
        &config_path,
        "[library]\nname = \"Riverside Branch\"\ndomain = \"lib.test\"\n",
    )
    .expect("write config");
    let config = config_path.to_string_lossy().to_string();

    assert_success(&run(&db, &["--config", &config, "init"]));

    let info = run(&db, &["--config", &config, "info", "--json"]);
    assert_success(&info);
    let value: serde_json::Value = serde_json::from_slice(&info.stdout).expect("info json");
    assert_eq!(
        value.get("library_name").and_then(|v| v.as_str()),
        Some("Riverside Branch")
    );

    assert_success(&run(
        &db,
        &["--config", &config, "add-member", "--name", "Carol", "--email", "carol"],
    ));
    let members = run(&db, &["members", "--json"]);
    assert_success(&members);
    assert_eq!(
        json_array(&members)[0].get("email").and_then(|v| v.as_str()),
        Some("carol@lib.test")
    );
}

#[test]
fn test_cli_quickstart_output() {
    let output = Command::new(bin()).output().expect("run biblio");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Quickstart"));
    assert!(text.contains("biblio init"));
}
