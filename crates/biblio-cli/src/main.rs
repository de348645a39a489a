//! Biblio CLI - circulation desk for a library-loan backend.
//!
//! This is a thin adapter over `biblio-core`: it parses arguments, loads
//! configuration, and prints results. Every business rule lives in the
//! core engine.

mod config;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use uuid::Uuid;

use biblio_core::{Book, Library, Loan, LibraryConfig, Member, NewBook, NewMember, VERSION};

/// Biblio - library loan management from the command line
#[derive(Parser)]
#[command(name = "biblio")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the library database
    #[arg(short, long, global = true, env = "BIBLIO_DB")]
    db: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "BIBLIO_CONFIG")]
    config: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the library database
    Init {
        /// Load sample books, members, and loans
        #[arg(long)]
        seed: bool,
    },

    /// Catalog a new book
    AddBook {
        #[arg(long)]
        title: String,

        #[arg(long)]
        author: String,

        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        isbn: String,

        /// Number of copies available for loan
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },

    /// Register a new member
    AddMember {
        #[arg(long)]
        name: String,

        /// Email address; completed with the configured domain if it has no "@"
        #[arg(long)]
        email: String,

        #[arg(long)]
        student_id: Option<String>,

        #[arg(long, default_value = "Standard")]
        membership_type: String,
    },

    /// Borrow a book for a member
    Borrow {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,

        #[arg(value_name = "MEMBER_ID")]
        member_id: String,
    },

    /// Return a borrowed book
    Return {
        #[arg(value_name = "LOAN_ID")]
        loan_id: String,
    },

    /// List books, optionally filtered by a search query
    Books {
        /// Case-insensitive substring over title, author, genre, and ISBN
        #[arg(long)]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List members, optionally filtered by a search query
    Members {
        /// Case-insensitive substring over name, email, and student id
        #[arg(long)]
        search: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all loans
    Loans {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List overdue loans
    Overdue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show loan history for a member or a book
    History {
        #[arg(long, value_name = "MEMBER_ID", conflicts_with = "book")]
        member: Option<String>,

        #[arg(long, value_name = "BOOK_ID")]
        book: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Correct a book's available-copy count
    SetQuantity {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,

        #[arg(value_name = "QUANTITY")]
        quantity: u32,
    },

    /// Delete a book and its loan history
    RemoveBook {
        #[arg(value_name = "BOOK_ID")]
        book_id: String,
    },

    /// Delete a member and their loan history
    RemoveMember {
        #[arg(value_name = "MEMBER_ID")]
        member_id: String,
    },

    /// Check database integrity
    Check,

    /// Show library name, version, and lending rules
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Init { seed }) => {
            let (library, path) = open_library(&cli)?;
            if *seed {
                library.seed_sample_data()?;
            }
            if !cli.quiet {
                println!("Initialized library database at {}", path.display());
                if *seed {
                    println!(
                        "Seeded {} books, {} members, {} loans",
                        library.list_books()?.len(),
                        library.list_members()?.len(),
                        library.list_loans()?.len()
                    );
                }
            }
        }
        Some(Commands::AddBook {
            title,
            author,
            genre,
            isbn,
            quantity,
        }) => {
            let (library, _) = open_library(&cli)?;
            let mut new_book = NewBook::new(title, author, isbn, *quantity);
            if let Some(genre) = genre {
                new_book = new_book.with_genre(genre);
            }
            let book = library.add_book(new_book)?;
            if !cli.quiet {
                println!("Added book {}", book.id);
            }
        }
        Some(Commands::AddMember {
            name,
            email,
            student_id,
            membership_type,
        }) => {
            let (library, _) = open_library(&cli)?;
            let mut new_member = NewMember::new(name, email, membership_type);
            if let Some(student_id) = student_id {
                new_member = new_member.with_student_id(student_id);
            }
            let member = library.add_member(new_member)?;
            if !cli.quiet {
                println!("Added member {}", member.id);
            }
        }
        Some(Commands::Borrow { book_id, member_id }) => {
            let (library, _) = open_library(&cli)?;
            let book_id = parse_id(book_id, "book id")?;
            let member_id = parse_id(member_id, "member id")?;
            let loan = library.borrow(&book_id, &member_id)?;
            if !cli.quiet {
                let book = library.get_book(&loan.book_id)?;
                let member = library.get_member(&loan.member_id)?;
                println!(
                    "Borrowed \"{}\" for {} (due {})",
                    book.title, member.name, loan.due_date
                );
                println!("Loan {}", loan.id);
            }
        }
        Some(Commands::Return { loan_id }) => {
            let (library, _) = open_library(&cli)?;
            let loan_id = parse_id(loan_id, "loan id")?;
            let loan = library.return_book(&loan_id)?;
            if !cli.quiet {
                println!("Returned loan {} (penalty {})", loan.id, loan.penalty_fee);
            }
        }
        Some(Commands::Books { search, json }) => {
            let (library, _) = open_library(&cli)?;
            let books = match search {
                Some(query) => library.search_books(query)?,
                None => library.list_books()?,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&books)?);
            } else {
                print_books(&books, cli.quiet);
            }
        }
        Some(Commands::Members { search, json }) => {
            let (library, _) = open_library(&cli)?;
            let members = match search {
                Some(query) => library.search_members(query)?,
                None => library.list_members()?,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&members)?);
            } else {
                print_members(&members, cli.quiet);
            }
        }
        Some(Commands::Loans { json }) => {
            let (library, _) = open_library(&cli)?;
            let loans = library.list_loans()?;
            print_loans(&library, &loans, *json, cli.quiet)?;
        }
        Some(Commands::Overdue { json }) => {
            let (library, _) = open_library(&cli)?;
            let loans = library.overdue_loans(Utc::now().date_naive())?;
            print_loans(&library, &loans, *json, cli.quiet)?;
        }
        Some(Commands::History { member, book, json }) => {
            let (library, _) = open_library(&cli)?;
            let loans = match (member, book) {
                (Some(member_id), None) => {
                    let member_id = parse_id(member_id, "member id")?;
                    library.member_history(&member_id)?
                }
                (None, Some(book_id)) => {
                    let book_id = parse_id(book_id, "book id")?;
                    library.book_history(&book_id)?
                }
                _ => {
                    return Err(anyhow::anyhow!(
                        "Provide exactly one of --member or --book"
                    ));
                }
            };
            print_loans(&library, &loans, *json, cli.quiet)?;
        }
        Some(Commands::SetQuantity { book_id, quantity }) => {
            let (library, _) = open_library(&cli)?;
            let book_id = parse_id(book_id, "book id")?;
            library.set_book_quantity(&book_id, *quantity)?;
            if !cli.quiet {
                println!("Set quantity of book {} to {}", book_id, quantity);
            }
        }
        Some(Commands::RemoveBook { book_id }) => {
            let (library, _) = open_library(&cli)?;
            let book_id = parse_id(book_id, "book id")?;
            library.delete_book(&book_id)?;
            if !cli.quiet {
                println!("Removed book {} and its loan history", book_id);
            }
        }
        Some(Commands::RemoveMember { member_id }) => {
            let (library, _) = open_library(&cli)?;
            let member_id = parse_id(member_id, "member id")?;
            library.delete_member(&member_id)?;
            if !cli.quiet {
                println!("Removed member {} and their loan history", member_id);
            }
        }
        Some(Commands::Check) => {
            let (library, _) = open_library(&cli)?;
            match library.check_integrity() {
                Ok(()) => {
                    if !cli.quiet {
                        println!("Integrity check: OK");
                        println!("- foreign keys: OK");
                        println!("- loan counters: OK");
                        println!("- loan status/dates: OK");
                    }
                }
                Err(err) => {
                    eprintln!("Integrity check: FAILED");
                    eprintln!("- error: {}", err);
                    return Err(anyhow::anyhow!("Integrity check failed"));
                }
            }
        }
        Some(Commands::Info { json }) => {
            let (library, _) = open_library(&cli)?;
            let info = library.system_info();
            if *json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{} (biblio v{})", info.library_name, info.version);
                println!("Email domain: {}", info.domain);
                println!("Loan period: {} days", info.loan_period_days);
                println!("Loan cap: {} books per member", info.max_books_per_member);
                println!(
                    "Penalty: {} per day, capped at {}",
                    info.penalty_rate, info.max_penalty
                );
            }
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "biblio", &mut std::io::stdout());
        }
        None => {
            println!("Biblio v{}", VERSION);
            println!();
            println!("Quickstart:");
            println!("  biblio init --seed    Create a database with sample data");
            println!("  biblio books          List the catalog");
            println!("  biblio --help         Full usage");
        }
    }

    Ok(())
}

/// Open the library from `--db`, the config file, or `./library.db`.
fn open_library(cli: &Cli) -> anyhow::Result<(Library, PathBuf)> {
    let settings = config::load(cli.config.as_deref())?;
    let path = cli
        .db
        .clone()
        .or(settings.database_path)
        .unwrap_or_else(|| PathBuf::from("library.db"));
    let library = Library::open(&path, settings.library)?;
    Ok((library, path))
}

fn parse_id(value: &str, what: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| anyhow::anyhow!("Invalid {}: {}", what, e))
}

fn print_books(books: &[Book], quiet: bool) {
    if books.is_empty() {
        println!("No books found.");
        return;
    }
    if !quiet {
        println!("ID | TITLE | AUTHOR | ISBN | AVAILABLE");
    }
    for book in books {
        println!(
            "{} | {} | {} | {} | {}",
            book.id, book.title, book.author, book.isbn, book.quantity
        );
    }
}

fn print_members(members: &[Member], quiet: bool) {
    if members.is_empty() {
        println!("No members found.");
        return;
    }
    if !quiet {
        println!("ID | NAME | EMAIL | TYPE | LOANED");
    }
    for member in members {
        println!(
            "{} | {} | {} | {} | {}",
            member.id, member.name, member.email, member.membership_type, member.books_loaned
        );
    }
}

fn print_loans(library: &Library, loans: &[Loan], json: bool, quiet: bool) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let book_titles: HashMap<Uuid, String> = library
        .list_books()?
        .into_iter()
        .map(|book| (book.id, book.title))
        .collect();
    let member_names: HashMap<Uuid, String> = library
        .list_members()?
        .into_iter()
        .map(|member| (member.id, member.name))
        .collect();

    if json {
        let values: Vec<serde_json::Value> = loans
            .iter()
            .map(|loan| loan_json(loan, &book_titles, &member_names, library.config(), today))
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    if loans.is_empty() {
        println!("No loans found.");
        return Ok(());
    }
    if !quiet {
        println!("ID | BOOK | MEMBER | BORROWED | DUE | STATUS | PENALTY");
    }
    for loan in loans {
        println!(
            "{} | {} | {} | {} | {} | {} | {}",
            loan.id,
            lookup(&book_titles, &loan.book_id),
            lookup(&member_names, &loan.member_id),
            loan.borrow_date,
            loan.due_date,
            loan.status,
            loan.penalty_due(today, library.config())
        );
    }
    Ok(())
}

fn lookup<'a>(map: &'a HashMap<Uuid, String>, id: &Uuid) -> &'a str {
    map.get(id).map(String::as_str).unwrap_or("unknown")
}

fn loan_json(
    loan: &Loan,
    book_titles: &HashMap<Uuid, String>,
    member_names: &HashMap<Uuid, String>,
    config: &LibraryConfig,
    today: NaiveDate,
) -> serde_json::Value {
    serde_json::json!({
        "id": loan.id,
        "book_id": loan.book_id,
        "book_title": lookup(book_titles, &loan.book_id),
        "member_id": loan.member_id,
        "member_name": lookup(member_names, &loan.member_id),
        "borrow_date": loan.borrow_date,
        "due_date": loan.due_date,
        "return_date": loan.return_date,
        "status": loan.status,
        "overdue": loan.is_overdue(today),
        "penalty_fee": loan.penalty_fee,
        "penalty_due": loan.penalty_due(today, config),
    })
}
