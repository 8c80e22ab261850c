//! Catalog Operations
//!
//! One function per administrative action. Each builds a [`RoutineCall`],
//! hands it to a [`Gateway`] and interprets the result. None of them retry
//! and none of them touch command text: the template belongs to the routine.
//!
//! Existence checks and idempotent creation happen inside the stored
//! routines. The client only rejects input it can tell is unusable
//! (an empty identifier).

use std::fmt;

use crate::error::{FolioError, Result};
use crate::gateway::{Gateway, NoticeSink, Param, ResultSet, Routine, RoutineCall};

/// Name of a database, table or user
///
/// Case handling and quoting are left to the backend; the client only trims
/// surrounding whitespace and rejects empty names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl AsRef<str>) -> Result<Self> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(FolioError::invalid_input("Name cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    /// Assigned by the backend
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: i32,
}

impl BookRecord {
    /// Map one search row `(id, title, author, publisher, year)`
    pub fn from_row(row: &[serde_json::Value]) -> Result<Self> {
        if row.len() != 5 {
            return Err(FolioError::command_failed(
                "Error reading book",
                format!("expected 5 columns, got {}", row.len()),
            ));
        }

        Ok(Self {
            id: int_column(row, 0, "id")?,
            title: text_column(row, 1),
            author: text_column(row, 2),
            publisher: text_column(row, 3),
            year: int_column(row, 4, "year")?,
        })
    }
}

impl fmt::Display for BookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} by {} ({}, {})",
            self.id, self.title, self.author, self.publisher, self.year
        )
    }
}

fn int_column(row: &[serde_json::Value], idx: usize, name: &str) -> Result<i32> {
    row[idx]
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| {
            FolioError::command_failed(
                "Error reading book",
                format!("column '{name}' is not an integer: {}", row[idx]),
            )
        })
}

// NULL text columns read as empty strings.
fn text_column(row: &[serde_json::Value], idx: usize) -> String {
    match &row[idx] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Field values of a book without its id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub year: i32,
}

impl BookDraft {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        publisher: impl Into<String>,
        year: i32,
    ) -> Self {
        Self { title: title.into(), author: author.into(), publisher: publisher.into(), year }
    }
}

/// Privilege level granted to a new database user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMode {
    /// Superuser
    Admin,
    /// No elevated privileges
    Guest,
}

impl UserMode {
    /// `admin` (any case) is `Admin`; anything else is `Guest`
    #[must_use]
    pub fn parse(mode: &str) -> Self {
        if mode.trim().eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::Guest
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Guest => "guest",
        }
    }
}

/// A database user to create
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: Identifier,
    /// WARNING: Sensitive data, do not log
    pub password: String,
    pub mode: UserMode,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("mode", &self.mode)
            .finish()
    }
}

async fn call<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    routine: Routine,
    params: Vec<Param>,
) -> Result<ResultSet> {
    let call = RoutineCall::new(routine, params)?;
    if routine.needs_provisioning() {
        gateway.provision(&call, notices).await
    } else {
        gateway.execute(&call, notices).await
    }
}

/// Create a database through a provisioning sub-session
pub async fn create_database<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    name: &Identifier,
) -> Result<()> {
    call(gateway, notices, Routine::CreateDatabase, vec![Param::text(name.as_str())]).await?;
    Ok(())
}

/// Drop a database (terminating its sessions) through a provisioning sub-session
///
/// Dropping a database that does not exist is not an error.
pub async fn drop_database<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    name: &Identifier,
) -> Result<()> {
    call(gateway, notices, Routine::DropDatabase, vec![Param::text(name.as_str())]).await?;
    Ok(())
}

/// Create the book table unless a table with that name (any case) exists
pub async fn create_table<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
) -> Result<()> {
    call(gateway, notices, Routine::CreateTable, vec![Param::text(table.as_str())]).await?;
    Ok(())
}

/// Remove every row, keeping the table
pub async fn clear_table<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
) -> Result<()> {
    call(gateway, notices, Routine::ClearTable, vec![Param::text(table.as_str())]).await?;
    Ok(())
}

/// Insert a book. The backend assigns the id and reports it in a notice.
pub async fn add_book<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
    book: &BookDraft,
) -> Result<()> {
    let params = vec![
        Param::text(table.as_str()),
        Param::text(&book.title),
        Param::text(&book.author),
        Param::text(&book.publisher),
        Param::Int(book.year),
    ];
    call(gateway, notices, Routine::AddBook, params).await?;
    Ok(())
}

/// Books whose title contains `filter`, ignoring case
///
/// An empty filter lists the whole table. A missing table yields an empty
/// list rather than an error.
pub async fn search_books_by_title<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
    filter: &str,
) -> Result<Vec<BookRecord>> {
    let params = vec![Param::text(table.as_str()), Param::text(filter)];
    let result = call(gateway, notices, Routine::SearchBooksByTitle, params).await?;
    result.rows.iter().map(|row| BookRecord::from_row(row)).collect()
}

/// Every book in the table
pub async fn list_books<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
) -> Result<Vec<BookRecord>> {
    search_books_by_title(gateway, notices, table, "").await
}

/// Replace every field except the id
///
/// An id that matches no row is not reported: the call succeeds and
/// nothing changes.
pub async fn update_book<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
    id: i32,
    book: &BookDraft,
) -> Result<()> {
    let params = vec![
        Param::text(table.as_str()),
        Param::Int(id),
        Param::text(&book.title),
        Param::text(&book.author),
        Param::text(&book.publisher),
        Param::Int(book.year),
    ];
    call(gateway, notices, Routine::UpdateBook, params).await?;
    Ok(())
}

/// Delete every book with exactly this title (zero matches is fine)
pub async fn delete_book_by_title<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    table: &Identifier,
    title: &str,
) -> Result<()> {
    let params = vec![Param::text(table.as_str()), Param::text(title)];
    call(gateway, notices, Routine::DeleteBookByTitle, params).await?;
    Ok(())
}

/// Create a login role with the given privilege mode
pub async fn create_db_user<G: Gateway>(
    gateway: &G,
    notices: NoticeSink<'_>,
    user: &NewUser,
) -> Result<()> {
    let params = vec![
        Param::text(user.username.as_str()),
        Param::text(&user.password),
        Param::text(user.mode.as_str()),
    ];
    call(gateway, notices, Routine::CreateDbUser, params).await?;
    Ok(())
}
