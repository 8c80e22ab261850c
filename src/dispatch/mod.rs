//! Role-Gated Command Dispatcher
//!
//! Every action has exactly one entry in [`ACTIONS`] naming the access it
//! requires. The dispatcher checks that table once per command, before any
//! catalog operation runs, so a refused command never reaches the gateway.
//!
//! The dispatcher is also the recovery boundary: a failing operation becomes
//! [`Outcome::Failed`] and the interactive loop carries on.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{self, BookDraft, BookRecord, Identifier, NewUser};
use crate::error::{FolioError, Result};
use crate::gateway::{Gateway, NoticeObserver, NoticeSink};

pub mod menu;

pub use menu::Menu;

/// Message shown for unknown choices and refused actions alike
pub const REJECTION_MESSAGE: &str =
    "Invalid choice or operation not available for the current role.";

/// Caller role, fixed for the whole process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Administrator,
    Restricted,
}

impl Role {
    /// `admin_username` (exact match) is an Administrator, everyone else is Restricted
    #[must_use]
    pub fn from_username(username: &str, admin_username: &str) -> Self {
        if username == admin_username {
            Self::Administrator
        } else {
            Self::Restricted
        }
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Administrator)
    }

    /// Whether this role may run `action`
    #[must_use]
    pub const fn permits(&self, action: Action) -> bool {
        match action.spec().access {
            Access::Everyone => true,
            Access::AdminOnly => self.is_admin(),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access an action requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    AdminOnly,
    Everyone,
}

/// Everything a caller can ask for
///
/// Discriminants index [`ACTIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateDatabase = 0,
    DropDatabase = 1,
    CreateTable = 2,
    ClearTable = 3,
    AddBook = 4,
    UpdateBook = 5,
    DeleteBookByTitle = 6,
    SearchBooksByTitle = 7,
    ViewAllRecords = 8,
    CreateDbUser = 9,
    Exit = 10,
}

impl Action {
    #[must_use]
    pub const fn spec(self) -> &'static ActionSpec {
        &ACTIONS[self as usize]
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        self.spec().label
    }
}

/// One row of the action table
#[derive(Debug)]
pub struct ActionSpec {
    pub action: Action,
    pub access: Access,
    pub label: &'static str,
}

/// The action table, in menu order
pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec { action: Action::CreateDatabase, access: Access::AdminOnly, label: "Create database" },
    ActionSpec { action: Action::DropDatabase, access: Access::AdminOnly, label: "Drop database" },
    ActionSpec { action: Action::CreateTable, access: Access::AdminOnly, label: "Create table" },
    ActionSpec { action: Action::ClearTable, access: Access::AdminOnly, label: "Clear table" },
    ActionSpec { action: Action::AddBook, access: Access::AdminOnly, label: "Add book" },
    ActionSpec { action: Action::UpdateBook, access: Access::AdminOnly, label: "Update book" },
    ActionSpec {
        action: Action::DeleteBookByTitle,
        access: Access::AdminOnly,
        label: "Delete book by Title",
    },
    ActionSpec {
        action: Action::SearchBooksByTitle,
        access: Access::Everyone,
        label: "Search book by Title",
    },
    ActionSpec { action: Action::ViewAllRecords, access: Access::Everyone, label: "View all records" },
    ActionSpec { action: Action::CreateDbUser, access: Access::AdminOnly, label: "Create new DB user" },
    ActionSpec { action: Action::Exit, access: Access::Everyone, label: "Exit" },
];

/// An action together with its parameters
#[derive(Debug, Clone)]
pub enum Command {
    CreateDatabase(Identifier),
    DropDatabase(Identifier),
    CreateTable,
    ClearTable,
    AddBook(BookDraft),
    UpdateBook { id: i32, book: BookDraft },
    DeleteBookByTitle(String),
    SearchBooksByTitle(String),
    ViewAllRecords,
    CreateDbUser(NewUser),
    Exit,
}

impl Command {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::CreateDatabase(_) => Action::CreateDatabase,
            Self::DropDatabase(_) => Action::DropDatabase,
            Self::CreateTable => Action::CreateTable,
            Self::ClearTable => Action::ClearTable,
            Self::AddBook(_) => Action::AddBook,
            Self::UpdateBook { .. } => Action::UpdateBook,
            Self::DeleteBookByTitle(_) => Action::DeleteBookByTitle,
            Self::SearchBooksByTitle(_) => Action::SearchBooksByTitle,
            Self::ViewAllRecords => Action::ViewAllRecords,
            Self::CreateDbUser(_) => Action::CreateDbUser,
            Self::Exit => Action::Exit,
        }
    }
}

/// Result of one dispatch
#[derive(Debug)]
pub enum Outcome {
    /// Operation succeeded; the message confirms it
    Completed(&'static str),
    /// Search results
    Books(Vec<BookRecord>),
    /// Refused by the role check; the gateway was not called
    Unavailable,
    /// Operation failed; the loop may continue if the error is recoverable
    Failed(FolioError),
    /// Caller asked to leave
    Exit,
}

/// Routes commands from one caller to catalog operations
pub struct Dispatcher<G> {
    gateway: G,
    role: Role,
    table: Identifier,
    observer: Option<Arc<dyn NoticeObserver>>,
}

impl<G: Gateway> Dispatcher<G> {
    /// Create a dispatcher that discards notices
    pub const fn new(gateway: G, role: Role, table: Identifier) -> Self {
        Self { gateway, role, table, observer: None }
    }

    /// Forward the notices of each operation to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn NoticeObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn table(&self) -> &Identifier {
        &self.table
    }

    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub const fn menu(&self) -> Menu {
        Menu::new(self.role)
    }

    /// Check the action table for this caller
    pub fn authorize(&self, action: Action) -> Result<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(FolioError::Unauthorized)
        }
    }

    /// Run one command and report how it went
    pub async fn dispatch(&self, command: Command) -> Outcome {
        let action = command.action();

        if let Err(e) = self.authorize(action) {
            warn!(role = %self.role, ?action, code = e.error_code(), "action refused");
            return Outcome::Unavailable;
        }

        if matches!(command, Command::Exit) {
            return Outcome::Exit;
        }

        // Notices are forwarded for the duration of this operation only.
        let notices = match self.observer.as_deref() {
            Some(observer) => NoticeSink::Forward(observer),
            None => NoticeSink::Discard,
        };

        debug!(?action, verbose = notices.is_verbose(), "dispatching");
        match self.run(command, notices).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(?action, code = e.error_code(), "operation failed");
                Outcome::Failed(e)
            }
        }
    }

    async fn run(&self, command: Command, notices: NoticeSink<'_>) -> Result<Outcome> {
        let gateway = &self.gateway;
        let table = &self.table;

        let outcome = match command {
            Command::CreateDatabase(name) => {
                catalog::create_database(gateway, notices, &name).await?;
                Outcome::Completed("Database created.")
            }
            Command::DropDatabase(name) => {
                catalog::drop_database(gateway, notices, &name).await?;
                Outcome::Completed("Database dropped.")
            }
            Command::CreateTable => {
                catalog::create_table(gateway, notices, table).await?;
                Outcome::Completed("Table created.")
            }
            Command::ClearTable => {
                catalog::clear_table(gateway, notices, table).await?;
                Outcome::Completed("Table cleared.")
            }
            Command::AddBook(book) => {
                catalog::add_book(gateway, notices, table, &book).await?;
                Outcome::Completed("Book added.")
            }
            Command::UpdateBook { id, book } => {
                catalog::update_book(gateway, notices, table, id, &book).await?;
                Outcome::Completed("Book updated.")
            }
            Command::DeleteBookByTitle(title) => {
                catalog::delete_book_by_title(gateway, notices, table, &title).await?;
                Outcome::Completed("Book deleted.")
            }
            Command::SearchBooksByTitle(filter) => {
                Outcome::Books(catalog::search_books_by_title(gateway, notices, table, &filter).await?)
            }
            Command::ViewAllRecords => Outcome::Books(catalog::list_books(gateway, notices, table).await?),
            Command::CreateDbUser(user) => {
                catalog::create_db_user(gateway, notices, &user).await?;
                Outcome::Completed("New DB user created.")
            }
            Command::Exit => Outcome::Exit,
        };

        Ok(outcome)
    }

    /// Release the session
    pub async fn shutdown(mut self) -> Result<()> {
        self.gateway.close().await
    }
}
