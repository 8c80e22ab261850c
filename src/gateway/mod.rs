//! Backend Gateway Trait and Core Types
//!
//! This module defines the abstraction every backend session implements.
//! The production implementation lives in [`postgres`]; tests substitute an
//! in-memory double.
//!
//! # Parameterized Calls Only
//! A call is a [`Routine`] (whose command template is a compile-time
//! constant) plus an ordered list of [`Param`] values. There is no way to
//! hand the gateway command text assembled at runtime, so user input can
//! only reach the backend through the positional parameter channel.
//!
//! # Notices
//! Backend notices are delivered through a [`NoticeSink`] passed with each
//! call. The sink lives exactly as long as the call that receives it.

use std::fmt;
use std::sync::Mutex;

use crate::error::{FolioError, Result};

#[cfg(feature = "postgres")]
pub mod postgres;

/// Routines installed on the session's own catalog
pub const CATALOG_ROUTINES: &str = include_str!("catalog_routines.sql");

/// Routines installed on the maintenance catalog before database provisioning
pub const PROVISIONING_ROUTINES: &str = include_str!("provisioning_routines.sql");

/// Default `client_min_messages` level requested for each session
pub const DEFAULT_MIN_MESSAGES: &str = "notice";

/// Connection parameters for one backend session
#[derive(Clone)]
pub struct SessionConfig {
    /// Hostname
    pub host: String,

    /// Port number
    pub port: u16,

    /// Catalog (database) the session operates on
    pub database: String,

    /// Catalog used by provisioning sub-sessions
    pub maintenance_database: String,

    /// Username
    pub user: String,

    /// Password
    /// WARNING: Sensitive data, do not log or include in error messages
    pub password: String,

    /// Lowest notice severity the backend should send
    pub min_messages: String,
}

impl SessionConfig {
    /// Create a session config with default host, port and notice level
    #[must_use]
    pub fn new(database: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: database.into(),
            maintenance_database: "postgres".to_string(),
            user: user.into(),
            password: password.into(),
            min_messages: DEFAULT_MIN_MESSAGES.to_string(),
        }
    }

    /// Same credentials, pointed at the maintenance catalog
    #[must_use]
    pub fn for_maintenance(&self) -> Self {
        Self { database: self.maintenance_database.clone(), ..self.clone() }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("maintenance_database", &self.maintenance_database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("min_messages", &self.min_messages)
            .finish()
    }
}

/// Kind of a positional parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Int,
}

/// One positional parameter of a routine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Text(String),
    Int(i32),
}

impl Param {
    /// Create a text parameter
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Text(_) => ParamKind::Text,
            Self::Int(_) => ParamKind::Int,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            Self::Int(_) => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Text(_) => None,
        }
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Stored routines this client depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Routine {
    CreateDatabase,
    DropDatabase,
    CreateTable,
    ClearTable,
    AddBook,
    SearchBooksByTitle,
    UpdateBook,
    DeleteBookByTitle,
    CreateDbUser,
}

impl Routine {
    /// Server-side routine name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "sp_create_database",
            Self::DropDatabase => "sp_drop_database",
            Self::CreateTable => "sp_create_table",
            Self::ClearTable => "sp_clear_table",
            Self::AddBook => "sp_add_book",
            Self::SearchBooksByTitle => "sp_search_book_by_title",
            Self::UpdateBook => "sp_update_book",
            Self::DeleteBookByTitle => "sp_delete_book_by_title",
            Self::CreateDbUser => "sp_create_db_user",
        }
    }

    /// Fixed command template; user values bind to `$n` placeholders
    #[must_use]
    pub const fn template(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "CALL sp_create_database($1)",
            Self::DropDatabase => "CALL sp_drop_database($1)",
            Self::CreateTable => "CALL sp_create_table($1)",
            Self::ClearTable => "CALL sp_clear_table($1)",
            Self::AddBook => "CALL sp_add_book($1, $2, $3, $4, $5)",
            Self::SearchBooksByTitle => "SELECT * FROM sp_search_book_by_title($1, $2)",
            Self::UpdateBook => "CALL sp_update_book($1, $2, $3, $4, $5, $6)",
            Self::DeleteBookByTitle => "CALL sp_delete_book_by_title($1, $2)",
            Self::CreateDbUser => "CALL sp_create_db_user($1, $2, $3)",
        }
    }

    /// Positional parameter kinds, in order
    #[must_use]
    pub const fn signature(&self) -> &'static [ParamKind] {
        use ParamKind::{Int, Text};
        match self {
            Self::CreateDatabase | Self::DropDatabase | Self::CreateTable | Self::ClearTable => {
                &[Text]
            }
            Self::AddBook => &[Text, Text, Text, Text, Int],
            Self::SearchBooksByTitle | Self::DeleteBookByTitle => &[Text, Text],
            Self::UpdateBook => &[Text, Int, Text, Text, Text, Int],
            Self::CreateDbUser => &[Text, Text, Text],
        }
    }

    /// Prefix used when the backend rejects the call
    #[must_use]
    pub const fn failure_context(&self) -> &'static str {
        match self {
            Self::CreateDatabase => "Error creating database",
            Self::DropDatabase => "Error dropping database",
            Self::CreateTable => "Error creating table",
            Self::ClearTable => "Error clearing table",
            Self::AddBook => "Error adding book",
            Self::SearchBooksByTitle => "Error searching for book",
            Self::UpdateBook => "Error updating book",
            Self::DeleteBookByTitle => "Error deleting book",
            Self::CreateDbUser => "Error creating DB user",
        }
    }

    /// Whether the call produces a result set
    #[must_use]
    pub const fn returns_rows(&self) -> bool {
        matches!(self, Self::SearchBooksByTitle)
    }

    /// Whether the call must run on a provisioning sub-session
    #[must_use]
    pub const fn needs_provisioning(&self) -> bool {
        matches!(self, Self::CreateDatabase | Self::DropDatabase)
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A routine plus its positional parameters
///
/// Construction checks the parameters against [`Routine::signature`], so a
/// `RoutineCall` that exists always matches the backend contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineCall {
    routine: Routine,
    params: Vec<Param>,
}

impl RoutineCall {
    pub fn new(routine: Routine, params: Vec<Param>) -> Result<Self> {
        let expected = routine.signature();
        if params.len() != expected.len() {
            return Err(FolioError::invalid_input(format!(
                "{routine} expects {} parameters, got {}",
                expected.len(),
                params.len()
            )));
        }

        if let Some(position) =
            params.iter().zip(expected).position(|(param, kind)| param.kind() != *kind)
        {
            return Err(FolioError::invalid_input(format!(
                "{routine} parameter {} must be {:?}",
                position + 1,
                expected[position]
            )));
        }

        Ok(Self { routine, params })
    }

    #[must_use]
    pub const fn routine(&self) -> Routine {
        self.routine
    }

    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[must_use]
    pub const fn template(&self) -> &'static str {
        self.routine.template()
    }
}

/// Rows returned by a routine call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in result set
    pub columns: Vec<String>,

    /// Result rows, values in column order
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows affected (for calls that return no rows)
    pub rows_affected: Option<u64>,
}

impl ResultSet {
    /// Result of a call that produced no rows
    #[must_use]
    pub fn affected(rows_affected: u64) -> Self {
        Self { rows_affected: Some(rows_affected), ..Self::default() }
    }
}

/// Non-fatal diagnostic emitted by the backend during a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity as reported by the server (`NOTICE`, `WARNING`, ...)
    pub severity: String,

    /// Message text
    pub message: String,
}

impl Notice {
    pub fn new(severity: impl Into<String>, message: impl Into<String>) -> Self {
        Self { severity: severity.into(), message: message.into() }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Receives notices forwarded from verbose calls
pub trait NoticeObserver: Send + Sync {
    fn on_notice(&self, notice: &Notice);
}

/// Observer that keeps every notice it receives
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything received so far
    pub fn take(&self) -> Vec<Notice> {
        self.notices.lock().map(|mut notices| std::mem::take(&mut *notices)).unwrap_or_default()
    }
}

impl NoticeObserver for NoticeLog {
    fn on_notice(&self, notice: &Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }
}

/// Where the notices of one call go
#[derive(Clone, Copy, Default)]
pub enum NoticeSink<'a> {
    /// Drop every notice
    #[default]
    Discard,
    /// Hand every notice to the observer
    Forward(&'a dyn NoticeObserver),
}

impl NoticeSink<'_> {
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        matches!(self, Self::Forward(_))
    }

    /// Deliver notices, returning how many reached an observer
    pub fn deliver(&self, notices: impl IntoIterator<Item = Notice>) -> usize {
        match self {
            Self::Discard => 0,
            Self::Forward(observer) => notices.into_iter().fold(0, |count, notice| {
                observer.on_notice(&notice);
                count + 1
            }),
        }
    }
}

impl fmt::Debug for NoticeSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str("Discard"),
            Self::Forward(_) => f.write_str("Forward"),
        }
    }
}

/// Backend gateway trait
///
/// One implementation owns one authenticated session. Calls are awaited one
/// at a time by the dispatcher; none of them retry.
pub trait Gateway {
    /// Execute a routine call on the session
    ///
    /// Notices raised while the call runs go to `notices`; notices from
    /// earlier calls never do.
    fn execute(
        &self,
        call: &RoutineCall,
        notices: NoticeSink<'_>,
    ) -> impl std::future::Future<Output = Result<ResultSet>> + Send;

    /// Execute a routine call on a short-lived provisioning sub-session
    ///
    /// The sub-session is opened on the maintenance catalog with the same
    /// credentials and is closed before this returns, on every path.
    fn provision(
        &self,
        call: &RoutineCall,
        notices: NoticeSink<'_>,
    ) -> impl std::future::Future<Output = Result<ResultSet>> + Send;

    /// Ensure every stored routine this client calls exists (idempotent)
    fn install_routines(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Release the session. Later calls fail with `SessionClosed`.
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}
