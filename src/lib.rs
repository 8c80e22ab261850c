//! Folio - Role-Gated Catalog Administration Shell
//!
//! Folio is an interactive administrative client for a `PostgreSQL` catalog of
//! books. Every action is a call of a server-side stored routine; the client
//! decides who may run what, binds user input as positional parameters and
//! maps the rows it gets back into typed records.
//!
//! # Core Principles
//! - One session per process, released exactly once
//! - User input never becomes command text
//! - One declarative table decides which role may run which action
//! - Backend notices are shown only for the operation that raised them
//! - Failures are typed values; the dispatcher is the only recovery point
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`gateway`] - Backend gateway trait, routine calls, notices
//! - [`catalog`] - One operation per administrative action
//! - [`dispatch`] - Role table, menu and dispatcher
//! - [`session`] - Session bootstrap
//! - [`config`] - Configuration management
//! - [`console`] - Interactive prompts and printing

pub mod catalog;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod session;

// Re-export commonly used types for convenience
pub use catalog::{BookDraft, BookRecord, Identifier, NewUser, UserMode};
pub use config::{load_with_precedence, update_config, ConfigLocation, FolioConfig};
pub use dispatch::{Action, Command, Dispatcher, Menu, Outcome, Role, ACTIONS, REJECTION_MESSAGE};
pub use error::{FolioError, Result};
pub use gateway::{
    Gateway, Notice, NoticeLog, NoticeObserver, NoticeSink, Param, ResultSet, Routine,
    RoutineCall, SessionConfig,
};
pub use session::{bootstrap_with, Credentials, Session};

#[cfg(feature = "postgres")]
pub use gateway::postgres::PgGateway;
#[cfg(feature = "postgres")]
pub use session::bootstrap;
