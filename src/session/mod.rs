//! Session Bootstrap
//!
//! Derives the caller's role, opens the one session the process will use
//! and installs the stored routines. A failure at any step releases whatever
//! was opened and returns the error; no half-initialised session survives.

use std::fmt;
use std::future::Future;
use tracing::{info, warn};

use crate::dispatch::Role;
use crate::error::Result;
use crate::gateway::Gateway;

/// What the user typed at startup
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub database: String,
    pub username: String,
    /// WARNING: Sensitive data, do not log or include in error messages
    pub password: String,
}

impl Credentials {
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self { database: database.into(), username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An open, routine-ready session and the role of the caller who owns it
#[derive(Debug)]
pub struct Session<G> {
    pub gateway: G,
    pub role: Role,
}

/// Open a session with `connect`, then install routines
///
/// `connect` receives the credentials and produces an open gateway. When
/// routine installation fails the gateway is closed before the error is
/// returned.
pub async fn bootstrap_with<G, F, Fut>(
    credentials: &Credentials,
    admin_username: &str,
    connect: F,
) -> Result<Session<G>>
where
    G: Gateway,
    F: FnOnce(&Credentials) -> Fut,
    Fut: Future<Output = Result<G>>,
{
    let role = Role::from_username(&credentials.username, admin_username);

    let mut gateway = connect(credentials).await?;

    if let Err(e) = gateway.install_routines().await {
        if let Err(close_err) = gateway.close().await {
            warn!(code = close_err.error_code(), "could not close session after failed bootstrap");
        }
        return Err(e);
    }

    info!(database = %credentials.database, %role, "session ready");
    Ok(Session { gateway, role })
}

/// Bootstrap a `PostgreSQL` session
#[cfg(feature = "postgres")]
pub async fn bootstrap(
    credentials: &Credentials,
    config: &crate::config::FolioConfig,
) -> Result<Session<crate::gateway::postgres::PgGateway>> {
    use crate::gateway::postgres::PgGateway;

    let session_config = config.session_config(credentials);
    bootstrap_with(credentials, config.admin_username(), |_| async move {
        PgGateway::connect(&session_config).await
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("library", "admin", "correct horse");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("library"));
        assert!(!debug.contains("correct horse"));
    }
}
