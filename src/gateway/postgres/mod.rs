//! `PostgreSQL` Gateway Implementation
//!
//! This module implements the [`Gateway`] trait on top of `tokio-postgres`.
//!
//! # Features
//! - One long-lived client per session, released exactly once
//! - Positional parameters bound through the extended query protocol
//! - Backend notices captured from the connection task
//! - Short-lived provisioning sub-sessions on the maintenance catalog
//!
//! # Implementation Notes
//! - The connection future is driven by a spawned task that polls
//!   `Connection::poll_message`, so `NOTICE`s arrive on a channel instead of
//!   being logged and lost
//! - The task forwards a notice before it routes the reply that follows it,
//!   so every notice of a call is queued by the time the call returns
//! - No timeout and no retry: a hung backend blocks the caller

use futures_util::StreamExt;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_postgres::tls::NoTlsStream;
use tokio_postgres::types::ToSql;
use tokio_postgres::{AsyncMessage, Client, Config, Connection, NoTls, Row, Socket};
use tracing::{debug, info, warn};

use crate::error::{FolioError, Result};
use crate::gateway::{
    Gateway, Notice, NoticeSink, Param, ResultSet, RoutineCall, SessionConfig, CATALOG_ROUTINES,
    PROVISIONING_ROUTINES,
};

/// `client_min_messages` levels accepted by the server
pub const MIN_MESSAGE_LEVELS: &[&str] =
    &["debug5", "debug4", "debug3", "debug2", "debug1", "log", "notice", "warning", "error"];

/// `PostgreSQL` session
pub struct PgGateway {
    config: SessionConfig,
    client: Option<Client>,
    notices: Mutex<UnboundedReceiver<Notice>>,
    connection_task: Option<JoinHandle<()>>,
}

impl PgGateway {
    /// Open a session
    ///
    /// Anything acquired before a failure is dropped (closing the socket)
    /// before the error is returned.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let pg_config = build_pg_config(config)?;

        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| FolioError::connection_failed(format!("Error connecting to DB: {}", describe(&e))))?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_task = spawn_connection(connection, sender);

        let gateway = Self {
            config: config.clone(),
            client: Some(client),
            notices: Mutex::new(receiver),
            connection_task: Some(connection_task),
        };

        gateway.apply_min_messages().await?;

        info!(host = %config.host, port = config.port, database = %config.database, "session opened");
        Ok(gateway)
    }

    /// Catalog this session is connected to
    #[must_use]
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Whether the session has been released
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(FolioError::SessionClosed)
    }

    async fn apply_min_messages(&self) -> Result<()> {
        let level = self.config.min_messages.as_str();
        self.client()?
            .query_one("SELECT set_config('client_min_messages', $1, false)", &[&level])
            .await
            .map_err(|e| {
                FolioError::connection_failed(format!(
                    "Could not set client_min_messages to '{level}': {}",
                    describe(&e)
                ))
            })?;
        Ok(())
    }

    /// Run a multi-statement script; `wrap` turns a backend rejection into
    /// the caller's error
    async fn run_script(&self, script: &str, wrap: impl FnOnce(String) -> FolioError) -> Result<()> {
        let client = self.client()?;
        let outcome = client.batch_execute(script).await.map_err(|e| wrap(describe(&e)));
        self.discard_pending_notices();
        outcome
    }

    /// Drop notices raised outside any verbose call (for example while
    /// installing routines)
    fn discard_pending_notices(&self) {
        if let Ok(mut receiver) = self.notices.lock() {
            while receiver.try_recv().is_ok() {}
        }
    }

    fn take_pending_notices(&self) -> Vec<Notice> {
        let mut pending = Vec::new();
        if let Ok(mut receiver) = self.notices.lock() {
            while let Ok(notice) = receiver.try_recv() {
                pending.push(notice);
            }
        }
        pending
    }
}

impl Gateway for PgGateway {
    async fn execute(&self, call: &RoutineCall, notices: NoticeSink<'_>) -> Result<ResultSet> {
        let client = self.client()?;
        self.discard_pending_notices();

        debug!(
            routine = call.routine().name(),
            params = call.params().len(),
            verbose = notices.is_verbose(),
            "calling stored routine"
        );

        let outcome = run_call(client, call).await;

        let forwarded = notices.deliver(self.take_pending_notices());
        debug!(routine = call.routine().name(), forwarded, ok = outcome.is_ok(), "routine returned");

        outcome
    }

    async fn provision(&self, call: &RoutineCall, notices: NoticeSink<'_>) -> Result<ResultSet> {
        if self.is_closed() {
            return Err(FolioError::SessionClosed);
        }

        let maintenance = self.config.for_maintenance();
        debug!(database = %maintenance.database, routine = call.routine().name(), "opening provisioning session");

        let mut sub_session = Self::connect(&maintenance).await.map_err(|e| match e {
            FolioError::ConnectionFailed(detail) => FolioError::connection_failed(format!(
                "Error connecting to {}: {detail}",
                maintenance.database
            )),
            other => other,
        })?;

        let outcome = match sub_session
            .run_script(PROVISIONING_ROUTINES, |detail| {
                FolioError::command_failed("Error preparing provisioning routines", detail)
            })
            .await
        {
            Ok(()) => sub_session.execute(call, notices).await,
            Err(e) => Err(e),
        };

        let closed = sub_session.close().await;
        let result = outcome?;
        closed?;
        Ok(result)
    }

    async fn install_routines(&self) -> Result<()> {
        self.run_script(CATALOG_ROUTINES, |detail| {
            FolioError::bootstrap_failed(format!("Error initializing stored procedures: {detail}"))
        })
        .await?;

        info!(database = %self.config.database, "stored routines installed");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Err(FolioError::SessionClosed);
        };

        // Dropping the last client handle lets the connection future finish.
        drop(client);

        if let Some(task) = self.connection_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "connection task ended abnormally");
            }
        }

        info!(database = %self.config.database, "session closed");
        Ok(())
    }
}

impl Drop for PgGateway {
    fn drop(&mut self) {
        if self.client.take().is_some() {
            debug!(database = %self.config.database, "session released on drop");
        }
    }
}

/// Build `tokio-postgres` config from a `SessionConfig`
fn build_pg_config(config: &SessionConfig) -> Result<Config> {
    if config.database.trim().is_empty() {
        return Err(FolioError::invalid_input("Database name cannot be empty"));
    }

    if config.user.trim().is_empty() {
        return Err(FolioError::invalid_input("Username cannot be empty"));
    }

    if !MIN_MESSAGE_LEVELS.contains(&config.min_messages.as_str()) {
        return Err(FolioError::config_error(format!(
            "Unknown client_min_messages level '{}'",
            config.min_messages
        )));
    }

    let mut pg_config = Config::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .user(&config.user)
        .password(&config.password)
        .dbname(&config.database)
        .application_name("folio");

    Ok(pg_config)
}

/// Drive the connection and forward its notices
fn spawn_connection(
    mut connection: Connection<Socket, NoTlsStream>,
    notices: UnboundedSender<Notice>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut messages =
            std::pin::pin!(futures_util::stream::poll_fn(move |cx| connection.poll_message(cx)));

        while let Some(message) = messages.next().await {
            match message {
                Ok(AsyncMessage::Notice(notice)) => {
                    // The receiver is gone once the gateway is dropped.
                    let _ = notices.send(Notice::new(notice.severity(), notice.message()));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %describe(&e), "connection closed with error");
                    break;
                }
            }
        }
    })
}

/// Execute one routine call and collect its result
async fn run_call(client: &Client, call: &RoutineCall) -> Result<ResultSet> {
    let routine = call.routine();
    let params = bind_params(call.params());

    if routine.returns_rows() {
        let rows = client
            .query(call.template(), &params)
            .await
            .map_err(|e| FolioError::command_failed(routine.failure_context(), describe(&e)))?;

        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let mut data = Vec::with_capacity(rows.len());
        for row in &rows {
            data.push(row_to_json(row)?);
        }

        Ok(ResultSet { columns, rows: data, rows_affected: None })
    } else {
        let rows_affected = client
            .execute(call.template(), &params)
            .await
            .map_err(|e| FolioError::command_failed(routine.failure_context(), describe(&e)))?;

        Ok(ResultSet::affected(rows_affected))
    }
}

/// Borrow parameters as driver values, preserving their order
fn bind_params(params: &[Param]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| match param {
            Param::Text(value) => value as &(dyn ToSql + Sync),
            Param::Int(value) => value as &(dyn ToSql + Sync),
        })
        .collect()
}

/// Convert a `PostgreSQL` row to a `Vec` of JSON values in column order
fn row_to_json(row: &Row) -> Result<Vec<serde_json::Value>> {
    (0..row.len()).map(|idx| postgres_value_to_json(row, idx)).collect()
}

/// Convert a `PostgreSQL` value to a JSON value
fn postgres_value_to_json(row: &Row, idx: usize) -> Result<serde_json::Value> {
    use tokio_postgres::types::Type;

    let column = &row.columns()[idx];
    let col_type = column.type_();
    let fail = |e: tokio_postgres::Error| {
        FolioError::command_failed(
            "Error reading result",
            format!("column '{}' ({}): {e}", column.name(), col_type.name()),
        )
    };

    let value = match *col_type {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(fail)?.map(serde_json::Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map_err(fail)?.map(Into::into),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map_err(fail)?.map(Into::into),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(fail)?.map(Into::into),
        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx).map_err(fail)?.map(serde_json::Value::String)
        }
        _ => {
            return Err(FolioError::command_failed(
                "Error reading result",
                format!("unsupported column type '{}' for '{}'", col_type.name(), column.name()),
            ))
        }
    };

    Ok(value.unwrap_or(serde_json::Value::Null))
}

/// Server message when the error came from the backend, driver message otherwise
fn describe(error: &tokio_postgres::Error) -> String {
    error.as_db_error().map_or_else(|| error.to_string(), |db| db.message().to_string())
}
