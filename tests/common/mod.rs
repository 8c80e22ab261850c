//! In-memory gateway used by the integration tests
//!
//! `MemoryGateway` behaves like the stored routines: case-insensitive table
//! names, idempotent table creation, silent updates of missing ids, empty
//! searches on missing tables. It also records every call it receives so
//! tests can assert what reached the backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use folio::{
    BookRecord, FolioError, Gateway, Notice, NoticeSink, Param, ResultSet, Result, Routine,
    RoutineCall,
};

#[derive(Debug, Default)]
struct State {
    tables: Vec<(String, Vec<BookRecord>)>,
    next_id: i32,
    databases: Vec<String>,
    users: Vec<(String, String)>,
    recorded: Vec<RoutineCall>,
    closed: bool,
    installs: usize,
}

impl State {
    fn table_mut(&mut self, name: &str) -> Option<&mut Vec<BookRecord>> {
        self.tables
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, rows)| rows)
    }
}

#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
    calls: AtomicUsize,
    close_calls: Arc<AtomicUsize>,
    refuse_provisioning_connections: bool,
    fail_install: bool,
    fail_after_notice: Option<Routine>,
}

fn text(call: &RoutineCall, idx: usize) -> String {
    call.params()[idx].as_text().unwrap_or_default().to_string()
}

fn int(call: &RoutineCall, idx: usize) -> i32 {
    call.params()[idx].as_int().unwrap_or_default()
}

fn missing_table(call: &RoutineCall, name: &str) -> FolioError {
    FolioError::command_failed(
        call.routine().failure_context(),
        format!("relation \"{name}\" does not exist"),
    )
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway whose table `name` already exists
    pub fn with_table(name: &str) -> Self {
        let gateway = Self::new();
        gateway.state.lock().unwrap().tables.push((name.to_string(), Vec::new()));
        gateway
    }

    /// Gateway whose provisioning sub-sessions cannot connect
    pub fn refusing_provisioning() -> Self {
        Self { refuse_provisioning_connections: true, ..Self::default() }
    }

    /// Gateway on which routine installation fails
    pub fn failing_install() -> Self {
        Self { fail_install: true, ..Self::default() }
    }

    /// Gateway on which `routine` raises a warning and then fails
    pub fn failing_after_notice(routine: Routine) -> Self {
        Self { fail_after_notice: Some(routine), ..Self::default() }
    }

    /// Number of calls that reached the gateway (execute + provision)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<RoutineCall> {
        self.state.lock().unwrap().recorded.clone()
    }

    pub fn rows(&self, table: &str) -> Vec<BookRecord> {
        self.state.lock().unwrap().table_mut(table).map(|rows| rows.clone()).unwrap_or_default()
    }

    pub fn table_count(&self) -> usize {
        self.state.lock().unwrap().tables.len()
    }

    pub fn databases(&self) -> Vec<String> {
        self.state.lock().unwrap().databases.clone()
    }

    pub fn users(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().users.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Close counter that outlives the gateway
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.close_calls)
    }

    pub fn installs(&self) -> usize {
        self.state.lock().unwrap().installs
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn admit(&self, call: &RoutineCall) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(FolioError::SessionClosed);
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        state.recorded.push(call.clone());
        Ok(())
    }

    fn run(&self, call: &RoutineCall) -> Result<(ResultSet, Vec<Notice>)> {
        let mut state = self.state.lock().unwrap();

        let notice = |message: String| vec![Notice::new("NOTICE", message)];

        match call.routine() {
            Routine::CreateDatabase => {
                let name = text(call, 0);
                if state.databases.contains(&name) {
                    return Err(FolioError::command_failed(
                        call.routine().failure_context(),
                        format!("database \"{name}\" already exists"),
                    ));
                }
                state.databases.push(name.clone());
                Ok((ResultSet::affected(0), notice(format!("Database \"{name}\" created."))))
            }
            Routine::DropDatabase => {
                let name = text(call, 0);
                state.databases.retain(|existing| *existing != name);
                Ok((ResultSet::affected(0), notice(format!("Database \"{name}\" dropped."))))
            }
            Routine::CreateTable => {
                let name = text(call, 0);
                if state.table_mut(&name).is_some() {
                    return Ok((
                        ResultSet::affected(0),
                        notice(format!("Table \"{name}\" already exists.")),
                    ));
                }
                state.tables.push((name.clone(), Vec::new()));
                Ok((ResultSet::affected(0), notice(format!("Table \"{name}\" created."))))
            }
            Routine::ClearTable => {
                let name = text(call, 0);
                let rows = state.table_mut(&name).ok_or_else(|| missing_table(call, &name))?;
                rows.clear();
                Ok((ResultSet::affected(0), notice(format!("Table \"{name}\" cleared."))))
            }
            Routine::AddBook => {
                let name = text(call, 0);
                state.next_id += 1;
                let id = state.next_id;
                let rows = state.table_mut(&name).ok_or_else(|| missing_table(call, &name))?;
                let title = text(call, 1);
                rows.push(BookRecord {
                    id,
                    title: title.clone(),
                    author: text(call, 2),
                    publisher: text(call, 3),
                    year: int(call, 4),
                });
                Ok((ResultSet::affected(0), notice(format!("Book \"{title}\" added with id {id}."))))
            }
            Routine::SearchBooksByTitle => {
                let name = text(call, 0);
                let filter = text(call, 1).to_lowercase();
                let rows = state
                    .table_mut(&name)
                    .map(|rows| {
                        rows.iter()
                            .filter(|book| book.title.to_lowercase().contains(&filter))
                            .map(|book| {
                                vec![
                                    Value::from(book.id),
                                    Value::from(book.title.clone()),
                                    Value::from(book.author.clone()),
                                    Value::from(book.publisher.clone()),
                                    Value::from(book.year),
                                ]
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let columns = ["id", "title", "author", "publisher", "year"]
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                Ok((ResultSet { columns, rows, rows_affected: None }, Vec::new()))
            }
            Routine::UpdateBook => {
                let name = text(call, 0);
                let id = int(call, 1);
                let rows = state.table_mut(&name).ok_or_else(|| missing_table(call, &name))?;
                if let Some(book) = rows.iter_mut().find(|book| book.id == id) {
                    book.title = text(call, 2);
                    book.author = text(call, 3);
                    book.publisher = text(call, 4);
                    book.year = int(call, 5);
                }
                Ok((ResultSet::affected(0), notice(format!("Book updated with id: {id}"))))
            }
            Routine::DeleteBookByTitle => {
                let name = text(call, 0);
                let title = text(call, 1);
                let rows = state.table_mut(&name).ok_or_else(|| missing_table(call, &name))?;
                rows.retain(|book| book.title != title);
                Ok((
                    ResultSet::affected(0),
                    notice(format!("Book(s) with title \"{title}\" deleted.")),
                ))
            }
            Routine::CreateDbUser => {
                let username = text(call, 0);
                if state.users.iter().any(|(existing, _)| *existing == username) {
                    return Err(FolioError::command_failed(
                        call.routine().failure_context(),
                        format!("role \"{username}\" already exists"),
                    ));
                }
                let mode = text(call, 2);
                let privilege =
                    if mode.eq_ignore_ascii_case("admin") { "SUPERUSER" } else { "NOSUPERUSER" };
                state.users.push((username.clone(), privilege.to_string()));
                Ok((
                    ResultSet::affected(0),
                    notice(format!("User \"{username}\" created with mode {mode}.")),
                ))
            }
        }
    }
}

impl Gateway for MemoryGateway {
    async fn execute(&self, call: &RoutineCall, notices: NoticeSink<'_>) -> Result<ResultSet> {
        self.admit(call)?;

        if self.fail_after_notice == Some(call.routine()) {
            notices.deliver(vec![Notice::new("WARNING", format!("{} is about to fail", call.routine()))]);
            return Err(FolioError::command_failed(
                call.routine().failure_context(),
                "simulated backend failure",
            ));
        }

        let (result, raised) = self.run(call)?;
        notices.deliver(raised);
        Ok(result)
    }

    async fn provision(&self, call: &RoutineCall, notices: NoticeSink<'_>) -> Result<ResultSet> {
        if self.is_closed() {
            return Err(FolioError::SessionClosed);
        }
        if self.refuse_provisioning_connections {
            self.calls.fetch_add(1, Ordering::SeqCst);
            return Err(FolioError::connection_failed(
                "Error connecting to postgres: password authentication failed",
            ));
        }
        self.execute(call, notices).await
    }

    async fn install_routines(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(FolioError::SessionClosed);
        }
        if self.fail_install {
            return Err(FolioError::bootstrap_failed(
                "Error initializing stored procedures: permission denied for language plpgsql",
            ));
        }
        state.installs += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(FolioError::SessionClosed);
        }
        state.closed = true;
        Ok(())
    }
}

/// Convenience: text parameters of every recorded call, flattened
pub fn recorded_text_params(gateway: &MemoryGateway) -> Vec<String> {
    gateway
        .recorded_calls()
        .iter()
        .flat_map(|call| call.params().to_vec())
        .filter_map(|param| match param {
            Param::Text(value) => Some(value),
            Param::Int(_) => None,
        })
        .collect()
}
