//! In-memory backend with fault injection.
//!
//! Understands exactly the statements this crate issues and behaves like a
//! MySQL server for them: unknown databases, missing tables, duplicate keys,
//! zero changed rows for identical updates. Connections can be dropped,
//! the server made unreachable, TLS rejected and statements failed on demand.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use roster_core::record::{MAX_NAME_CHARS, MAX_NATIONAL_ID_CHARS, MAX_ROOM_CHARS};

use crate::driver::{Connector, DbError, Scope, Session, Transport};
use crate::manager::HEALTH_CHECK_SQL;
use crate::records::sql;
use crate::schema::CREATE_USERS_TABLE;
use crate::value::{Row, Value};

#[derive(Debug, Clone)]
struct StoredUser {
    id: i64,
    name: String,
    birth_date: NaiveDate,
    national_id: String,
    room_number: String,
    registration_date: NaiveDate,
    expiry_date: NaiveDate,
    created_at: NaiveDateTime,
}

impl StoredUser {
    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("birth_date", self.birth_date)
            .with("national_id", self.national_id.as_str())
            .with("room_number", self.room_number.as_str())
            .with("registration_date", self.registration_date)
            .with("expiry_date", self.expiry_date)
            .with("created_at", self.created_at)
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<String, StoredUser>,
    next_id: i64,
}

#[derive(Debug)]
struct State {
    reachable: bool,
    accepts_tls: bool,
    database_created: bool,
    table_created: bool,
    generation: u64,
    pending_failures: u32,
    connects: usize,
    transports: Vec<Transport>,
    tables: Tables,
}

/// Shared handle to one simulated server.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    database: String,
    tls: bool,
}

impl MemoryBackend {
    /// A server where `database` and the `users` table already exist.
    pub fn new(database: &str) -> Self {
        let backend = Self::empty(database);
        {
            let mut state = backend.lock();
            state.database_created = true;
            state.table_created = true;
        }
        backend
    }

    /// A server with nothing provisioned.
    pub fn empty(database: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                reachable: true,
                accepts_tls: true,
                database_created: false,
                table_created: false,
                generation: 0,
                pending_failures: 0,
                connects: 0,
                transports: Vec::new(),
                tables: Tables {
                    users: BTreeMap::new(),
                    next_id: 1,
                },
            })),
            database: database.to_string(),
            tls: false,
        }
    }

    /// Connectors built after this call attempt TLS first.
    pub fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MemoryConnector {
            state: Arc::clone(&self.state),
            database: self.database.clone(),
            tls: self.tls,
        })
    }

    /// Make TLS negotiation fail from now on.
    pub fn reject_tls(&self) {
        self.lock().accepts_tls = false;
    }

    /// An unreachable server refuses new connections and kills open ones.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Invalidate every open connection, as a server restart would.
    pub fn drop_connections(&self) {
        self.lock().generation += 1;
    }

    /// Fail the next `n` statements with a connection error.
    pub fn fail_next_statements(&self, n: u32) {
        self.lock().pending_failures = n;
    }

    /// Successful connection opens so far.
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Transport of every open attempt, successful or not, in order.
    pub fn opened_transports(&self) -> Vec<Transport> {
        self.lock().transports.clone()
    }

    pub fn database_created(&self) -> bool {
        self.lock().database_created
    }

    pub fn table_created(&self) -> bool {
        self.lock().table_created
    }

    pub fn user_count(&self) -> usize {
        self.lock().tables.users.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MemoryConnector {
    state: Arc<Mutex<State>>,
    database: String,
    tls: bool,
}

#[async_trait]
impl Connector for MemoryConnector {
    fn database(&self) -> &str {
        &self.database
    }

    fn tls_available(&self) -> bool {
        self.tls
    }

    async fn open(&self, scope: Scope, transport: Transport) -> Result<Box<dyn Session>, DbError> {
        let mut state = lock(&self.state);
        state.transports.push(transport);

        if !state.reachable {
            return Err(DbError::Connection(
                "Can't connect to MySQL server (connection refused)".into(),
            ));
        }
        if transport == Transport::Tls && !state.accepts_tls {
            return Err(DbError::Tls("server does not support TLS".into()));
        }
        let database = match scope {
            Scope::Server => None,
            Scope::Database if !state.database_created => {
                return Err(DbError::Server(format!("Unknown database '{}'", self.database)));
            }
            Scope::Database => Some(self.database.clone()),
        };

        state.connects += 1;
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            database,
            generation: state.generation,
            snapshot: None,
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<State>>,
    database: Option<String>,
    generation: u64,
    snapshot: Option<Tables>,
}

impl MemorySession {
    fn live(&self) -> Result<MutexGuard<'_, State>, DbError> {
        let state = lock(&self.state);
        if !state.reachable || state.generation != self.generation {
            return Err(DbError::Connection("MySQL server has gone away".into()));
        }
        Ok(state)
    }

    /// Liveness plus one pending injected failure, if any.
    fn statement(&self) -> Result<MutexGuard<'_, State>, DbError> {
        let mut state = self.live()?;
        if state.pending_failures > 0 {
            state.pending_failures -= 1;
            return Err(DbError::Connection("Lost connection to MySQL server during query".into()));
        }
        Ok(state)
    }

    fn users_table(&self, state: &State) -> Result<(), DbError> {
        let Some(database) = self.database.as_deref() else {
            return Err(DbError::Server("No database selected".into()));
        };
        if !state.table_created {
            return Err(DbError::Server(format!("Table '{database}.users' doesn't exist")));
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        self.live().map(|_| ())
    }

    async fn execute(&mut self, sql_text: &str, params: &[Value]) -> Result<u64, DbError> {
        let mut state = self.statement()?;

        if sql_text.starts_with("CREATE DATABASE") {
            state.database_created = true;
            return Ok(1);
        }
        if sql_text == CREATE_USERS_TABLE {
            if self.database.is_none() {
                return Err(DbError::Server("No database selected".into()));
            }
            state.table_created = true;
            return Ok(0);
        }

        self.users_table(&state)?;
        let tables = &mut state.tables;
        match sql_text {
            sql::INSERT => {
                let national_id = text(params, 2)?;
                if tables.users.contains_key(&national_id) {
                    return Err(DbError::UniqueViolation(format!(
                        "Duplicate entry '{national_id}' for key 'users.national_id'"
                    )));
                }
                check_width("name", &text(params, 0)?, MAX_NAME_CHARS)?;
                check_width("national_id", &national_id, MAX_NATIONAL_ID_CHARS)?;
                check_width("room_number", &text(params, 3)?, MAX_ROOM_CHARS)?;
                let user = StoredUser {
                    id: tables.next_id,
                    name: text(params, 0)?,
                    birth_date: date(params, 1)?,
                    national_id: national_id.clone(),
                    room_number: text(params, 3)?,
                    registration_date: date(params, 4)?,
                    expiry_date: date(params, 5)?,
                    created_at: Utc::now().naive_utc(),
                };
                tables.next_id += 1;
                tables.users.insert(national_id, user);
                Ok(1)
            }
            sql::DELETE_BY_NATIONAL_ID => {
                let national_id = text(params, 0)?;
                Ok(u64::from(tables.users.remove(&national_id).is_some()))
            }
            sql::RENEW => {
                let registration = date(params, 0)?;
                let expiry = date(params, 1)?;
                let national_id = text(params, 2)?;
                match tables.users.get_mut(&national_id) {
                    // Matched but unchanged rows do not count as affected.
                    Some(user)
                        if user.registration_date == registration && user.expiry_date == expiry =>
                    {
                        Ok(0)
                    }
                    Some(user) => {
                        user.registration_date = registration;
                        user.expiry_date = expiry;
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }
            other => Err(DbError::Server(format!("unsupported statement: {other}"))),
        }
    }

    async fn fetch_all(&mut self, sql_text: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let state = self.statement()?;

        if sql_text == HEALTH_CHECK_SQL {
            return Ok(vec![Row::new().with("ok", 1)]);
        }

        self.users_table(&state)?;
        let users = &state.tables.users;
        match sql_text {
            sql::SELECT_BY_NATIONAL_ID => {
                let national_id = text(params, 0)?;
                Ok(users.get(&national_id).map(StoredUser::to_row).into_iter().collect())
            }
            sql::SELECT_DUE => {
                let bound = date(params, 0)?;
                let mut due: Vec<&StoredUser> =
                    users.values().filter(|u| u.expiry_date <= bound).collect();
                due.sort_by_key(|u| (u.expiry_date, u.id));
                Ok(due.into_iter().map(StoredUser::to_row).collect())
            }
            other => Err(DbError::Server(format!("unsupported query: {other}"))),
        }
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        let snapshot = self.live()?.tables.clone();
        self.snapshot = Some(snapshot);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.live()?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if let Some(snapshot) = self.snapshot.take() {
            lock(&self.state).tables = snapshot;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        Ok(())
    }
}

fn param(params: &[Value], index: usize) -> Result<&Value, DbError> {
    params
        .get(index)
        .ok_or_else(|| DbError::Server(format!("missing parameter {index}")))
}

/// Strict-mode behaviour for over-wide values.
fn check_width(column: &str, value: &str, max: usize) -> Result<(), DbError> {
    if value.chars().count() > max {
        return Err(DbError::InvalidData(format!(
            "Data too long for column '{column}' at row 1"
        )));
    }
    Ok(())
}

fn text(params: &[Value], index: usize) -> Result<String, DbError> {
    match param(params, index)? {
        Value::Text(v) => Ok(v.clone()),
        other => Err(DbError::Server(format!("parameter {index}: expected text, got {other:?}"))),
    }
}

fn date(params: &[Value], index: usize) -> Result<NaiveDate, DbError> {
    match param(params, index)? {
        Value::Date(v) => Ok(*v),
        other => Err(DbError::Server(format!("parameter {index}: expected date, got {other:?}"))),
    }
}
