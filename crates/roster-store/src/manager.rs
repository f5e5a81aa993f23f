use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Connector, DbError, Scope, Session, Transport};
use crate::error::{Result, StoreError};
use crate::retry::RetryPolicy;
use crate::schema::SchemaInitializer;
use crate::value::{Row, Value};

/// Statement used by [`ConnectionManager::health_check`].
pub const HEALTH_CHECK_SQL: &str = "SELECT 1 AS ok";

/// Owns the single database connection of the process.
///
/// Every `execute`/`query` call holds the connection lock for its whole
/// check-liveness → run → possibly-replace sequence, so no caller can use a
/// connection another caller is in the middle of replacing. Failed statements
/// are retried on a fresh connection up to [`RetryPolicy::max_attempts`].
pub struct ConnectionManager {
    connector: Option<Arc<dyn Connector>>,
    conn: Mutex<Option<Box<dyn Session>>>,
    policy: RetryPolicy,
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Execute { commit: bool },
    Query,
}

enum Outcome {
    Affected(u64),
    Rows(Vec<Row>),
}

impl ConnectionManager {
    /// Build a manager without connecting. See [`ConnectionManager::start`].
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        Self {
            connector: Some(connector),
            conn: Mutex::new(None),
            policy,
        }
    }

    /// A manager for a process started without database settings.
    /// Every operation fails fast with [`StoreError::NotConfigured`].
    pub fn unconfigured() -> Self {
        Self {
            connector: None,
            conn: Mutex::new(None),
            policy: RetryPolicy::default(),
        }
    }

    /// Build a manager, connect, and provision the schema.
    ///
    /// Never fails: an unreachable server is logged and the first real
    /// operation reconnects.
    pub async fn start(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        let manager = Self::new(connector, policy);
        manager.provision().await;
        manager
    }

    pub fn is_configured(&self) -> bool {
        self.connector.is_some()
    }

    /// Whether a connection is currently held (not whether it is alive).
    pub async fn is_connected(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Schema provisioning plus the initial database-scoped connect, under
    /// the lock so concurrent first users wait for it.
    pub async fn provision(&self) {
        let Some(connector) = self.connector.as_deref() else {
            return;
        };
        let mut slot = self.conn.lock().await;
        SchemaInitializer::new(connector).run(&mut slot).await;
    }

    /// Ping the held connection and reconnect if it is missing or dead.
    /// Failures are logged; the next operation reports them.
    pub async fn ensure_alive(&self) {
        let Some(connector) = self.connector.as_deref() else {
            return;
        };
        let mut slot = self.conn.lock().await;
        let _ = ensure_alive_in(connector, &mut slot).await;
    }

    /// Replace the held connection with a new one. Returns `true` on success.
    pub async fn connect(&self) -> bool {
        let Some(connector) = self.connector.as_deref() else {
            warn!("database connect skipped: storage is not configured");
            return false;
        };
        let mut slot = self.conn.lock().await;
        reconnect(connector, &mut slot).await.is_ok()
    }

    /// Run a mutating statement, committing when `commit` is set.
    /// Returns the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[Value], commit: bool) -> Result<u64> {
        match self.run(Op::Execute { commit }, sql, params).await? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(_) => Err(StoreError::Decode("execute returned rows".into())),
        }
    }

    /// Run a read-only query and collect every row.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        match self.run(Op::Query, sql, params).await? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Err(StoreError::Decode("query returned no rows".into())),
        }
    }

    /// Round trip through the retry path; returns the value of `SELECT 1`.
    pub async fn health_check(&self) -> Result<i64> {
        let rows = self.query(HEALTH_CHECK_SQL, &[]).await?;
        match rows.first() {
            Some(row) => row.int("ok"),
            None => Err(StoreError::Decode("health check returned no rows".into())),
        }
    }

    /// Close the held connection. Idempotent; errors are ignored.
    pub async fn close(&self) {
        let mut slot = self.conn.lock().await;
        if slot.is_some() {
            discard(&mut slot).await;
            info!("database connection closed");
        }
    }

    async fn run(&self, op: Op, sql: &str, params: &[Value]) -> Result<Outcome> {
        let connector = self.connector.as_deref().ok_or(StoreError::NotConfigured)?;
        let mut slot = self.conn.lock().await;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match ensure_alive_in(connector, &mut slot).await {
                Ok(()) => match slot.as_mut() {
                    Some(session) => attempt_once(session.as_mut(), op, sql, params).await,
                    None => Err(DbError::Connection("no connection held".into())),
                },
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(outcome) => {
                    if attempt > 1 {
                        info!(attempt, statement = summary(sql), "statement succeeded after retry");
                    }
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                error = %err,
                statement = summary(sql),
                "statement failed"
            );

            // Same failure on any connection: keep this one and give up.
            if !err.is_retryable() {
                return Err(StoreError::Database(err));
            }

            discard(&mut slot).await;

            if !self.policy.has_attempts_after(attempt) {
                return Err(StoreError::Unavailable {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = self.policy.delay_after(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn attempt_once(
    session: &mut dyn Session,
    op: Op,
    sql: &str,
    params: &[Value],
) -> std::result::Result<Outcome, DbError> {
    match op {
        Op::Query => session.fetch_all(sql, params).await.map(Outcome::Rows),
        Op::Execute { commit: false } => session.execute(sql, params).await.map(Outcome::Affected),
        Op::Execute { commit: true } => {
            let result = execute_committed(session, sql, params).await;
            if result.is_err() {
                if let Err(e) = session.rollback().await {
                    debug!(error = %e, "rollback failed (ignored)");
                }
            }
            result.map(Outcome::Affected)
        }
    }
}

async fn execute_committed(
    session: &mut dyn Session,
    sql: &str,
    params: &[Value],
) -> std::result::Result<u64, DbError> {
    session.begin().await?;
    let affected = session.execute(sql, params).await?;
    session.commit().await?;
    Ok(affected)
}

/// Open a connection, trying TLS first when available and falling back to
/// plaintext only when the TLS negotiation itself failed.
pub(crate) async fn open_session(
    connector: &dyn Connector,
    scope: Scope,
) -> std::result::Result<(Box<dyn Session>, Transport), DbError> {
    if connector.tls_available() {
        match connector.open(scope, Transport::Tls).await {
            Ok(session) => return Ok((session, Transport::Tls)),
            Err(DbError::Tls(reason)) => {
                warn!(%reason, ?scope, "TLS negotiation failed, retrying without encryption");
            }
            Err(e) => return Err(e),
        }
    }
    let session = connector.open(scope, Transport::Plain).await?;
    Ok((session, Transport::Plain))
}

/// Drop whatever is held and open a database-scoped connection.
/// On failure the slot stays empty.
pub(crate) async fn reconnect(
    connector: &dyn Connector,
    slot: &mut Option<Box<dyn Session>>,
) -> std::result::Result<(), DbError> {
    discard(slot).await;
    match open_session(connector, Scope::Database).await {
        Ok((session, transport)) => {
            info!(database = connector.database(), %transport, "database connected");
            *slot = Some(session);
            Ok(())
        }
        Err(e) => {
            warn!(database = connector.database(), error = %e, "database connect failed");
            Err(e)
        }
    }
}

pub(crate) async fn ensure_alive_in(
    connector: &dyn Connector,
    slot: &mut Option<Box<dyn Session>>,
) -> std::result::Result<(), DbError> {
    match slot.as_mut() {
        Some(session) => match session.ping().await {
            Ok(()) => return Ok(()),
            Err(e) => warn!(error = %e, "held connection is dead, reconnecting"),
        },
        None => debug!("no connection held, connecting"),
    }
    reconnect(connector, slot).await
}

/// Close and forget the held connection, ignoring close errors.
pub(crate) async fn discard(slot: &mut Option<Box<dyn Session>>) {
    if let Some(session) = slot.take() {
        if let Err(e) = session.close().await {
            debug!(error = %e, "closing stale connection failed (ignored)");
        }
    }
}

/// First non-blank line of a statement, for log fields.
fn summary(sql: &str) -> &str {
    sql.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
