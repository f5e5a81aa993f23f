//! Backend abstraction used by [`ConnectionManager`](crate::ConnectionManager).
//!
//! A `Connector` knows how to open connections; a `Session` is one open
//! connection. The MySQL driver and the in-memory test driver both implement
//! these traits, so the retry and provisioning logic is backend-agnostic.

use async_trait::async_trait;
use thiserror::Error;

use crate::value::{Row, Value};

/// Driver-level failure, classified so the manager can decide whether a
/// retry with a fresh connection makes sense.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    /// Socket, protocol or "server has gone away" failures.
    #[error("connection error: {0}")]
    Connection(String),

    /// TLS negotiation failed (handshake, certificate, server without TLS).
    #[error("TLS negotiation failed: {0}")]
    Tls(String),

    /// The operation exceeded the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A unique key already holds the value being written.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The server rejected a value: too long for its column, wrong type,
    /// out of range.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Any other error reported by the server.
    #[error("server error: {0}")]
    Server(String),
}

impl DbError {
    /// Whether the statement may succeed on a fresh connection.
    ///
    /// Constraint violations and rejected values fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DbError::UniqueViolation(_) | DbError::InvalidData(_))
    }
}

/// What a new connection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Server-level connection with no default database (schema bootstrap).
    Server,
    /// Connection with the configured database selected.
    Database,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tls,
    Plain,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Tls => write!(f, "TLS"),
            Transport::Plain => write!(f, "plaintext"),
        }
    }
}

/// Opens connections to one database server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name of the target database.
    fn database(&self) -> &str;

    /// `true` when an encrypted transport should be attempted first.
    fn tls_available(&self) -> bool;

    async fn open(&self, scope: Scope, transport: Transport) -> Result<Box<dyn Session>, DbError>;
}

/// One open connection.
#[async_trait]
pub trait Session: Send {
    /// Database this connection is scoped to, if any.
    fn database(&self) -> Option<&str>;

    /// Round-trip liveness check.
    async fn ping(&mut self) -> Result<(), DbError>;

    /// Run a statement; returns the affected row count.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError>;

    /// Run a query and collect every row.
    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    async fn begin(&mut self) -> Result<(), DbError>;
    async fn commit(&mut self) -> Result<(), DbError>;
    async fn rollback(&mut self) -> Result<(), DbError>;

    async fn close(self: Box<Self>) -> Result<(), DbError>;
}
