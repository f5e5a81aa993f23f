//! `roster-store`: persistent-connection data access for the residency roster.
//!
//! # Layers
//!
//! | Module      | Role                                                          |
//! |-------------|---------------------------------------------------------------|
//! | `driver`    | `Connector` / `Session` traits every backend implements       |
//! | `mysql`     | sqlx-backed MySQL driver (TLS first, plaintext fallback)      |
//! | `memory`    | In-memory driver with fault injection (feature `memory`)      |
//! | `manager`   | [`ConnectionManager`]: one shared connection, bounded retry   |
//! | `schema`    | Creates the database and the `users` table on first start     |
//! | `records`   | [`RecordService`]: create / delete / renew / lookup           |
//! | `scanner`   | [`ExpiryScanner`]: expired vs. expiring-soon partition        |

pub mod driver;
pub mod error;
pub mod manager;
pub mod mysql;
pub mod records;
pub mod retry;
pub mod scanner;
pub mod schema;
pub mod value;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use driver::{Connector, DbError, Scope, Session, Transport};
pub use error::{Result, StoreError};
pub use manager::ConnectionManager;
pub use records::RecordService;
pub use retry::RetryPolicy;
pub use scanner::{ExpiryReport, ExpiryScanner, ReportLine};
pub use value::{Row, Value};
