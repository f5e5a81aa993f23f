//! sqlx-backed MySQL driver.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::error::DatabaseError;
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow, MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, MySql, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use roster_core::config::ConnectSettings;

use crate::driver::{Connector, DbError, Scope, Session, Transport};
use crate::schema::CHARSET;
use crate::value::{Row, Value};

/// Opens MySQL connections from resolved settings.
pub struct MySqlConnector {
    settings: ConnectSettings,
}

impl MySqlConnector {
    pub fn new(settings: ConnectSettings) -> Self {
        Self { settings }
    }

    fn options(&self, scope: Scope, transport: Transport) -> MySqlConnectOptions {
        let s = &self.settings;
        let mut options = MySqlConnectOptions::new()
            .host(&s.host)
            .port(s.port)
            .username(&s.user)
            .password(&s.password)
            .charset(CHARSET);
        if scope == Scope::Database {
            options = options.database(&s.database);
        }
        match (transport, s.ca_file.as_deref()) {
            (Transport::Tls, Some(ca)) => options.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca),
            _ => options.ssl_mode(MySqlSslMode::Disabled),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn database(&self) -> &str {
        &self.settings.database
    }

    fn tls_available(&self) -> bool {
        self.settings.ca_file.is_some()
    }

    async fn open(&self, scope: Scope, transport: Transport) -> Result<Box<dyn Session>, DbError> {
        let options = self.options(scope, transport);
        let timeout = self.settings.timeout;
        debug!(host = %self.settings.host, port = self.settings.port, ?scope, %transport, "opening connection");

        let conn = bounded(timeout, options.connect()).await?;
        Ok(Box::new(MySqlSession {
            conn,
            database: (scope == Scope::Database).then(|| self.settings.database.clone()),
            timeout,
        }))
    }
}

pub struct MySqlSession {
    conn: MySqlConnection,
    database: Option<String>,
    timeout: Duration,
}

impl MySqlSession {
    async fn raw(&mut self, sql: &str) -> Result<u64, DbError> {
        let done = bounded(self.timeout, sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql))).await?;
        Ok(done.rows_affected())
    }
}

#[async_trait]
impl Session for MySqlSession {
    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    async fn ping(&mut self) -> Result<(), DbError> {
        bounded(self.timeout, self.conn.ping()).await
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, DbError> {
        if params.is_empty() {
            return self.raw(sql).await;
        }
        let query = bind_all(sqlx::query(sql), params);
        let done = bounded(self.timeout, query.execute(&mut self.conn)).await?;
        Ok(done.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let query = bind_all(sqlx::query(sql), params);
        let rows = bounded(self.timeout, query.fetch_all(&mut self.conn)).await?;
        rows.iter().map(convert_row).collect()
    }

    async fn begin(&mut self) -> Result<(), DbError> {
        self.raw("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.raw("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.raw("ROLLBACK").await.map(|_| ())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        let session = *self;
        bounded(session.timeout, session.conn.close()).await
    }
}

/// Run a driver future under the per-operation timeout.
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, DbError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(DbError::Timeout {
            secs: limit.as_secs(),
        }),
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &[Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Int(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Date(v) => query.bind(*v),
            Value::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Server error numbers for values the column rejects (strict mode): NULL in
/// a NOT NULL column, out of range, truncated, bad date, bad string, too long.
const DATA_ERRORS: &[u16] = &[1048, 1264, 1265, 1292, 1366, 1406];

pub fn is_data_error(number: u16) -> bool {
    DATA_ERRORS.contains(&number)
}

fn error_number(db: &dyn DatabaseError) -> Option<u16> {
    db.try_downcast_ref::<MySqlDatabaseError>()
        .map(MySqlDatabaseError::number)
}

/// Map a sqlx error onto the retry classification.
pub fn classify(err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Tls(e) => DbError::Tls(e.to_string()),
        sqlx::Error::Io(e) => DbError::Connection(e.to_string()),
        sqlx::Error::Protocol(msg) => DbError::Connection(msg),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            DbError::Connection(err.to_string())
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DbError::UniqueViolation(db.message().to_string())
        }
        sqlx::Error::Database(db) if error_number(db.as_ref()).is_some_and(is_data_error) => {
            DbError::InvalidData(db.message().to_string())
        }
        sqlx::Error::Database(db) => DbError::Server(db.message().to_string()),
        other => DbError::Server(other.to_string()),
    }
}

fn convert_row(row: &MySqlRow) -> Result<Row, DbError> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name().to_ascii_uppercase();
        out.push(column.name(), decode_column(row, index, &type_name)?);
    }
    Ok(out)
}

fn decode_column(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, DbError> {
    let raw = row.try_get_raw(index).map_err(classify)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let value = if type_name.contains("INT") || type_name == "BOOLEAN" {
        if type_name.contains("UNSIGNED") {
            let v: u64 = row.try_get(index).map_err(classify)?;
            Value::Int(i64::try_from(v).map_err(|e| DbError::Server(e.to_string()))?)
        } else {
            Value::Int(row.try_get::<i64, _>(index).map_err(classify)?)
        }
    } else if type_name == "DATE" {
        Value::Date(row.try_get::<NaiveDate, _>(index).map_err(classify)?)
    } else if type_name == "DATETIME" || type_name == "TIMESTAMP" {
        Value::Timestamp(row.try_get::<NaiveDateTime, _>(index).map_err(classify)?)
    } else {
        Value::Text(row.try_get::<String, _>(index).map_err(classify)?)
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings(ca_file: Option<PathBuf>) -> ConnectSettings {
        ConnectSettings {
            host: "db.internal".into(),
            port: 3306,
            user: "roster".into(),
            password: "secret".into(),
            database: "roster".into(),
            timeout: Duration::from_secs(10),
            ca_file,
        }
    }

    #[test]
    fn tls_is_attempted_only_with_a_ca_file() {
        assert!(!MySqlConnector::new(settings(None)).tls_available());
        assert!(MySqlConnector::new(settings(Some("ca.pem".into()))).tls_available());
    }

    #[test]
    fn io_errors_are_connection_errors() {
        let err = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        let classified = classify(err);
        assert!(matches!(classified, DbError::Connection(_)));
        assert!(classified.is_retryable());
    }

    #[test]
    fn protocol_errors_are_connection_errors() {
        assert!(matches!(
            classify(sqlx::Error::Protocol("packet out of order".into())),
            DbError::Connection(_)
        ));
    }

    #[test]
    fn strict_mode_value_errors_are_data_errors() {
        for number in [1406, 1366, 1292] {
            assert!(is_data_error(number), "{number}");
        }
        // 1062 duplicate entry and 2006 server gone away are handled elsewhere.
        assert!(!is_data_error(1062));
        assert!(!is_data_error(2006));
    }

    #[test]
    fn row_not_found_is_a_server_error() {
        assert!(matches!(classify(sqlx::Error::RowNotFound), DbError::Server(_)));
    }

    #[tokio::test]
    async fn bounded_turns_elapsed_into_timeout() {
        let never = std::future::pending::<Result<(), sqlx::Error>>();
        let err = bounded(Duration::from_millis(10), never).await.unwrap_err();
        assert_eq!(err, DbError::Timeout { secs: 0 });
    }
}
