//! Schema self-provisioning: the target database and the `users` table are
//! created on first start, so deployment needs no migration step.
//!
//! Every step logs its failure and moves on. A server that is down at startup
//! leaves the schema unprovisioned; later statements then fail individually
//! with the server's error instead of the process refusing to start.

use tracing::{info, warn};

use crate::driver::{Connector, Scope, Session};
use crate::manager::{discard, ensure_alive_in, open_session};

/// Character set and collation of the provisioned database.
pub const CHARSET: &str = "utf8mb4";
pub const COLLATION: &str = "utf8mb4_general_ci";

pub const CREATE_USERS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id                INT AUTO_INCREMENT PRIMARY KEY,
        name              VARCHAR(255) NOT NULL,
        birth_date        DATE NOT NULL,
        national_id       VARCHAR(20) NOT NULL UNIQUE,
        room_number       VARCHAR(20) NOT NULL,
        registration_date DATE NOT NULL,
        expiry_date       DATE NOT NULL,
        created_at        TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    ) CHARACTER SET utf8mb4";

/// Quote a MySQL identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

pub fn create_database_sql(name: &str) -> String {
    format!(
        "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET {CHARSET} COLLATE {COLLATION}",
        quote_identifier(name)
    )
}

pub struct SchemaInitializer<'a> {
    connector: &'a dyn Connector,
}

impl<'a> SchemaInitializer<'a> {
    pub fn new(connector: &'a dyn Connector) -> Self {
        Self { connector }
    }

    /// Provision the schema, leaving a database-scoped connection in `slot`
    /// when the server is reachable.
    pub async fn run(&self, slot: &mut Option<Box<dyn Session>>) {
        self.create_database().await;
        self.select_database(slot).await;

        if ensure_alive_in(self.connector, slot).await.is_err() {
            warn!("schema provisioning skipped: no database connection");
            return;
        }
        let Some(session) = slot.as_mut() else {
            return;
        };

        let result = match session.execute(CREATE_USERS_TABLE, &[]).await {
            Ok(_) => session.commit().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => info!(database = self.connector.database(), "users table ready"),
            Err(e) => warn!(error = %e, "creating users table failed"),
        }
    }

    /// Server-scoped bootstrap connection, closed right after use.
    async fn create_database(&self) {
        let database = self.connector.database();
        let mut bootstrap = match open_session(self.connector, Scope::Server).await {
            Ok((session, _)) => Some(session),
            Err(e) => {
                warn!(database, error = %e, "bootstrap connection failed; database not created");
                return;
            }
        };
        if let Some(session) = bootstrap.as_mut() {
            match session.execute(&create_database_sql(database), &[]).await {
                Ok(_) => info!(database, "database ready"),
                Err(e) => warn!(database, error = %e, "creating database failed"),
            }
        }
        discard(&mut bootstrap).await;
    }

    /// Replace the held connection unless it is already scoped to the target.
    async fn select_database(&self, slot: &mut Option<Box<dyn Session>>) {
        let target = self.connector.database();
        if slot
            .as_ref()
            .is_some_and(|session| session.database() == Some(target))
        {
            return;
        }
        discard(slot).await;
        match open_session(self.connector, Scope::Database).await {
            Ok((session, transport)) => {
                info!(database = target, %transport, "using database");
                *slot = Some(session);
            }
            Err(e) => warn!(database = target, error = %e, "connecting to database failed"),
        }
    }
}
