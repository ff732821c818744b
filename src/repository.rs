//! Document store connection
//!
//! Only the connection lifecycle lives here: connect, verify with a ping,
//! hand out the database handle, disconnect on shutdown.

use mongodb::{bson::doc, options::ClientOptions, Client, Database};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::logger::Logger;

pub struct DocumentStore {
    client: Client,
    database: Database,
    logger: Logger,
}

impl DocumentStore {
    /// Connect and ping. Any failure is a [`Error::DatastoreConnection`];
    /// the caller decides whether that is fatal.
    pub async fn connect(cfg: &DatabaseConfig, logger: &Logger) -> Result<Self> {
        let mut options = ClientOptions::parse(cfg.connection_uri())
            .await
            .map_err(|e| Error::datastore("invalid connection string", e))?;
        options.connect_timeout = Some(cfg.timeout);
        options.server_selection_timeout = Some(cfg.timeout);

        let client = Client::with_options(options)
            .map_err(|e| Error::datastore("failed to create client", e))?;
        let database = client.database(&cfg.name);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| Error::datastore("ping failed", e))?;

        logger.in_scope(|| {
            tracing::info!(
                host = %cfg.host,
                port = cfg.port,
                database = %cfg.name,
                tls = cfg.tls_mode,
                "connected to document store"
            )
        });

        Ok(Self {
            client,
            database,
            logger: logger.clone(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Close all pooled connections, waiting for in-use ones to be returned.
    pub async fn disconnect(self) {
        self.client.shutdown().await;
        self.logger
            .in_scope(|| tracing::info!("disconnected from document store"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn quiet_logger() -> Logger {
        Logger::with_writer(
            &crate::config::LogConfig::default(),
            "svc",
            std::io::sink,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_connection_string_is_a_connection_failure() {
        let cfg = DatabaseConfig {
            uri: Some("not-a-mongodb-uri".to_string()),
            host: String::new(),
            port: 27017,
            user: String::new(),
            password: String::new(),
            name: "admin".to_string(),
            tls_mode: false,
            timeout: Duration::from_millis(100),
        };

        let result = DocumentStore::connect(&cfg, &quiet_logger()).await;
        match result {
            Err(Error::DatastoreConnection { context, .. }) => {
                assert_eq!(context, "invalid connection string");
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("connection should fail"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_ping() {
        let cfg = DatabaseConfig {
            uri: None,
            host: "127.0.0.1".to_string(),
            // Reserved port, nothing listens there
            port: 1,
            user: "app".to_string(),
            password: "secret".to_string(),
            name: "admin".to_string(),
            tls_mode: false,
            timeout: Duration::from_millis(200),
        };

        let result = DocumentStore::connect(&cfg, &quiet_logger()).await;
        assert!(matches!(result, Err(Error::DatastoreConnection { .. })));
    }
}
