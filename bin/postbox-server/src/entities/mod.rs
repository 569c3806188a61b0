//! SQLite persistence for messages.
//!
//! [`SqliteStore`] implements [`postbox_core::MessageStore`]; handlers and the
//! worker pool only ever see the trait.
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR`, so the directory is embedded into the
//! binary. The database file location comes from `POSTBOX_DATABASE_URL` at
//! runtime.
//!
//! # Queries
//!
//! The runtime-checked `sqlx::query` form is used so that no `DATABASE_URL`
//! environment variable is needed at compile time.

pub mod message;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://postbox.db"`
    /// or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own empty
        // database, so pin the pool to one long-lived connection.
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_options.connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}
