//! `PostgreSQL` sequence store for Seatflow.
//!
//! Implements [`SequenceStore`] over a single table:
//!
//! ```sql
//! CREATE TABLE sequences (
//!     target TEXT NOT NULL,
//!     date CHAR(8) NOT NULL,
//!     no BIGINT NOT NULL,
//!     PRIMARY KEY (target, date)
//! )
//! ```
//!
//! Each increment is one `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! statement. The row lock taken by the upsert serializes concurrent callers
//! on the same `(target, date)`, so every caller sees a distinct value.
//!
//! # Example
//!
//! ```no_run
//! use seatflow_core::config::PostgresConfig;
//! use seatflow_core::sequence::SequenceIssuer;
//! use seatflow_postgres::PostgresSequenceStore;
//!
//! # async fn example() -> seatflow_core::Result<()> {
//! let store = PostgresSequenceStore::new(&PostgresConfig::default()).await?;
//! store.run_migrations().await?;
//!
//! let issuer = SequenceIssuer::new(store);
//! let no = issuer.next("order", "20250101").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use seatflow_core::config::PostgresConfig;
use seatflow_core::error::{Result, SeatflowError};
use seatflow_core::sequence::SequenceDate;
use seatflow_core::store::SequenceStore;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// `PostgreSQL`-backed sequence store.
#[derive(Debug, Clone)]
pub struct PostgresSequenceStore {
    pool: PgPool,
}

impl PostgresSequenceStore {
    /// Open a connection pool configured by `config`.
    ///
    /// # Errors
    ///
    /// - [`SeatflowError::InvalidArgument`] if the pool settings are invalid
    /// - [`SeatflowError::StoreUnavailable`] if the database cannot be reached
    pub async fn new(config: &PostgresConfig) -> Result<Self> {
        config.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| {
                SeatflowError::StoreUnavailable(format!("Failed to connect to PostgreSQL: {e}"))
            })?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `sequences` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SeatflowError::StoreUnavailable`] if the DDL fails.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS sequences (
                target TEXT NOT NULL,
                date CHAR(8) NOT NULL,
                no BIGINT NOT NULL,
                PRIMARY KEY (target, date)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            SeatflowError::StoreUnavailable(format!("Failed to create sequences table: {e}"))
        })?;

        Ok(())
    }
}

impl SequenceStore for PostgresSequenceStore {
    async fn increment(&self, target: &str, date: &SequenceDate) -> Result<u64> {
        let (no,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO sequences (target, date, no)
            VALUES ($1, $2, 1)
            ON CONFLICT (target, date)
            DO UPDATE SET no = sequences.no + 1
            RETURNING no
            ",
        )
        .bind(target)
        .bind(date.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            metrics::counter!("seatflow.sequence.store_errors").increment(1);
            SeatflowError::StoreUnavailable(format!(
                "Failed to increment sequence {target}/{date}: {e}"
            ))
        })?;

        u64::try_from(no).map_err(|_| {
            SeatflowError::StoreUnavailable(format!(
                "Sequence {target}/{date} holds negative value {no}"
            ))
        })
    }
}
