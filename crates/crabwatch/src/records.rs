//! Sample database lookups.
//!
//! The only fact the monitor needs from the sample database is whether a
//! sample with a given name has been catalogued.

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::{AnyPool, Row};
use std::future::Future;
use thiserror::Error;

/// Lookup by exact sample name.
const FIND_SAMPLE: &str = "SELECT sample_id FROM sample WHERE name = ?";

#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RecordStoreError>;

/// System of record for catalogued outputs.
pub trait RecordStore {
    /// Identifiers of records whose name equals `name`; empty if none.
    fn find(&self, name: &str) -> impl Future<Output = Result<Vec<i64>>> + Send;
}

/// No configured store: nothing is ever recorded.
impl<T: RecordStore + Sync> RecordStore for Option<T> {
    async fn find(&self, name: &str) -> Result<Vec<i64>> {
        match self {
            Some(store) => store.find(name).await,
            None => Ok(Vec::new()),
        }
    }
}

/// [`RecordStore`] over the SQL sample database.
#[derive(Debug, Clone)]
pub struct SqlRecordStore {
    pool: AnyPool,
}

impl SqlRecordStore {
    /// Connect to the database at `url` (`mysql://...` or `sqlite://...`).
    pub async fn connect(url: &str) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }
}

impl RecordStore for SqlRecordStore {
    async fn find(&self, name: &str) -> Result<Vec<i64>> {
        let rows = sqlx::query(FIND_SAMPLE)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i64, _>(0).map_err(RecordStoreError::from))
            .collect()
    }
}
