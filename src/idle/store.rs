//! Idle-series persistence.
//!
//! Whole-series replace semantics, keyed by currency: read everything,
//! append, prune, write everything back. Last writer wins; the scheduler is
//! expected to guarantee at most one concurrent tick per currency.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::IdleSample;
use crate::error::StoreError;
use crate::exchange::types::Currency;

/// Append-only, TTL-bounded idle series storage.
#[async_trait]
pub trait IdleSeriesStore: Send + Sync {
    /// Read the full series for a currency, oldest first.
    ///
    /// A store with no series for the currency yet yields an empty series;
    /// that is a first run, not an error.
    async fn read(&self, currency: Currency) -> Result<Vec<IdleSample>, StoreError>;

    /// Replace the full series for a currency.
    async fn write(&self, currency: Currency, series: &[IdleSample]) -> Result<(), StoreError>;
}

/// File-backed store: one JSON document per currency under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, currency: Currency) -> PathBuf {
        self.dir.join(format!("idle-amounts-{currency}.json"))
    }
}

#[async_trait]
impl IdleSeriesStore for JsonFileStore {
    async fn read(&self, currency: Currency) -> Result<Vec<IdleSample>, StoreError> {
        let path = self.path_for(currency);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write(&self, currency: Currency, series: &[IdleSample]) -> Result<(), StoreError> {
        ensure_dir(&self.dir).await?;
        let json = serde_json::to_vec(series)?;
        tokio::fs::write(self.path_for(currency), json).await?;
        Ok(())
    }
}

async fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<Currency, Vec<IdleSample>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a series directly, bypassing the trait.
    pub async fn seed(&self, currency: Currency, series: Vec<IdleSample>) {
        self.series.lock().await.insert(currency, series);
    }
}

#[async_trait]
impl IdleSeriesStore for MemoryStore {
    async fn read(&self, currency: Currency) -> Result<Vec<IdleSample>, StoreError> {
        Ok(self
            .series
            .lock()
            .await
            .get(&currency)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, currency: Currency, series: &[IdleSample]) -> Result<(), StoreError> {
        self.series.lock().await.insert(currency, series.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn series() -> Vec<IdleSample> {
        vec![
            IdleSample { ts: datetime!(2024-05-01 00:00 UTC), value: dec!(100) },
            IdleSample { ts: datetime!(2024-05-02 00:00 UTC), value: dec!(250.5) },
        ]
    }

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.write(Currency::Usd, &series()).await.unwrap();
        let read = store.read(Currency::Usd).await.unwrap();

        assert_eq!(read, series());
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let read = store.read(Currency::Eur).await.unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn series_files_are_isolated_per_currency() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.write(Currency::Usd, &series()).await.unwrap();
        assert!(store.read(Currency::Gbp).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_surfaces_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        tokio::fs::write(dir.path().join("idle-amounts-USD.json"), b"not json")
            .await
            .unwrap();

        let result = store.read(Currency::Usd).await;
        assert!(matches!(result, Err(StoreError::Malformed(_))));
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.write(Currency::Usd, &series()).await.unwrap();
        assert_eq!(store.read(Currency::Usd).await.unwrap(), series());
        assert!(store.read(Currency::Eur).await.unwrap().is_empty());
    }
}
