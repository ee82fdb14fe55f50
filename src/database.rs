use serde::{de::DeserializeOwned, Serialize};
use std::{path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{fs, sync::RwLock, time};
use tracing::error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Custom(String),
}

#[derive(Debug)]
struct DatabaseInner<T> {
    data: T,
    path: String,
}

/// JSON-file-backed store. The whole file is rewritten on every mutation,
/// and a missing or unparsable file degrades to `T::default()`.
#[derive(Clone, Debug)]
pub struct Database<T: Serialize + DeserializeOwned + Default + Send + Sync + Clone + 'static> {
    inner: Arc<RwLock<DatabaseInner<T>>>,
}

impl<T: Serialize + DeserializeOwned + Default + Send + Sync + Clone + 'static> Database<T> {
    pub async fn new(path: impl Into<String>) -> Result<Self, DbError> {
        let path = path.into();

        if let Some(parent) = Path::new(&path).parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create database directory: {}", e);
                DbError::Io(e)
            })?;
        }

        let data = if Path::new(&path).exists() {
            match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to parse database {}: {}", path, e);
                        T::default()
                    }
                },
                Err(e) => {
                    error!("Failed to read database {}: {}", path, e);
                    T::default()
                }
            }
        } else {
            T::default()
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(DatabaseInner { data, path })),
        })
    }

    async fn save(&self, data: &T) -> Result<(), DbError> {
        let path = {
            let guard = self.inner.read().await;
            guard.path.clone()
        };

        let bytes = serde_json::to_vec_pretty(data)?;

        match time::timeout(Duration::from_secs(5), fs::write(&path, bytes)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                error!("Database save operation timed out");
                Err(DbError::Custom("Save operation timed out".into()))
            }
        }
    }

    pub async fn get_data(&self) -> T {
        let guard = self.inner.read().await;
        guard.data.clone()
    }

    pub async fn transaction<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut T) -> Result<R, String>,
    {
        let mut data = self.get_data().await;
        let result = f(&mut data).map_err(DbError::Custom)?;

        self.save(&data).await?;

        let mut guard = self.inner.write().await;
        guard.data = data;

        Ok(result)
    }

    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.read().await;
        f(&guard.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        entries: HashMap<u64, String>,
        revision: u64,
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");

        let db: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        assert_eq!(db.get_data().await, Sample::default());
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let db: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        assert_eq!(db.get_data().await, Sample::default());
    }

    #[tokio::test]
    async fn transaction_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");

        let db: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        db.transaction(|data| {
            data.entries.insert(7, "seven".into());
            data.revision += 1;
            Ok(())
        })
        .await
        .unwrap();

        let reopened: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        let data = reopened.get_data().await;
        assert_eq!(data.entries.get(&7).map(String::as_str), Some("seven"));
        assert_eq!(data.revision, 1);
    }

    #[tokio::test]
    async fn failed_transaction_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");

        let db: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        let result: Result<(), DbError> = db
            .transaction(|data| {
                data.revision = 99;
                Err("rejected".into())
            })
            .await;

        assert!(matches!(result, Err(DbError::Custom(_))));
        assert_eq!(db.get_data().await.revision, 0);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn store_file_is_readable_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");

        let db: Database<Sample> = Database::new(path.to_str().unwrap()).await.unwrap();
        db.transaction(|data| {
            data.entries.insert(1, "one".into());
            Ok(())
        })
        .await
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        serde_json::from_slice::<serde_json::Value>(&bytes).unwrap();
    }
}
