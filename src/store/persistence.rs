//! The on-disk form of the collection: one JSON object in one file.
//!
//! Writes go to a uniquely named temp file in the same directory, are
//! fsynced, then renamed over the target, so a reader sees either the old
//! collection or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::collection::LogCollection;
use crate::error::{Result, StoreError};
use crate::models::{LogFields, LogRecord};

/// Well-known key the whole collection is stored under.
pub const STORAGE_KEY: &str = "activity_logs";

pub fn storage_file(data_dir: &Path) -> PathBuf {
    data_dir.join(format!("{STORAGE_KEY}.json"))
}

/// Reads the stored collection. `Ok(None)` when nothing has been stored yet.
pub(crate) async fn read(path: &Path) -> Result<Option<LogCollection>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    decode(&bytes).map(Some)
}

/// Decodes a stored payload entry by entry. Entries with a bad date key or a
/// non-object body are skipped; anything else missing from a body defaults.
pub(crate) fn decode(bytes: &[u8]) -> Result<LogCollection> {
    let payload: Value = serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        details: e.to_string(),
    })?;
    let Value::Object(entries) = payload else {
        return Err(StoreError::Decode {
            details: "top-level value is not an object".into(),
        });
    };

    let mut collection = LogCollection::new();
    for (key, body) in entries {
        let Ok(date) = NaiveDate::parse_from_str(&key, "%Y-%m-%d") else {
            tracing::warn!("⚠️ skipping stored log with invalid date key {:?}", key);
            continue;
        };
        if !body.is_object() {
            tracing::warn!("⚠️ skipping stored log for {}: not an object", date);
            continue;
        }
        match LogFields::deserialize(body) {
            Ok(fields) => {
                collection.insert(LogRecord::new(date, fields));
            }
            Err(e) => tracing::warn!("⚠️ skipping stored log for {}: {}", date, e),
        }
    }
    Ok(collection)
}

pub(crate) async fn write(path: &Path, collection: &LogCollection) -> Result<()> {
    let json = serde_json::to_vec_pretty(collection).map_err(StoreError::Serialize)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| StoreError::io(&dir, e))?;

    let tmp_path = dir.join(format!(".{STORAGE_KEY}.{}.tmp", Uuid::new_v4()));
    if let Err(e) = write_synced(&tmp_path, &json).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(bytes).await.map_err(|e| StoreError::io(path, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

/// Removes the stored collection. Removing nothing is not an error.
pub(crate) async fn remove(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
