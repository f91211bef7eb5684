//! The async store every screen talks to.
//!
//! Each operation loads the whole collection fresh from disk, so reads always
//! reflect the last successful write. Writes hold one lock per storage file
//! across load-modify-save; every store opened on the same file in this
//! process shares it. Failures are logged here and surface only as `false`
//! or an empty result.

pub mod persistence;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::collection::LogCollection;
use crate::error::{Result, StoreError};
use crate::fields::LogField;
use crate::models::{BleedingEpisode, LogFields, LogRecord, YearMonth};
use crate::series::{self, MonthlySeries, SeriesPoint};

#[derive(Debug, Clone)]
pub struct LogStore {
    path: Arc<PathBuf>,
    writer: Arc<Mutex<()>>,
}

impl LogStore {
    /// A store keeping its collection in `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self::at_path(persistence::storage_file(data_dir.as_ref()))
    }

    /// A store keeping its collection in exactly `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let writer = writer_for(&path);
        Self {
            path: Arc::new(path),
            writer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // ---- persistence ----

    /// The full collection; empty when nothing is stored or the stored
    /// payload cannot be read.
    pub async fn load_all(&self) -> LogCollection {
        match persistence::read(&self.path).await {
            Ok(Some(logs)) => {
                tracing::debug!("📖 loaded {} activity logs", logs.len());
                logs
            }
            Ok(None) => LogCollection::new(),
            Err(e) => {
                tracing::error!("❌ failed to load activity logs: {}", e);
                LogCollection::new()
            }
        }
    }

    pub async fn save_all(&self, logs: &LogCollection) -> bool {
        let _guard = self.writer.lock().await;
        self.persist(logs).await
    }

    pub async fn clear_all(&self) -> bool {
        let _guard = self.writer.lock().await;
        match persistence::remove(&self.path).await {
            Ok(()) => {
                tracing::info!("🧹 cleared all activity logs");
                true
            }
            Err(e) => {
                tracing::error!("❌ failed to clear activity logs: {}", e);
                false
            }
        }
    }

    async fn persist(&self, logs: &LogCollection) -> bool {
        match persistence::write(&self.path, logs).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("❌ failed to save activity logs: {}", e);
                false
            }
        }
    }

    /// Loads for a write. An unreadable payload counts as empty, but an I/O
    /// failure aborts the write so existing data is not overwritten.
    async fn load_for_write(&self) -> Result<LogCollection> {
        match persistence::read(&self.path).await {
            Ok(logs) => Ok(logs.unwrap_or_default()),
            Err(e @ StoreError::Decode { .. }) => {
                tracing::warn!("⚠️ replacing unreadable activity logs: {}", e);
                Ok(LogCollection::new())
            }
            Err(e) => Err(e),
        }
    }

    // ---- write path ----

    /// Replaces the whole record for `date` with `fields`, recomputing the
    /// derived flags. Select values must be options of their field, unless
    /// the record already stored for `date` holds the same value there.
    pub async fn save_log(&self, date: NaiveDate, fields: LogFields) -> bool {
        let _guard = self.writer.lock().await;
        let mut logs = match self.load_for_write().await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::error!("❌ failed to load activity logs before saving {}: {}", date, e);
                return false;
            }
        };

        let stored = logs.get(date).map(LogRecord::fields);
        if let Err(e) = fields.validate_against(stored) {
            tracing::warn!("⚠️ refusing to save log for {}: {}", date, e);
            return false;
        }

        let record = LogRecord::new(date, fields);
        let (has_bleeding, has_any_activity) = (record.has_bleeding(), record.has_any_activity());
        logs.insert(record);

        let saved = self.persist(&logs).await;
        if saved {
            tracing::info!(
                "💾 saved log for {} (bleeding: {}, activity: {})",
                date,
                has_bleeding,
                has_any_activity
            );
        }
        saved
    }

    pub async fn get_log(&self, date: NaiveDate) -> Option<LogRecord> {
        self.load_all().await.remove(date)
    }

    pub async fn delete_log(&self, date: NaiveDate) -> bool {
        let _guard = self.writer.lock().await;
        let mut logs = match self.load_for_write().await {
            Ok(logs) => logs,
            Err(e) => {
                tracing::error!("❌ failed to load activity logs before deleting {}: {}", date, e);
                return false;
            }
        };

        if logs.remove(date).is_none() {
            tracing::debug!("no log stored for {}, nothing to delete", date);
            return true;
        }

        let deleted = self.persist(&logs).await;
        if deleted {
            tracing::info!("🗑️ deleted log for {}", date);
        }
        deleted
    }

    // ---- queries ----

    pub async fn all_dates(&self) -> Vec<NaiveDate> {
        self.load_all().await.all_dates()
    }

    pub async fn dates_with_bleeding(&self) -> Vec<NaiveDate> {
        self.load_all().await.dates_with_bleeding()
    }

    pub async fn dates_with_any_activity(&self) -> Vec<NaiveDate> {
        self.load_all().await.dates_with_any_activity()
    }

    pub async fn months_with_data(&self) -> Vec<YearMonth> {
        self.load_all().await.months_with_data()
    }

    pub async fn dates_in_month(&self, month: YearMonth) -> Vec<NaiveDate> {
        self.load_all().await.dates_in_month(month)
    }

    pub async fn bleeding_episodes(&self) -> Vec<BleedingEpisode> {
        self.load_all().await.bleeding_episodes()
    }

    // ---- projection ----

    pub async fn time_series(
        &self,
        fields: &[LogField],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Vec<SeriesPoint> {
        series::time_series(&self.load_all().await, fields, start, end)
    }

    pub async fn monthly_series(
        &self,
        month: YearMonth,
        primary: LogField,
        secondary: Option<LogField>,
    ) -> MonthlySeries {
        series::monthly_series(&self.load_all().await, month, primary, secondary)
    }
}

type WriterRegistry = parking_lot::Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>;

/// The write lock for `path`, shared with every live store on the same file.
fn writer_for(path: &Path) -> Arc<Mutex<()>> {
    static WRITERS: OnceLock<WriterRegistry> = OnceLock::new();

    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut writers = WRITERS.get_or_init(Default::default).lock();
    if let Some(writer) = writers.get(&key).and_then(Weak::upgrade) {
        return writer;
    }
    writers.retain(|_, writer| writer.strong_count() > 0);
    let writer = Arc::new(Mutex::new(()));
    writers.insert(key, Arc::downgrade(&writer));
    writer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn heavy_and_happy() -> LogFields {
        let mut fields = LogFields::default();
        fields.bleeding = Some("Heavy".into());
        fields.mood = ["Happy".to_string(), "Sad".to_string()].into();
        fields
    }

    #[tokio::test]
    async fn save_then_get_returns_enriched_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());

        assert!(store.save_log(date("2025-03-10"), heavy_and_happy()).await);

        let record = store.get_log(date("2025-03-10")).await.unwrap();
        assert_eq!(record.fields(), &heavy_and_happy());
        assert!(record.has_bleeding());
        assert!(record.has_any_activity());
        assert_eq!(store.get_log(date("2025-03-11")).await, None);
    }

    #[tokio::test]
    async fn saving_replaces_the_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());

        assert!(store.save_log(date("2025-03-10"), heavy_and_happy()).await);
        let mut later = LogFields::default();
        later.steps = "5000".into();
        assert!(store.save_log(date("2025-03-10"), later.clone()).await);

        let record = store.get_log(date("2025-03-10")).await.unwrap();
        assert_eq!(record.fields(), &later);
        assert!(!record.has_bleeding());
    }

    #[tokio::test]
    async fn invalid_options_are_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());

        let mut fields = LogFields::default();
        fields.bleeding = Some("Torrential".into());
        assert!(!store.save_log(date("2025-03-10"), fields).await);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn deleting_an_unknown_date_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        assert!(store.delete_log(date("2025-03-10")).await);
        assert!(store.all_dates().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_payload_reads_as_empty_and_is_replaced_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        std::fs::write(store.path(), b"{ not json").unwrap();

        assert!(store.load_all().await.is_empty());
        assert!(store.save_log(date("2025-01-01"), heavy_and_happy()).await);
        assert_eq!(store.all_dates().await, vec![date("2025-01-01")]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        assert!(store.save_log(date("2025-01-01"), heavy_and_happy()).await);

        assert!(store.clear_all().await);
        assert!(store.all_dates().await.is_empty());
        assert!(!store.path().exists());
        assert!(store.clear_all().await);
    }

    #[tokio::test]
    async fn already_stored_legacy_values_do_not_block_other_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        std::fs::write(
            store.path(),
            br#"{"2025-01-05":{"bleeding":"Torrential","weight":"60"}}"#,
        )
        .unwrap();

        let mut fields = store.get_log(date("2025-01-05")).await.unwrap().into_fields();
        fields.steps = "9000".into();
        assert!(store.save_log(date("2025-01-05"), fields.clone()).await);

        let record = store.get_log(date("2025-01-05")).await.unwrap();
        assert_eq!(record.fields().bleeding.as_deref(), Some("Torrential"));
        assert_eq!(record.fields().steps, "9000");

        // The legacy value is only tolerated on the day that already holds it.
        assert!(!store.save_log(date("2025-01-06"), fields).await);
        assert_eq!(store.get_log(date("2025-01-06")).await, None);
    }

    #[tokio::test]
    async fn save_all_replaces_the_collection() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        assert!(store.save_log(date("2025-01-01"), heavy_and_happy()).await);

        let mut steps = LogFields::default();
        steps.steps = "7000".into();
        let logs: LogCollection = [
            LogRecord::new(date("2025-02-01"), heavy_and_happy()),
            LogRecord::new(date("2025-02-02"), steps),
        ]
        .into_iter()
        .collect();
        assert!(store.save_all(&logs).await);

        assert_eq!(store.load_all().await, logs);
        assert_eq!(
            store.all_dates().await,
            vec![date("2025-02-01"), date("2025-02-02")]
        );
    }

    #[tokio::test]
    async fn unwritable_location_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"plain file").unwrap();
        let store = LogStore::open(blocker.join("data"));

        let logs: LogCollection = [LogRecord::new(date("2025-02-01"), heavy_and_happy())]
            .into_iter()
            .collect();
        assert!(!store.save_all(&logs).await);
        assert!(!store.save_log(date("2025-02-01"), heavy_and_happy()).await);
        assert!(!store.delete_log(date("2025-02-01")).await);
        assert!(!store.clear_all().await);
        assert!(store.load_all().await.is_empty());
        assert_eq!(std::fs::read(&blocker).unwrap(), b"plain file");
    }

    #[tokio::test]
    async fn read_failure_aborts_writes_without_touching_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::open(dir.path());
        std::fs::create_dir(store.path()).unwrap();
        let kept = store.path().join("keep.txt");
        std::fs::write(&kept, b"still here").unwrap();

        assert!(!store.save_log(date("2025-03-01"), heavy_and_happy()).await);
        assert!(!store.delete_log(date("2025-03-01")).await);

        assert!(store.path().is_dir());
        assert_eq!(std::fs::read(&kept).unwrap(), b"still here");
    }

    #[tokio::test]
    async fn stores_on_the_same_file_share_one_writer() {
        let dir = tempfile::tempdir().unwrap();
        let first = LogStore::open(dir.path());
        let second = LogStore::open(dir.path());
        let elsewhere = LogStore::open(dir.path().join("other"));

        assert!(Arc::ptr_eq(&first.writer, &second.writer));
        assert!(Arc::ptr_eq(&first.writer, &first.clone().writer));
        assert!(!Arc::ptr_eq(&first.writer, &elsewhere.writer));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separately_opened_stores_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();

        let mut handles = Vec::new();
        for day in 1..=16u32 {
            let store = LogStore::open(dir.path());
            handles.push(tokio::spawn(async move {
                let mut fields = LogFields::default();
                fields.steps = (day * 100).to_string();
                store
                    .save_log(NaiveDate::from_ymd_opt(2025, 8, day).unwrap(), fields)
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(LogStore::open(dir.path()).all_dates().await.len(), 16);
    }
}
