//! Editing one day at a time.
//!
//! [`DayEditor`] owns a local copy of the selected day's fields; every edit
//! changes only that copy and then hands a snapshot to a [`DebouncedSaver`],
//! which persists the latest snapshot per date once edits have been quiet for
//! the debounce window.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::Result;
use crate::fields::LogField;
use crate::models::LogFields;
use crate::store::LogStore;

/// The full field set of one day at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySnapshot {
    pub date: NaiveDate,
    pub fields: LogFields,
}

enum Command {
    Save(DaySnapshot),
    Flush(oneshot::Sender<bool>),
}

/// Background writer that collapses bursts of edits into one write per date.
/// Each date is written once its own edits have been quiet for the window,
/// regardless of edits to other dates.
///
/// An all-empty snapshot deletes the day instead of storing an empty record.
pub struct DebouncedSaver {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl DebouncedSaver {
    pub fn spawn(store: LogStore, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_saver(store, window, rx));
        Self { tx, task }
    }

    /// Queues `snapshot`, replacing any pending snapshot for the same date.
    pub fn submit(&self, snapshot: DaySnapshot) {
        if self.tx.send(Command::Save(snapshot)).is_err() {
            tracing::error!("❌ debounced saver stopped, dropping edit");
        }
    }

    /// Writes everything pending now. Returns whether every write succeeded.
    pub async fn flush(&self) -> bool {
        let (reply, done) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_err() {
            return false;
        }
        done.await.unwrap_or(false)
    }

    /// Flushes, then stops the background task.
    pub async fn shutdown(self) -> bool {
        let flushed = self.flush().await;
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::error!("❌ debounced saver task failed: {}", e);
            return false;
        }
        flushed
    }
}

async fn run_saver(store: LogStore, window: Duration, mut rx: mpsc::UnboundedReceiver<Command>) {
    // Each date waits out its own quiet window.
    let mut pending: BTreeMap<NaiveDate, (LogFields, Instant)> = BTreeMap::new();

    loop {
        let next_due = pending.values().map(|(_, due)| *due).min();
        let command = match next_due {
            None => rx.recv().await,
            Some(due) => tokio::select! {
                command = rx.recv() => command,
                () = sleep_until(due) => {
                    write_due(&store, &mut pending, Instant::now()).await;
                    continue;
                }
            },
        };

        match command {
            Some(Command::Save(snapshot)) => {
                pending.insert(snapshot.date, (snapshot.fields, Instant::now() + window));
            }
            Some(Command::Flush(reply)) => {
                let ok = write_all(&store, std::mem::take(&mut pending)).await;
                let _ = reply.send(ok);
            }
            None => {
                write_all(&store, std::mem::take(&mut pending)).await;
                break;
            }
        }
    }
}

async fn write_due(
    store: &LogStore,
    pending: &mut BTreeMap<NaiveDate, (LogFields, Instant)>,
    now: Instant,
) {
    let (ready, waiting) = std::mem::take(pending)
        .into_iter()
        .partition(|(_, (_, due))| *due <= now);
    *pending = waiting;
    write_all(store, ready).await;
}

async fn write_all(store: &LogStore, ready: BTreeMap<NaiveDate, (LogFields, Instant)>) -> bool {
    let mut ok = true;
    for (date, (fields, _)) in ready {
        let written = if fields.is_empty() {
            store.delete_log(date).await
        } else {
            store.save_log(date, fields).await
        };
        ok &= written;
    }
    ok
}

/// Local state of the daily form.
pub struct DayEditor {
    store: LogStore,
    saver: DebouncedSaver,
    date: NaiveDate,
    fields: LogFields,
}

impl DayEditor {
    /// Opens the editor on `date`, loading whatever is stored for it.
    pub async fn open(store: LogStore, saver: DebouncedSaver, date: NaiveDate) -> Self {
        let fields = load_fields(&store, date).await;
        Self {
            store,
            saver,
            date,
            fields,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn fields(&self) -> &LogFields {
        &self.fields
    }

    /// Moves to another day. Pending edits of the current day are written
    /// first so the newly loaded state is never behind them.
    pub async fn select(&mut self, date: NaiveDate) -> bool {
        let flushed = self.saver.flush().await;
        self.date = date;
        self.fields = load_fields(&self.store, date).await;
        flushed
    }

    pub fn toggle_option(&mut self, field: LogField, option: &str) -> Result<bool> {
        let selected = self.fields.toggle_option(field, option)?;
        self.changed();
        Ok(selected)
    }

    pub fn set_choice(&mut self, field: LogField, choice: Option<&str>) -> Result<()> {
        self.fields.set_choice(field, choice)?;
        self.changed();
        Ok(())
    }

    pub fn set_text(&mut self, field: LogField, text: &str) -> Result<()> {
        self.fields.set_text(field, text)?;
        self.changed();
        Ok(())
    }

    /// Empties the day; once saved this removes its record.
    pub fn clear(&mut self) {
        self.fields = LogFields::default();
        self.changed();
    }

    fn changed(&self) {
        self.saver.submit(DaySnapshot {
            date: self.date,
            fields: self.fields.clone(),
        });
    }

    pub async fn flush(&self) -> bool {
        self.saver.flush().await
    }

    /// Writes anything pending and stops the saver.
    pub async fn close(self) -> bool {
        self.saver.shutdown().await
    }
}

async fn load_fields(store: &LogStore, date: NaiveDate) -> LogFields {
    store
        .get_log(date)
        .await
        .map(|record| record.into_fields())
        .unwrap_or_default()
}
