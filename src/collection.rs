//! The in-memory date → record map and the read-only views derived from it.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{BleedingDay, BleedingEpisode, LogRecord, YearMonth};

/// Every logged day, keyed and ordered by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LogCollection {
    records: BTreeMap<NaiveDate, LogRecord>,
}

impl LogCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&LogRecord> {
        self.records.get(&date)
    }

    /// Replaces whatever was stored for the record's date.
    pub fn insert(&mut self, record: LogRecord) -> Option<LogRecord> {
        self.records.insert(record.date(), record)
    }

    pub fn remove(&mut self, date: NaiveDate) -> Option<LogRecord> {
        self.records.remove(&date)
    }

    /// Records inside the inclusive `[start, end]` window. Either bound may be
    /// open; an inverted window yields nothing.
    pub fn within(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> impl Iterator<Item = &LogRecord> {
        let inverted = matches!((start, end), (Some(s), Some(e)) if s > e);
        let bounds = (
            start.map_or(Bound::Unbounded, Bound::Included),
            end.map_or(Bound::Unbounded, Bound::Included),
        );
        let range = if inverted {
            None
        } else {
            Some(self.records.range(bounds))
        };
        range.into_iter().flatten().map(|(_, record)| record)
    }

    pub fn all_dates(&self) -> Vec<NaiveDate> {
        self.records.keys().copied().collect()
    }

    pub fn dates_with_bleeding(&self) -> Vec<NaiveDate> {
        self.dates_where(LogRecord::has_bleeding)
    }

    pub fn dates_with_any_activity(&self) -> Vec<NaiveDate> {
        self.dates_where(LogRecord::has_any_activity)
    }

    fn dates_where(&self, keep: impl Fn(&LogRecord) -> bool) -> Vec<NaiveDate> {
        self.records
            .values()
            .filter(|record| keep(*record))
            .map(LogRecord::date)
            .collect()
    }

    /// Distinct months that hold at least one record, ascending.
    pub fn months_with_data(&self) -> Vec<YearMonth> {
        self.records
            .keys()
            .map(|date| YearMonth::of(*date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn dates_in_month(&self, month: YearMonth) -> Vec<NaiveDate> {
        self.within(Some(month.first_day()), Some(month.last_day()))
            .map(LogRecord::date)
            .collect()
    }

    /// Bleeding days grouped into runs of consecutive calendar days.
    pub fn bleeding_episodes(&self) -> Vec<BleedingEpisode> {
        let mut episodes = Vec::new();
        let mut current: Vec<BleedingDay> = Vec::new();

        for record in self.records.values().filter(|r| r.has_bleeding()) {
            let day = BleedingDay {
                date: record.date(),
                intensity: record.fields().bleeding.clone().unwrap_or_default(),
            };
            let continues = current
                .last()
                .is_some_and(|prev| day.date.signed_duration_since(prev.date).num_days() == 1);
            if !continues {
                episodes.extend(close_episode(std::mem::take(&mut current)));
            }
            current.push(day);
        }
        episodes.extend(close_episode(current));

        episodes
    }
}

fn close_episode(days: Vec<BleedingDay>) -> Option<BleedingEpisode> {
    let start_date = days.first()?.date;
    let end_date = days.last()?.date;
    Some(BleedingEpisode {
        start_date,
        end_date,
        days,
    })
}

impl FromIterator<LogRecord> for LogCollection {
    fn from_iter<I: IntoIterator<Item = LogRecord>>(iter: I) -> Self {
        let mut collection = Self::new();
        for record in iter {
            collection.insert(record);
        }
        collection
    }
}
