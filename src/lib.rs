//! Local storage for daily cycle logs: one record per calendar date, the
//! date lists the calendar highlights, and chart-ready series for analytics.

pub mod collection;
pub mod config;
pub mod error;
pub mod fields;
pub mod models;
pub mod series;
pub mod session;
pub mod store;

pub use collection::LogCollection;
pub use config::Config;
pub use error::{Result, StoreError};
pub use fields::{FieldKind, LogField};
pub use models::{BleedingDay, BleedingEpisode, LogFields, LogRecord, RawValue, YearMonth};
pub use series::{FieldSeries, MonthlySeries, SeriesPoint};
pub use session::{DayEditor, DaySnapshot, DebouncedSaver};
pub use store::LogStore;
