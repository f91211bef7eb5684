//! Chart-ready projections of the collection.
//!
//! Values stay opaque strings in storage. Only here are they turned into
//! numbers: numeric text is parsed, multi-selects count their selections and
//! single-selects become their 1-based position in the option list, with 0
//! reserved for "unknown".

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::collection::LogCollection;
use crate::fields::{FieldKind, LogField};
use crate::models::{RawValue, YearMonth};

/// Longest axis label shown before it is cut short with an ellipsis.
pub const MAX_LABEL_CHARS: usize = 8;

/// One day of [`time_series`] output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub values: BTreeMap<LogField, RawValue>,
}

/// Raw stored values of `fields` (every field when empty) for each logged day
/// in the inclusive window, oldest first.
pub fn time_series(
    logs: &LogCollection,
    fields: &[LogField],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<SeriesPoint> {
    let fields = if fields.is_empty() {
        &LogField::ALL[..]
    } else {
        fields
    };
    logs.within(start, end)
        .map(|record| SeriesPoint {
            date: record.date(),
            values: fields
                .iter()
                .map(|field| (*field, record.fields().value(*field)))
                .collect(),
        })
        .collect()
}

/// Encoded values of one field for every day of a month; `None` marks a day
/// with nothing logged for the field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSeries {
    pub field: LogField,
    pub values: Vec<Option<f64>>,
}

impl FieldSeries {
    pub fn has_data(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }

    pub fn label(&self, value: f64) -> String {
        decode_label(self.field, value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub month: YearMonth,
    pub days_in_month: u32,
    pub series: Vec<FieldSeries>,
}

impl MonthlySeries {
    /// A chart is only worth drawing when some requested field has a value.
    pub fn is_renderable(&self) -> bool {
        self.series.iter().any(FieldSeries::has_data)
    }

    pub fn into_renderable(self) -> Option<Self> {
        self.is_renderable().then_some(self)
    }

    pub fn field(&self, field: LogField) -> Option<&FieldSeries> {
        self.series.iter().find(|s| s.field == field)
    }
}

pub fn monthly_series(
    logs: &LogCollection,
    month: YearMonth,
    primary: LogField,
    secondary: Option<LogField>,
) -> MonthlySeries {
    let days_in_month = month.days_in_month();
    let mut fields = vec![primary];
    fields.extend(secondary.filter(|f| *f != primary));

    let series = fields
        .into_iter()
        .map(|field| {
            let mut values = vec![None; days_in_month as usize];
            for record in logs.within(Some(month.first_day()), Some(month.last_day())) {
                let index = record.date().day0() as usize;
                if let Some(slot) = values.get_mut(index) {
                    *slot = encode_value(field, &record.fields().value(field));
                }
            }
            FieldSeries { field, values }
        })
        .collect();

    MonthlySeries {
        month,
        days_in_month,
        series,
    }
}

/// Numeric form of a stored value, `None` when the value is missing.
pub fn encode_value(field: LogField, value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Missing => None,
        RawValue::Options(selected) => Some(selected.len() as f64),
        RawValue::Text(text) => Some(match field.kind() {
            FieldKind::Numeric => parse_number(text),
            FieldKind::SingleSelect(options) => encode_choice(options, text),
            FieldKind::MultiSelect(_) => 1.0,
        }),
    }
}

/// 1-based position of `value` in `options`, 0 when it is not one of them.
pub fn encode_choice(options: &[&str], value: &str) -> f64 {
    options
        .iter()
        .position(|option| *option == value)
        .map_or(0.0, |index| (index + 1) as f64)
}

fn parse_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Axis label for an encoded value. Single-select fields map back to their
/// option; everything else, and codes outside the option list, show the
/// number itself.
pub fn decode_label(field: LogField, value: f64) -> String {
    match field.kind() {
        FieldKind::SingleSelect(options) => decode_choice(options, value)
            .map(truncate_label)
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

pub fn decode_choice<'a>(options: &[&'a str], value: f64) -> Option<&'a str> {
    if !value.is_finite() {
        return None;
    }
    let index = value.round() as i64 - 1;
    usize::try_from(index)
        .ok()
        .and_then(|i| options.get(i))
        .copied()
}

fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        return label.to_string();
    }
    let head: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
    format!("{}…", head.trim_end())
}
