use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::fields::{FieldKind, LogField};

/// The raw, user-entered part of a day's log: exactly what the daily form
/// edits. Absent values are `None`, `""` or an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogFields {
    #[serde(deserialize_with = "lenient_choice")]
    pub bleeding: Option<String>,
    #[serde(deserialize_with = "lenient_choice")]
    pub bleeding_color: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub pad_counts: String,
    #[serde(deserialize_with = "lenient_set")]
    pub mood: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_set")]
    pub cravings: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_set")]
    pub work_load: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_set")]
    pub symptoms: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_set")]
    pub exercise: BTreeSet<String>,
    #[serde(deserialize_with = "lenient_choice")]
    pub birth_control: Option<String>,
    #[serde(deserialize_with = "lenient_choice")]
    pub smoke: Option<String>,
    #[serde(deserialize_with = "lenient_choice")]
    pub alcohol: Option<String>,
    #[serde(deserialize_with = "lenient_choice")]
    pub sleep_quality: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub sleep_hrs: String,
    #[serde(deserialize_with = "lenient_text")]
    pub weight: String,
    #[serde(deserialize_with = "lenient_text")]
    pub steps: String,
}

/// A stored value as the form holds it, or an explicit gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Missing,
    Text(String),
    Options(Vec<String>),
}

impl RawValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }
}

impl LogFields {
    fn choice(&self, field: LogField) -> Option<&Option<String>> {
        match field {
            LogField::Bleeding => Some(&self.bleeding),
            LogField::BleedingColor => Some(&self.bleeding_color),
            LogField::BirthControl => Some(&self.birth_control),
            LogField::Smoke => Some(&self.smoke),
            LogField::Alcohol => Some(&self.alcohol),
            LogField::SleepQuality => Some(&self.sleep_quality),
            _ => None,
        }
    }

    fn choice_mut(&mut self, field: LogField) -> Option<&mut Option<String>> {
        match field {
            LogField::Bleeding => Some(&mut self.bleeding),
            LogField::BleedingColor => Some(&mut self.bleeding_color),
            LogField::BirthControl => Some(&mut self.birth_control),
            LogField::Smoke => Some(&mut self.smoke),
            LogField::Alcohol => Some(&mut self.alcohol),
            LogField::SleepQuality => Some(&mut self.sleep_quality),
            _ => None,
        }
    }

    fn set(&self, field: LogField) -> Option<&BTreeSet<String>> {
        match field {
            LogField::Mood => Some(&self.mood),
            LogField::Cravings => Some(&self.cravings),
            LogField::WorkLoad => Some(&self.work_load),
            LogField::Symptoms => Some(&self.symptoms),
            LogField::Exercise => Some(&self.exercise),
            _ => None,
        }
    }

    fn set_mut(&mut self, field: LogField) -> Option<&mut BTreeSet<String>> {
        match field {
            LogField::Mood => Some(&mut self.mood),
            LogField::Cravings => Some(&mut self.cravings),
            LogField::WorkLoad => Some(&mut self.work_load),
            LogField::Symptoms => Some(&mut self.symptoms),
            LogField::Exercise => Some(&mut self.exercise),
            _ => None,
        }
    }

    fn text(&self, field: LogField) -> Option<&String> {
        match field {
            LogField::PadCounts => Some(&self.pad_counts),
            LogField::SleepHrs => Some(&self.sleep_hrs),
            LogField::Weight => Some(&self.weight),
            LogField::Steps => Some(&self.steps),
            _ => None,
        }
    }

    fn text_mut(&mut self, field: LogField) -> Option<&mut String> {
        match field {
            LogField::PadCounts => Some(&mut self.pad_counts),
            LogField::SleepHrs => Some(&mut self.sleep_hrs),
            LogField::Weight => Some(&mut self.weight),
            LogField::Steps => Some(&mut self.steps),
            _ => None,
        }
    }

    /// The stored value of `field`, or [`RawValue::Missing`].
    pub fn value(&self, field: LogField) -> RawValue {
        if let Some(choice) = self.choice(field) {
            return match choice {
                Some(v) if !v.trim().is_empty() => RawValue::Text(v.clone()),
                _ => RawValue::Missing,
            };
        }
        if let Some(set) = self.set(field) {
            return if set.is_empty() {
                RawValue::Missing
            } else {
                RawValue::Options(set.iter().cloned().collect())
            };
        }
        match self.text(field) {
            Some(text) if !text.trim().is_empty() => RawValue::Text(text.clone()),
            _ => RawValue::Missing,
        }
    }

    pub fn is_present(&self, field: LogField) -> bool {
        !self.value(field).is_missing()
    }

    pub fn has_bleeding(&self) -> bool {
        self.is_present(LogField::Bleeding)
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        !LogField::ALL.into_iter().any(|f| self.is_present(f))
    }

    /// Checks every present select value against its option list.
    pub fn validate(&self) -> Result<()> {
        self.validate_against(None)
    }

    /// Like [`LogFields::validate`], but a value outside the option list is
    /// accepted when `stored` already holds it in the same field.
    pub fn validate_against(&self, stored: Option<&LogFields>) -> Result<()> {
        for field in LogField::ALL {
            let values: Vec<&String> = match field.kind() {
                FieldKind::Numeric => continue,
                FieldKind::SingleSelect(_) => {
                    self.choice(field).and_then(Option::as_ref).into_iter().collect()
                }
                FieldKind::MultiSelect(_) => self.set(field).into_iter().flatten().collect(),
            };
            if let Some(bad) = values
                .into_iter()
                .find(|v| {
                    !v.trim().is_empty()
                        && !field.accepts(v)
                        && !stored.is_some_and(|s| s.holds(field, v))
                })
            {
                return Err(StoreError::InvalidValue {
                    field: field.key(),
                    value: bad.clone(),
                });
            }
        }
        Ok(())
    }

    fn holds(&self, field: LogField, value: &str) -> bool {
        self.choice(field)
            .is_some_and(|choice| choice.as_deref() == Some(value))
            || self.set(field).is_some_and(|set| set.contains(value))
    }

    /// Drops blank selections and trims numeric text.
    fn normalize(&mut self) {
        for field in LogField::ALL {
            if let Some(choice) = self.choice_mut(field) {
                if choice.as_deref().is_some_and(|v| v.trim().is_empty()) {
                    *choice = None;
                }
            } else if let Some(set) = self.set_mut(field) {
                set.retain(|v| !v.trim().is_empty());
            } else if let Some(text) = self.text_mut(field) {
                *text = text.trim().to_string();
            }
        }
    }

    /// Adds `option` to a multi-select field, or removes it if already
    /// selected. Returns whether the option is selected afterwards. A stored
    /// value outside the option list can be removed but not added.
    pub fn toggle_option(&mut self, field: LogField, option: &str) -> Result<bool> {
        let invalid = || StoreError::InvalidValue {
            field: field.key(),
            value: option.to_string(),
        };
        let set = self.set_mut(field).ok_or_else(invalid)?;
        if set.remove(option) {
            return Ok(false);
        }
        if !field.accepts(option) {
            return Err(invalid());
        }
        set.insert(option.to_string());
        Ok(true)
    }

    /// Sets or clears a single-select field.
    pub fn set_choice(&mut self, field: LogField, choice: Option<&str>) -> Result<()> {
        if let Some(value) = choice {
            if !field.accepts(value) {
                return Err(StoreError::InvalidValue {
                    field: field.key(),
                    value: value.to_string(),
                });
            }
        }
        let slot = self.choice_mut(field).ok_or_else(|| StoreError::InvalidValue {
            field: field.key(),
            value: choice.unwrap_or_default().to_string(),
        })?;
        *slot = choice.map(str::to_string);
        Ok(())
    }

    /// Sets a numeric-as-text field. An empty string clears it.
    pub fn set_text(&mut self, field: LogField, text: &str) -> Result<()> {
        let slot = self.text_mut(field).ok_or_else(|| StoreError::InvalidValue {
            field: field.key(),
            value: text.to_string(),
        })?;
        *slot = text.trim().to_string();
        Ok(())
    }
}

/// One persisted day. The derived flags are computed at construction and
/// cannot be edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    date: NaiveDate,
    #[serde(flatten)]
    fields: LogFields,
    has_bleeding: bool,
    has_any_activity: bool,
}

impl LogRecord {
    pub fn new(date: NaiveDate, mut fields: LogFields) -> Self {
        fields.normalize();
        let has_bleeding = fields.has_bleeding();
        let has_any_activity = !fields.is_empty();
        Self {
            date,
            fields,
            has_bleeding,
            has_any_activity,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn fields(&self) -> &LogFields {
        &self.fields
    }

    pub fn into_fields(self) -> LogFields {
        self.fields
    }

    pub fn has_bleeding(&self) -> bool {
        self.has_bleeding
    }

    pub fn has_any_activity(&self) -> bool {
        self.has_any_activity
    }
}

/// A calendar month, `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn of(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    pub fn last_day(self) -> NaiveDate {
        self.0 + chrono::Duration::days(i64::from(self.days_in_month()) - 1)
    }

    /// Calendar-correct, so February has 29 days in leap years.
    pub fn days_in_month(self) -> u32 {
        self.0
            .checked_add_months(Months::new(1))
            .map_or(31, |next| (next - self.0).num_days() as u32)
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year() && date.month() == self.month()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for YearMonth {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| StoreError::InvalidMonth(s.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(StoreError::InvalidMonth(s.to_string()));
        }
        let year: i32 = year.parse().map_err(|_| StoreError::InvalidMonth(s.to_string()))?;
        let month: u32 = month.parse().map_err(|_| StoreError::InvalidMonth(s.to_string()))?;
        YearMonth::new(year, month).ok_or_else(|| StoreError::InvalidMonth(s.to_string()))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A run of consecutive bleeding days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BleedingEpisode {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: Vec<BleedingDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BleedingDay {
    pub date: NaiveDate,
    pub intensity: String,
}

fn lenient_choice<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

// A lone string is accepted as a one-element set.
fn lenient_set<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<BTreeSet<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => BTreeSet::from([s]),
        _ => BTreeSet::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn derived_flags_follow_raw_fields() {
        let empty = LogRecord::new(date("2025-03-01"), LogFields::default());
        assert!(!empty.has_bleeding());
        assert!(!empty.has_any_activity());

        let mut fields = LogFields::default();
        fields.weight = "61.5".into();
        let weighed = LogRecord::new(date("2025-03-01"), fields);
        assert!(!weighed.has_bleeding());
        assert!(weighed.has_any_activity());

        let mut fields = LogFields::default();
        fields.bleeding = Some("Light".into());
        let bleeding = LogRecord::new(date("2025-03-01"), fields);
        assert!(bleeding.has_bleeding());
        assert!(bleeding.has_any_activity());
    }

    #[test]
    fn blank_text_is_not_activity() {
        let mut fields = LogFields::default();
        fields.steps = "   ".into();
        fields.bleeding = Some(String::new());
        assert!(fields.is_empty());
        assert!(!fields.has_bleeding());
    }

    #[test]
    fn lenient_decode_defaults_and_coerces() {
        let fields: LogFields = serde_json::from_value(json!({
            "bleeding": "",
            "mood": ["Happy", "Happy", "Sad"],
            "cravings": "Sweet",
            "weight": 60,
            "steps": null,
            "hasBleeding": true,
            "somethingNew": 3
        }))
        .unwrap();
        assert_eq!(fields.bleeding, None);
        assert_eq!(fields.mood.len(), 2);
        assert_eq!(fields.cravings, BTreeSet::from(["Sweet".to_string()]));
        assert_eq!(fields.weight, "60");
        assert_eq!(fields.steps, "");
        assert_eq!(fields.exercise, BTreeSet::new());
    }

    #[test]
    fn persisted_shape_uses_camel_case_and_derived_flags() {
        let mut fields = LogFields::default();
        fields.sleep_hrs = "7".into();
        let record = LogRecord::new(date("2025-01-02"), fields);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["date"], json!("2025-01-02"));
        assert_eq!(value["sleepHrs"], json!("7"));
        assert_eq!(value["bleedingColor"], json!(null));
        assert_eq!(value["workLoad"], json!([]));
        assert_eq!(value["hasBleeding"], json!(false));
        assert_eq!(value["hasAnyActivity"], json!(true));
    }

    #[test]
    fn validate_rejects_unknown_options() {
        let mut fields = LogFields::default();
        fields.mood.insert("Happy".into());
        assert!(fields.validate().is_ok());

        fields.mood.insert("Ecstatic".into());
        let err = fields.validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { field: "mood", .. }));

        let mut fields = LogFields::default();
        fields.smoke = Some("Maybe".into());
        assert!(fields.validate().is_err());
    }

    #[test]
    fn already_stored_unknown_options_are_kept() {
        let mut stored = LogFields::default();
        stored.bleeding = Some("Torrential".into());
        stored.mood.insert("Ecstatic".into());

        let mut edited = stored.clone();
        edited.steps = "9000".into();
        assert!(edited.validate().is_err());
        assert!(edited.validate_against(Some(&stored)).is_ok());

        let mut moved = stored.clone();
        moved.bleeding_color = Some("Torrential".into());
        assert!(matches!(
            moved.validate_against(Some(&stored)),
            Err(StoreError::InvalidValue { field: "bleedingColor", .. })
        ));

        assert!(!edited.toggle_option(LogField::Mood, "Ecstatic").unwrap());
        assert!(edited.toggle_option(LogField::Mood, "Ecstatic").is_err());
        assert!(edited.validate_against(Some(&stored)).is_ok());

        edited.mood.insert("Elated".into());
        assert!(edited.validate_against(Some(&stored)).is_err());
    }

    #[test]
    fn editing_helpers_respect_field_kinds() {
        let mut fields = LogFields::default();
        assert!(fields.toggle_option(LogField::Symptoms, "Cramps").unwrap());
        assert!(!fields.toggle_option(LogField::Symptoms, "Cramps").unwrap());
        assert!(fields.symptoms.is_empty());
        assert!(fields.toggle_option(LogField::Bleeding, "Heavy").is_err());

        fields.set_choice(LogField::Bleeding, Some("Heavy")).unwrap();
        assert_eq!(fields.value(LogField::Bleeding), RawValue::Text("Heavy".into()));
        fields.set_choice(LogField::Bleeding, None).unwrap();
        assert!(!fields.has_bleeding());
        assert!(fields.set_choice(LogField::Mood, Some("Happy")).is_err());

        fields.set_text(LogField::Steps, " 8000 ").unwrap();
        assert_eq!(fields.steps, "8000");
        assert!(fields.set_text(LogField::Alcohol, "1").is_err());
    }

    #[test]
    fn month_lengths_are_calendar_correct() {
        assert_eq!("2024-02".parse::<YearMonth>().unwrap().days_in_month(), 29);
        assert_eq!("2025-02".parse::<YearMonth>().unwrap().days_in_month(), 28);
        assert_eq!("1900-02".parse::<YearMonth>().unwrap().days_in_month(), 28);
        assert_eq!("2000-02".parse::<YearMonth>().unwrap().days_in_month(), 29);
        assert_eq!("2025-12".parse::<YearMonth>().unwrap().days_in_month(), 31);
        assert_eq!("2025-04".parse::<YearMonth>().unwrap().last_day(), date("2025-04-30"));
    }

    #[test]
    fn month_parsing_is_strict() {
        assert!("2025-3".parse::<YearMonth>().is_err());
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("2025-03-01".parse::<YearMonth>().is_err());
        let month: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(month.to_string(), "2025-03");
        assert!(month.contains(date("2025-03-31")));
        assert!(!month.contains(date("2024-03-31")));
        assert_eq!(YearMonth::of(date("2025-03-17")), month);
    }
}
