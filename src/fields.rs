//! The fixed catalogue of loggable fields and their option lists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const BLEEDING_OPTIONS: &[&str] = &["Spotting", "Light", "Medium", "Heavy"];
pub const BLEEDING_COLOR_OPTIONS: &[&str] = &["Pink", "Bright Red", "Dark Red", "Brown", "Black"];
pub const MOOD_OPTIONS: &[&str] = &[
    "Happy",
    "Sad",
    "Calm",
    "Anxious",
    "Irritable",
    "Energetic",
    "Tired",
    "Mood Swings",
];
pub const CRAVINGS_OPTIONS: &[&str] = &["Sweet", "Salty", "Spicy", "Carbs", "Chocolate", "Dairy"];
pub const WORK_LOAD_OPTIONS: &[&str] = &["Relaxed", "Busy", "Stressful", "Deadlines", "Overtime"];
pub const SYMPTOMS_OPTIONS: &[&str] = &[
    "Cramps",
    "Headache",
    "Bloating",
    "Back Pain",
    "Tender Breasts",
    "Acne",
    "Nausea",
    "Fatigue",
];
pub const EXERCISE_OPTIONS: &[&str] = &[
    "Walking",
    "Running",
    "Yoga",
    "Cycling",
    "Swimming",
    "Strength Training",
];
pub const YES_NO_OPTIONS: &[&str] = &["Yes", "No"];
pub const SLEEP_QUALITY_OPTIONS: &[&str] = &["Good", "Poor"];

/// How a field is entered on the daily form, and therefore how it is encoded
/// for charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free numeric text such as `"7.5"`.
    Numeric,
    /// Any subset of the options.
    MultiSelect(&'static [&'static str]),
    /// At most one of the options.
    SingleSelect(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogField {
    Bleeding,
    BleedingColor,
    PadCounts,
    Mood,
    Cravings,
    WorkLoad,
    Symptoms,
    Exercise,
    BirthControl,
    Smoke,
    Alcohol,
    SleepQuality,
    SleepHrs,
    Weight,
    Steps,
}

impl LogField {
    /// Every raw field, in form order.
    pub const ALL: [LogField; 15] = [
        LogField::Bleeding,
        LogField::BleedingColor,
        LogField::PadCounts,
        LogField::Mood,
        LogField::Cravings,
        LogField::WorkLoad,
        LogField::Symptoms,
        LogField::Exercise,
        LogField::BirthControl,
        LogField::Smoke,
        LogField::Alcohol,
        LogField::SleepQuality,
        LogField::SleepHrs,
        LogField::Weight,
        LogField::Steps,
    ];

    /// The JSON key used in the persisted layout.
    pub fn key(self) -> &'static str {
        match self {
            LogField::Bleeding => "bleeding",
            LogField::BleedingColor => "bleedingColor",
            LogField::PadCounts => "padCounts",
            LogField::Mood => "mood",
            LogField::Cravings => "cravings",
            LogField::WorkLoad => "workLoad",
            LogField::Symptoms => "symptoms",
            LogField::Exercise => "exercise",
            LogField::BirthControl => "birthControl",
            LogField::Smoke => "smoke",
            LogField::Alcohol => "alcohol",
            LogField::SleepQuality => "sleepQuality",
            LogField::SleepHrs => "sleepHrs",
            LogField::Weight => "weight",
            LogField::Steps => "steps",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            LogField::Bleeding => FieldKind::SingleSelect(BLEEDING_OPTIONS),
            LogField::BleedingColor => FieldKind::SingleSelect(BLEEDING_COLOR_OPTIONS),
            LogField::Mood => FieldKind::MultiSelect(MOOD_OPTIONS),
            LogField::Cravings => FieldKind::MultiSelect(CRAVINGS_OPTIONS),
            LogField::WorkLoad => FieldKind::MultiSelect(WORK_LOAD_OPTIONS),
            LogField::Symptoms => FieldKind::MultiSelect(SYMPTOMS_OPTIONS),
            LogField::Exercise => FieldKind::MultiSelect(EXERCISE_OPTIONS),
            LogField::BirthControl | LogField::Smoke | LogField::Alcohol => {
                FieldKind::SingleSelect(YES_NO_OPTIONS)
            }
            LogField::SleepQuality => FieldKind::SingleSelect(SLEEP_QUALITY_OPTIONS),
            LogField::PadCounts | LogField::SleepHrs | LogField::Weight | LogField::Steps => {
                FieldKind::Numeric
            }
        }
    }

    /// Option list for select fields, empty for numeric ones.
    pub fn options(self) -> &'static [&'static str] {
        match self.kind() {
            FieldKind::SingleSelect(options) | FieldKind::MultiSelect(options) => options,
            FieldKind::Numeric => &[],
        }
    }

    pub fn is_categorical(self) -> bool {
        matches!(self.kind(), FieldKind::SingleSelect(_))
    }

    pub fn accepts(self, value: &str) -> bool {
        self.options().contains(&value)
    }
}

impl fmt::Display for LogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Accepts the JSON key as well as snake/kebab spellings (`sleep_hrs`,
/// `sleep-hrs`), ignoring case.
impl FromStr for LogField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        LogField::ALL
            .into_iter()
            .find(|field| field.key().to_ascii_lowercase() == wanted)
            .ok_or_else(|| StoreError::UnknownField(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_any_spelling_of_a_field() {
        assert_eq!("sleepHrs".parse::<LogField>().unwrap(), LogField::SleepHrs);
        assert_eq!("sleep_hrs".parse::<LogField>().unwrap(), LogField::SleepHrs);
        assert_eq!("BIRTH-CONTROL".parse::<LogField>().unwrap(), LogField::BirthControl);
        assert!("hasBleeding".parse::<LogField>().is_err());
        assert!("date".parse::<LogField>().is_err());
    }

    #[test]
    fn serde_names_match_keys() {
        for field in LogField::ALL {
            let json = serde_json::to_value(field).unwrap();
            assert_eq!(json, serde_json::Value::String(field.key().to_string()));
        }
    }

    #[test]
    fn numeric_fields_have_no_options() {
        assert!(LogField::Weight.options().is_empty());
        assert!(!LogField::Weight.is_categorical());
        assert!(!LogField::Mood.is_categorical());
        assert!(LogField::Smoke.is_categorical());
        assert!(LogField::Bleeding.accepts("Heavy"));
        assert!(!LogField::Bleeding.accepts("heavy"));
    }
}
