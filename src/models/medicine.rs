use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::ValidationErrors;

pub const MINUTES_PER_DAY: u32 = 24 * 60;
const MIN_TEXT_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time '{0}', expected HH:MM")]
pub struct InvalidTime(pub String);

/// A 24-hour wall-clock time with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes % MINUTES_PER_DAY;
        Self {
            hour: (minutes / 60) as u8,
            minute: (minutes % 60) as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidTime;

    // Accepts `H:MM` and `HH:MM`, i.e. ^([01]?[0-9]|2[0-3]):[0-5][0-9]$
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTime(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        if !all_digits(hour) || !all_digits(minute) {
            return Err(invalid());
        }

        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = InvalidTime;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

/// One medicine with its dosing schedule and stock.
///
/// Fields added in later versions of the app are optional and default when
/// an older persisted list lacks them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicineRecord {
    pub id: String,
    pub name: String,
    pub dosage: String,
    pub times: Vec<TimeOfDay>,
    #[serde(default)]
    pub frequency: Frequency,
    /// Weekday indices, 0 = Sunday. Only consulted for weekly medicines.
    #[serde(default)]
    pub weekly_days: BTreeSet<u8>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub last_taken: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub stock_alert: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl MedicineRecord {
    pub fn is_low_stock(&self) -> bool {
        matches!((self.stock, self.stock_alert), (Some(stock), Some(alert)) if stock <= alert)
    }

    /// Take-action bookkeeping: stamps `last_taken` and uses one unit of stock.
    pub fn record_dose(&mut self, at: DateTime<Utc>) {
        self.last_taken = Some(at);
        self.stock = self.stock.map(|stock| stock.saturating_sub(1));
    }

    pub fn same_name(&self, other: &str) -> bool {
        self.name.trim().to_lowercase() == other.trim().to_lowercase()
    }
}

/// Form submission for a new medicine, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMedicine {
    pub name: String,
    pub dosage: String,
    pub times: Vec<String>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub weekly_days: Vec<u8>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub stock_alert: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewMedicine {
    /// Validates the form against the existing list and builds an active
    /// record with a fresh id. Every failing field is reported, not just the
    /// first.
    pub fn into_record(
        self,
        existing: &[MedicineRecord],
        now: DateTime<Utc>,
    ) -> Result<MedicineRecord, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim().to_string();
        if name.chars().count() < MIN_TEXT_LEN {
            errors.add("name", "name must be at least 2 characters");
        } else if existing.iter().any(|record| record.same_name(&name)) {
            errors.add("name", format!("a medicine named '{name}' already exists"));
        }

        let dosage = self.dosage.trim().to_string();
        if dosage.chars().count() < MIN_TEXT_LEN {
            errors.add("dosage", "dosage must be at least 2 characters");
        }

        let mut times = Vec::with_capacity(self.times.len());
        for raw in &self.times {
            match raw.trim().parse::<TimeOfDay>() {
                Ok(time) => times.push(time),
                Err(err) => errors.add("times", err.to_string()),
            }
        }
        if self.times.is_empty() {
            errors.add("times", "at least one time is required");
        }

        let mut weekly_days = BTreeSet::new();
        if self.frequency == Frequency::Weekly {
            for day in &self.weekly_days {
                if *day > 6 {
                    errors.add("weeklyDays", format!("weekday {day} is out of range 0-6"));
                } else {
                    weekly_days.insert(*day);
                }
            }
        }

        if self.stock_alert.is_some() && self.stock.is_none() {
            errors.add("stockAlert", "a stock alert needs a stock count");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(MedicineRecord {
            id: Uuid::new_v4().to_string(),
            name,
            dosage,
            times,
            frequency: self.frequency,
            weekly_days,
            is_active: true,
            last_taken: None,
            stock: self.stock,
            stock_alert: self.stock_alert,
            color: self.color,
            icon: self.icon,
            category: self.category,
            priority: self.priority,
            notes: self.notes,
            created_at: now,
        })
    }
}
