use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::models::{Frequency, MedicineRecord, TimeOfDay, MINUTES_PER_DAY};

/// A dose taken this recently is never due again, which keeps a tick that
/// lands twice in the matching minute from re-firing.
const TAKEN_GUARD_SECS: i64 = 60;

/// Time until the next scheduled dose, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NextDose {
    /// Weekly medicine with no dose on the current weekday.
    NotToday,
    In { hours: u32, minutes: u32 },
}

impl NextDose {
    fn from_minutes(total: u32) -> Self {
        NextDose::In {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    pub fn total_minutes(&self) -> Option<u32> {
        match self {
            NextDose::NotToday => None,
            NextDose::In { hours, minutes } => Some(hours * 60 + minutes),
        }
    }
}

/// Weekday index with 0 = Sunday.
pub fn weekday_index<Tz: TimeZone>(now: &DateTime<Tz>) -> u8 {
    now.weekday().num_days_from_sunday() as u8
}

/// Minutes since local midnight, truncated to the minute.
pub fn minute_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> u32 {
    now.hour() * 60 + now.minute()
}

pub fn is_day_active<Tz: TimeZone>(record: &MedicineRecord, now: &DateTime<Tz>) -> bool {
    match record.frequency {
        Frequency::Daily => true,
        Frequency::Weekly => record.weekly_days.contains(&weekday_index(now)),
    }
}

/// The scheduled time that makes `record` due at `now`, if any.
pub fn due_slot<Tz: TimeZone>(record: &MedicineRecord, now: &DateTime<Tz>) -> Option<TimeOfDay> {
    if !record.is_active || !is_day_active(record, now) {
        return None;
    }

    let current = minute_of_day(now);
    let slot = record
        .times
        .iter()
        .copied()
        .find(|time| time.minutes_since_midnight() == current)?;

    let recently_taken = record.last_taken.is_some_and(|taken| {
        now.with_timezone(&Utc) - taken <= Duration::seconds(TAKEN_GUARD_SECS)
    });

    (!recently_taken).then_some(slot)
}

pub fn is_due_now<Tz: TimeZone>(record: &MedicineRecord, now: &DateTime<Tz>) -> bool {
    due_slot(record, now).is_some()
}

/// Minutes until the nearest scheduled time, wrapping past midnight.
///
/// A time equal to the current minute counts as due now (zero minutes).
pub fn next_due_in<Tz: TimeZone>(record: &MedicineRecord, now: &DateTime<Tz>) -> NextDose {
    if !is_day_active(record, now) {
        return NextDose::NotToday;
    }

    let current = minute_of_day(now);
    record
        .times
        .iter()
        .map(|time| {
            let target = time.minutes_since_midnight();
            if target >= current {
                target - current
            } else {
                target + MINUTES_PER_DAY - current
            }
        })
        .min()
        .map(NextDose::from_minutes)
        .unwrap_or(NextDose::NotToday)
}
