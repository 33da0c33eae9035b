use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc};

use crate::models::{Frequency, MedicineRecord, TimeOfDay};

use super::{NotificationBackend, NotificationPayload, RepeatUnit, ScheduledNotification};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
/// Ids per medicine. Also the hard cap on times per medicine that get a
/// notification.
const ID_STRIDE: u32 = 32;
/// Keeps `bucket * ID_STRIDE + index` inside positive `i32`.
const ID_BUCKETS: u32 = 50_000_000;

/// Stable notification id for the `index`-th time of a medicine.
pub fn notification_id(medicine_id: &str, index: usize) -> i32 {
    let hash = medicine_id
        .bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME));
    let index = (index as u32) % ID_STRIDE;
    ((hash % ID_BUCKETS) * ID_STRIDE + index) as i32
}

pub struct NotificationScheduler {
    backend: Arc<dyn NotificationBackend>,
    per_medicine: usize,
}

impl NotificationScheduler {
    pub fn new(backend: Arc<dyn NotificationBackend>, per_medicine: usize) -> Self {
        Self {
            backend,
            per_medicine: per_medicine.clamp(1, ID_STRIDE as usize),
        }
    }

    /// Requests one repeating notification per scheduled time. Returns how
    /// many were accepted by the backend.
    pub fn schedule<Tz: TimeZone>(&self, record: &MedicineRecord, now: &DateTime<Tz>) -> usize {
        if !record.is_active || !self.backend.is_available() {
            return 0;
        }

        let repeat = match record.frequency {
            Frequency::Daily => RepeatUnit::Day,
            Frequency::Weekly => RepeatUnit::Week,
        };

        let mut scheduled = 0;
        for (index, time) in record.times.iter().enumerate().take(self.per_medicine) {
            let Some(fire_at) = first_occurrence(record, *time, now) else {
                continue;
            };

            let request = ScheduledNotification {
                id: notification_id(&record.id, index),
                fire_at,
                repeat,
                payload: dose_payload(record, *time),
            };

            match self.backend.schedule_repeating(&request) {
                Ok(()) => scheduled += 1,
                Err(err) => log::error!(
                    "Failed to schedule notification {} for {}: {err:#}",
                    request.id,
                    record.name
                ),
            }
        }

        if record.times.len() > self.per_medicine {
            log_warn!(
                "{} has {} times; only the first {} get notifications",
                record.name,
                record.times.len(),
                self.per_medicine
            );
        }

        log_info!("Scheduled {scheduled} notifications for {}", record.name);
        scheduled
    }

    /// Cancels every id a medicine could own. Most of them usually don't
    /// exist, so individual failures are only debug-logged.
    pub fn cancel(&self, medicine_id: &str) {
        if !self.backend.is_available() {
            return;
        }

        for index in 0..self.per_medicine {
            let id = notification_id(medicine_id, index);
            if let Err(err) = self.backend.cancel(id) {
                log_debug!("Cancel of notification {id} failed: {err:#}");
            }
        }
    }

    /// Cancels and reschedules every medicine, e.g. after a restart.
    pub fn resync<Tz: TimeZone>(&self, records: &[MedicineRecord], now: &DateTime<Tz>) -> usize {
        if !self.backend.is_available() {
            log_info!("Notifications unavailable; skipping resync");
            return 0;
        }

        records
            .iter()
            .map(|record| {
                self.cancel(&record.id);
                self.schedule(record, now)
            })
            .sum()
    }

    pub fn notify_now(&self, payload: &NotificationPayload) -> bool {
        if !self.backend.is_available() {
            return false;
        }

        match self.backend.fire_immediate(payload) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to show notification '{}': {err:#}", payload.title);
                false
            }
        }
    }

    pub fn low_stock_notice(record: &MedicineRecord) -> NotificationPayload {
        let remaining = record.stock.unwrap_or(0);
        NotificationPayload {
            title: format!("{} is running low", record.name),
            body: format!("{remaining} doses left. Time to refill."),
            medicine_id: Some(record.id.clone()),
        }
    }
}

fn dose_payload(record: &MedicineRecord, time: TimeOfDay) -> NotificationPayload {
    NotificationPayload {
        title: format!("Time for {}", record.name),
        body: format!("{} at {time}", record.dosage),
        medicine_id: Some(record.id.clone()),
    }
}

/// Next instant strictly after `now` at `time` on a day the medicine is
/// active. Weekly medicines start on their next listed weekday and then
/// repeat every 7 days from there, so extra weekdays are only approximated.
fn first_occurrence<Tz: TimeZone>(
    record: &MedicineRecord,
    time: TimeOfDay,
    now: &DateTime<Tz>,
) -> Option<DateTime<Utc>> {
    let at_time = NaiveTime::from_hms_opt(u32::from(time.hour()), u32::from(time.minute()), 0)?;
    let today = now.date_naive();
    let tz = now.timezone();

    (0..=7u64).find_map(|offset| {
        let day = today.checked_add_days(Days::new(offset))?;
        if record.frequency == Frequency::Weekly {
            let weekday = day.weekday().num_days_from_sunday() as u8;
            if !record.weekly_days.contains(&weekday) {
                return None;
            }
        }

        // Skips times that fall in a DST gap.
        let local = tz.from_local_datetime(&day.and_time(at_time)).earliest()?;
        (local > *now).then(|| local.with_timezone(&Utc))
    })
}
