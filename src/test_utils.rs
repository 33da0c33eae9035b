//! Fixtures and recording fakes shared by the unit tests.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    alarm::{ActiveAlarm, AlarmCue, AlarmOutputs, AlarmPresenter, CueHandle, Haptics},
    clock::Clock,
    models::{Frequency, MedicineRecord, NewMedicine},
    notifications::{NotificationBackend, NotificationPayload, ScheduledNotification},
    store::KeyValueStore,
};

fn naive(date: (i32, u32, u32), hour: u32, minute: u32, second: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(date.0, date.1, date.2)
        .and_then(|day| day.and_hms_opt(hour, minute, second))
        .expect("valid test timestamp")
}

pub fn at(date: (i32, u32, u32), hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive(date, hour, minute, second))
}

pub fn local_at(date: (i32, u32, u32), hour: u32, minute: u32, second: u32) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive(date, hour, minute, second))
        .earliest()
        .expect("local test timestamp exists")
}

pub fn daily_medicine(name: &str, times: &[&str]) -> MedicineRecord {
    MedicineRecord {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        dosage: "100mg".to_string(),
        times: times.iter().map(|time| time.parse().unwrap()).collect(),
        frequency: Frequency::Daily,
        weekly_days: Default::default(),
        is_active: true,
        last_taken: None,
        stock: None,
        stock_alert: None,
        color: None,
        icon: None,
        category: None,
        priority: None,
        notes: None,
        created_at: Utc::now(),
    }
}

pub fn weekly_medicine(name: &str, times: &[&str], days: &[u8]) -> MedicineRecord {
    MedicineRecord {
        frequency: Frequency::Weekly,
        weekly_days: days.iter().copied().collect(),
        ..daily_medicine(name, times)
    }
}

pub fn new_medicine(name: &str, times: &[&str]) -> NewMedicine {
    NewMedicine {
        name: name.to_string(),
        dosage: "100mg".to_string(),
        times: times.iter().map(|time| time.to_string()).collect(),
        ..NewMedicine::default()
    }
}

/// Backend whose reads and writes always fail.
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Err(anyhow!("disk unavailable"))
    }

    fn save(&self, _key: &str, _bytes: &[u8]) -> Result<()> {
        Err(anyhow!("disk full"))
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Local>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Availability {
    Available,
    Unavailable,
    Failing,
}

pub struct RecordingNotifications {
    availability: Availability,
    scheduled: Mutex<Vec<ScheduledNotification>>,
    cancelled: Mutex<Vec<i32>>,
    immediate: Mutex<Vec<NotificationPayload>>,
}

impl RecordingNotifications {
    fn with(availability: Availability) -> Self {
        Self {
            availability,
            scheduled: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            immediate: Mutex::new(Vec::new()),
        }
    }

    pub fn available() -> Self {
        Self::with(Availability::Available)
    }

    pub fn unavailable() -> Self {
        Self::with(Availability::Unavailable)
    }

    /// Reports available but rejects every call.
    pub fn failing() -> Self {
        Self::with(Availability::Failing)
    }

    pub fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<i32> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn immediate(&self) -> Vec<NotificationPayload> {
        self.immediate.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match self.availability {
            Availability::Failing => Err(anyhow!("notification service rejected the request")),
            _ => Ok(()),
        }
    }
}

impl NotificationBackend for RecordingNotifications {
    fn is_available(&self) -> bool {
        self.availability != Availability::Unavailable
    }

    fn schedule_repeating(&self, request: &ScheduledNotification) -> Result<()> {
        self.check()?;
        self.scheduled.lock().unwrap().push(request.clone());
        Ok(())
    }

    fn cancel(&self, id: i32) -> Result<()> {
        self.check()?;
        self.cancelled.lock().unwrap().push(id);
        Ok(())
    }

    fn fire_immediate(&self, payload: &NotificationPayload) -> Result<()> {
        self.check()?;
        self.immediate.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingCue {
    failing: bool,
    next_handle: AtomicU64,
    plays: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingCue {
    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AlarmCue for RecordingCue {
    fn play_loop(&self, _volume: f32) -> Result<CueHandle> {
        if self.failing {
            return Err(anyhow!("no output device"));
        }
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(CueHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn stop(&self, _handle: CueHandle) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingHaptics {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl RecordingHaptics {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl Haptics for RecordingHaptics {
    fn start_pattern(&self, _pattern_ms: &[u64]) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<ActiveAlarm>>,
    closes: AtomicUsize,
}

impl RecordingPresenter {
    pub fn shown(&self) -> Vec<ActiveAlarm> {
        self.shown.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl AlarmPresenter for RecordingPresenter {
    fn show(&self, alarm: &ActiveAlarm) -> Result<()> {
        self.shown.lock().unwrap().push(alarm.clone());
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Recording doubles for every alarm output, kept so tests can inspect them
/// after handing `outputs()` to the worker.
pub struct OutputsProbe {
    pub cue: Arc<RecordingCue>,
    pub haptics: Arc<RecordingHaptics>,
    pub presenter: Arc<RecordingPresenter>,
}

impl OutputsProbe {
    pub fn new() -> Self {
        Self {
            cue: Arc::new(RecordingCue::default()),
            haptics: Arc::new(RecordingHaptics::default()),
            presenter: Arc::new(RecordingPresenter::default()),
        }
    }

    pub fn with_failing_cue() -> Self {
        Self {
            cue: Arc::new(RecordingCue {
                failing: true,
                ..RecordingCue::default()
            }),
            ..Self::new()
        }
    }

    pub fn outputs(&self) -> AlarmOutputs {
        AlarmOutputs {
            cue: self.cue.clone(),
            haptics: self.haptics.clone(),
            presenter: self.presenter.clone(),
        }
    }
}
