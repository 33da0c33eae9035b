//! Alarm outputs and notifications for the webview shell. The frontend
//! listens for these events and drives the platform APIs.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::Serialize;
use tauri::{AppHandle, Emitter};

use crate::{
    alarm::{ActiveAlarm, AlarmPresenter, Haptics},
    notifications::{NotificationBackend, NotificationPayload, ScheduledNotification},
};

fn emit<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) -> Result<()> {
    app.emit(event, payload)
        .with_context(|| format!("failed to emit {event}"))
}

pub struct WebviewPresenter {
    app: AppHandle,
}

impl WebviewPresenter {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl AlarmPresenter for WebviewPresenter {
    fn show(&self, alarm: &ActiveAlarm) -> Result<()> {
        emit(&self.app, "alarm-ringing", alarm.clone())
    }

    fn close(&self) -> Result<()> {
        emit(&self.app, "alarm-closed", ())
    }
}

pub struct WebviewHaptics {
    app: AppHandle,
}

impl WebviewHaptics {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Haptics for WebviewHaptics {
    fn start_pattern(&self, pattern_ms: &[u64]) -> Result<()> {
        emit(&self.app, "vibration-start", pattern_ms.to_vec())
    }

    fn stop(&self) -> Result<()> {
        emit(&self.app, "vibration-stop", ())
    }
}

/// Forwards notification requests to the frontend. Unavailable until the
/// frontend reports that permission was granted.
pub struct WebviewNotifications {
    app: AppHandle,
    permitted: AtomicBool,
}

impl WebviewNotifications {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            permitted: AtomicBool::new(false),
        }
    }

    pub fn set_permitted(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::SeqCst);
    }
}

impl NotificationBackend for WebviewNotifications {
    fn is_available(&self) -> bool {
        self.permitted.load(Ordering::SeqCst)
    }

    fn schedule_repeating(&self, request: &ScheduledNotification) -> Result<()> {
        emit(&self.app, "notification-schedule", request.clone())
    }

    fn cancel(&self, id: i32) -> Result<()> {
        emit(&self.app, "notification-cancel", id)
    }

    fn fire_immediate(&self, payload: &NotificationPayload) -> Result<()> {
        emit(&self.app, "notification-now", payload.clone())
    }
}
