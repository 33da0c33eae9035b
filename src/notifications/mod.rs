//! Backup reminder path through the platform's scheduled notifications.
//!
//! The recheck loop only runs while the app process is alive; these
//! notifications cover the rest. Everything here is best effort: an
//! unavailable backend turns every call into a no-op and failures are only
//! logged.

mod scheduler;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use scheduler::{notification_id, NotificationScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RepeatUnit {
    Day,
    Week,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub medicine_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledNotification {
    pub id: i32,
    pub fire_at: DateTime<Utc>,
    pub repeat: RepeatUnit,
    pub payload: NotificationPayload,
}

/// Platform notification API.
pub trait NotificationBackend: Send + Sync {
    /// Capability probe: channel set up and permission granted.
    fn is_available(&self) -> bool;
    fn schedule_repeating(&self, request: &ScheduledNotification) -> Result<()>;
    fn cancel(&self, id: i32) -> Result<()>;
    fn fire_immediate(&self, payload: &NotificationPayload) -> Result<()>;
}
