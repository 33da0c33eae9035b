use std::time::Duration;

/// Timing and limits for the reminder core.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// Period of the recheck loop. The first evaluation happens immediately.
    pub recheck_period: Duration,

    /// How long a snoozed alarm waits before ringing again.
    pub snooze_delay: Duration,

    /// Strong repeating vibration while an alarm rings: alternating
    /// wait/vibrate durations in milliseconds.
    pub vibration_pattern_ms: Vec<u64>,

    /// Upper bound on scheduled notifications per medicine. Cancellation walks
    /// this whole range because live ids can't always be queried back.
    pub notifications_per_medicine: usize,

    /// Debug-level logging for the whole app.
    pub debug_mode: bool,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            recheck_period: Duration::from_secs(60),
            snooze_delay: Duration::from_secs(5 * 60),
            vibration_pattern_ms: vec![0, 1000, 500, 1000, 500, 1000],
            notifications_per_medicine: 16,
            debug_mode: false,
        }
    }
}

impl ReminderConfig {
    pub fn from_env() -> Self {
        let debug_mode = std::env::var("MEDMINDER_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            debug_mode,
            ..Self::default()
        }
    }
}
