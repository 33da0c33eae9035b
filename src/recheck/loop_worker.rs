use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    alarm::{ActiveAlarm, AlarmController},
    clock::Clock,
    notifications::NotificationScheduler,
    schedule::due_slot,
    settings::SettingsStore,
    store::MedicineStore,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// What the recheck loop reads from and feeds into.
#[derive(Clone)]
pub struct RecheckDeps {
    pub store: Arc<MedicineStore>,
    pub alarm: AlarmController,
    pub notifier: Arc<NotificationScheduler>,
    pub settings: Arc<SettingsStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Ids of every medicine found due, in list order. Only the first can
    /// claim the alarm; the rest are dropped by the alarm worker.
    pub due: Vec<String>,
    pub low_stock: Vec<String>,
}

pub async fn recheck_loop(deps: RecheckDeps, period: Duration, cancel_token: CancellationToken) {
    // The first tick completes immediately, so a dose due at startup is
    // caught without waiting a full period.
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = run_tick(&deps).await;
                if !report.due.is_empty() {
                    log_info!("Recheck found {} due medicines", report.due.len());
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("recheck loop shutting down");
                break;
            }
        }
    }
}

/// One recheck tick against a snapshot of the medicine list.
pub async fn run_tick(deps: &RecheckDeps) -> TickReport {
    let now = deps.clock.now();
    let records = deps.store.list().await;
    let low_stock_notices = deps.settings.alarm().low_stock_notices;
    let mut report = TickReport::default();

    for record in &records {
        let Some(slot) = due_slot(record, &now) else {
            continue;
        };

        deps.alarm.notify_due(ActiveAlarm::for_medicine(record, slot));
        report.due.push(record.id.clone());

        if record.is_low_stock() {
            report.low_stock.push(record.id.clone());
            if low_stock_notices {
                deps.notifier
                    .notify_now(&NotificationScheduler::low_stock_notice(record));
            }
        }
    }

    log_debug!("Recheck at {} over {} medicines", now.format("%H:%M"), records.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmState;
    use crate::config::ReminderConfig;
    use crate::models::MedicineRecord;
    use crate::store::MemoryStore;
    use crate::test_utils::{
        local_at, new_medicine, FixedClock, OutputsProbe, RecordingNotifications,
    };
    use chrono::Utc;

    struct Harness {
        deps: RecheckDeps,
        clock: Arc<FixedClock>,
        notifications: Arc<RecordingNotifications>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MedicineStore::new(Arc::new(MemoryStore::new())));
        let settings = Arc::new(SettingsStore::in_memory());
        let clock = Arc::new(FixedClock::new(local_at((2024, 1, 2), 8, 0, 0)));
        let notifications = Arc::new(RecordingNotifications::available());
        let config = ReminderConfig::default();

        let alarm = AlarmController::spawn(
            store.clone(),
            OutputsProbe::new().outputs(),
            settings.clone(),
            clock.clone(),
            &config,
        );

        Harness {
            deps: RecheckDeps {
                store,
                alarm,
                notifier: Arc::new(NotificationScheduler::new(notifications.clone(), 16)),
                settings,
                clock: clock.clone(),
            },
            clock,
            notifications,
        }
    }

    async fn add(h: &Harness, name: &str, times: &[&str], stock: Option<(u32, u32)>) -> MedicineRecord {
        let mut input = new_medicine(name, times);
        if let Some((stock, alert)) = stock {
            input.stock = Some(stock);
            input.stock_alert = Some(alert);
        }
        h.deps.store.add(input, Utc::now()).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn due_medicine_triggers_the_alarm() {
        let h = harness();
        let record = add(&h, "Aspirin", &["08:00"], None).await;
        add(&h, "Metformin", &["20:00"], None).await;

        let report = run_tick(&h.deps).await;

        assert_eq!(report.due, vec![record.id.clone()]);
        let state = h.deps.alarm.state().await;
        assert_eq!(state.active_alarm().unwrap().medicine_id, record.id);
        assert_eq!(state.active_alarm().unwrap().snooze_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn simultaneous_due_medicines_keep_only_the_first_alarm() {
        let h = harness();
        let first = add(&h, "Aspirin", &["08:00"], None).await;
        let second = add(&h, "Metformin", &["08:00"], None).await;

        let report = run_tick(&h.deps).await;

        assert_eq!(report.due, vec![first.id.clone(), second.id]);
        let state = h.deps.alarm.state().await;
        assert_eq!(state.active_alarm().unwrap().medicine_id, first.id);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_due_leaves_the_alarm_idle() {
        let h = harness();
        add(&h, "Aspirin", &["08:00"], None).await;
        h.clock.set(local_at((2024, 1, 2), 8, 1, 0));

        assert!(run_tick(&h.deps).await.due.is_empty());
        assert!(h.deps.alarm.state().await.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn low_stock_notice_fires_independently_of_the_alarm() {
        let h = harness();
        add(&h, "Aspirin", &["08:00"], None).await;
        let low = add(&h, "Metformin", &["08:00"], Some((2, 3))).await;

        let report = run_tick(&h.deps).await;

        assert_eq!(report.low_stock, vec![low.id.clone()]);
        let notices = h.notifications.immediate();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].medicine_id.as_deref(), Some(low.id.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn low_stock_notices_can_be_turned_off() {
        let h = harness();
        add(&h, "Metformin", &["08:00"], Some((0, 3))).await;
        h.deps
            .settings
            .update_alarm(crate::settings::AlarmSettings {
                low_stock_notices: false,
                ..Default::default()
            })
            .unwrap();

        let report = run_tick(&h.deps).await;

        assert_eq!(report.low_stock.len(), 1);
        assert!(h.notifications.immediate().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_evaluates_immediately_then_every_period() {
        let h = harness();
        let record = add(&h, "Aspirin", &["08:00", "08:01"], None).await;
        let token = CancellationToken::new();
        let period = Duration::from_secs(60);

        let handle = tokio::spawn(recheck_loop(h.deps.clone(), period, token.clone()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            h.deps.alarm.state().await,
            AlarmState::Ringing { .. }
        ));
        h.deps.alarm.take().await.unwrap();

        // Taken at 08:00; the 08:01 slot is more than a minute later.
        h.clock.set(local_at((2024, 1, 2), 8, 1, 5));
        tokio::time::sleep(period).await;
        let state = h.deps.alarm.state().await;
        assert_eq!(state.active_alarm().unwrap().medicine_id, record.id);
        assert_eq!(state.active_alarm().unwrap().time.to_string(), "08:01");

        token.cancel();
        handle.await.unwrap();
    }
}
