use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    alarm::{AlarmController, AlarmOutputs},
    clock::Clock,
    config::ReminderConfig,
    errors::MedicineError,
    models::{MedicineRecord, NewMedicine},
    notifications::{NotificationBackend, NotificationPayload, NotificationScheduler},
    recheck::{RecheckDeps, RecheckLoop},
    schedule::{next_due_in, NextDose},
    settings::SettingsStore,
    store::{KeyValueStore, MedicineStore},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
    /// The medicine list couldn't be restored. No reminders run and the
    /// stored list is left untouched.
    Failed(String),
}

/// The composed reminder app: store, alarm worker, recheck loop and
/// notification adapter, plus their lifecycle.
pub struct AppContext {
    init: RwLock<InitState>,
    store: Arc<MedicineStore>,
    alarm: AlarmController,
    notifier: Arc<NotificationScheduler>,
    settings: Arc<SettingsStore>,
    clock: Arc<dyn Clock>,
    config: ReminderConfig,
    recheck: Mutex<RecheckLoop>,
}

impl AppContext {
    /// Must be called inside a tokio runtime; the alarm worker starts here.
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        notifications: Arc<dyn NotificationBackend>,
        outputs: AlarmOutputs,
        settings: Arc<SettingsStore>,
        clock: Arc<dyn Clock>,
        config: ReminderConfig,
    ) -> Self {
        let store = Arc::new(MedicineStore::new(backend));
        let notifier = Arc::new(NotificationScheduler::new(
            notifications,
            config.notifications_per_medicine,
        ));
        let alarm = AlarmController::spawn(
            store.clone(),
            outputs,
            settings.clone(),
            clock.clone(),
            &config,
        );

        Self {
            init: RwLock::new(InitState::Uninitialized),
            store,
            alarm,
            notifier,
            settings,
            clock,
            config,
            recheck: Mutex::new(RecheckLoop::new()),
        }
    }

    pub fn init_state(&self) -> InitState {
        match self.init.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_init_state(&self, state: InitState) {
        match self.init.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Restores the list, resyncs notifications and starts the recheck loop.
    /// Runs once; later calls return the current state.
    pub async fn initialize(&self) -> InitState {
        {
            let mut guard = match self.init.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *guard != InitState::Uninitialized {
                return guard.clone();
            }
            *guard = InitState::Initializing;
        }

        let count = match self.store.restore().await {
            Ok(count) => count,
            Err(err) => {
                error!("Failed to restore medicines: {err:#}");
                let state = InitState::Failed(format!("{err:#}"));
                self.set_init_state(state.clone());
                return state;
            }
        };

        let records = self.store.list().await;
        let scheduled = self.notifier.resync(&records, &self.clock.now());
        info!("Loaded {count} medicines, {scheduled} notifications scheduled");

        let deps = RecheckDeps {
            store: self.store.clone(),
            alarm: self.alarm.clone(),
            notifier: self.notifier.clone(),
            settings: self.settings.clone(),
            clock: self.clock.clone(),
        };
        if let Err(err) = self
            .recheck
            .lock()
            .await
            .start(deps, self.config.recheck_period)
        {
            warn!("Recheck loop not started: {err:#}");
        }

        self.set_init_state(InitState::Ready);
        InitState::Ready
    }

    fn ensure_ready(&self) -> Result<(), MedicineError> {
        if self.init_state() == InitState::Ready {
            Ok(())
        } else {
            Err(MedicineError::NotReady)
        }
    }

    pub fn alarm(&self) -> &AlarmController {
        &self.alarm
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub async fn medicines(&self) -> Vec<MedicineRecord> {
        self.store.list().await
    }

    pub async fn add_medicine(&self, input: NewMedicine) -> Result<MedicineRecord, MedicineError> {
        self.ensure_ready()?;
        let record = self.store.add(input, Utc::now()).await?;
        self.notifier.schedule(&record, &self.clock.now());
        Ok(record)
    }

    pub async fn toggle_medicine(&self, id: &str) -> Result<MedicineRecord, MedicineError> {
        self.ensure_ready()?;
        let record = self.store.toggle_active(id).await?;
        if record.is_active {
            self.notifier.schedule(&record, &self.clock.now());
        } else {
            self.notifier.cancel(&record.id);
            self.alarm.medicine_withdrawn(&record.id);
        }
        Ok(record)
    }

    /// Cancels the medicine's notifications before removing it.
    pub async fn delete_medicine(&self, id: &str) -> Result<MedicineRecord, MedicineError> {
        self.ensure_ready()?;
        if self.store.get(id).await.is_none() {
            return Err(MedicineError::NotFound(id.to_string()));
        }
        self.notifier.cancel(id);
        self.alarm.medicine_withdrawn(id);
        self.store.remove(id).await
    }

    /// Take-action from the medicine list. Resolves the alarm too when it is
    /// ringing or snoozed for this medicine.
    pub async fn mark_taken(&self, id: &str) -> Result<MedicineRecord, MedicineError> {
        self.ensure_ready()?;
        if self.store.get(id).await.is_none() {
            return Err(MedicineError::NotFound(id.to_string()));
        }

        if let Err(err) = self.alarm.medicine_taken(id).await {
            warn!("Alarm worker unavailable ({err}); recording dose directly");
            return self
                .store
                .record_dose(id, self.clock.now().with_timezone(&Utc))
                .await;
        }

        self.store
            .get(id)
            .await
            .ok_or_else(|| MedicineError::NotFound(id.to_string()))
    }

    pub async fn next_dose(&self, id: &str) -> Result<NextDose, MedicineError> {
        let record = self
            .store
            .get(id)
            .await
            .ok_or_else(|| MedicineError::NotFound(id.to_string()))?;
        Ok(next_due_in(&record, &self.clock.now()))
    }

    /// Reschedules every medicine's notifications, e.g. once permission is
    /// granted after startup.
    pub async fn resync_notifications(&self) -> usize {
        let records = self.store.list().await;
        self.notifier.resync(&records, &self.clock.now())
    }

    pub fn send_test_notification(&self) -> bool {
        self.notifier.notify_now(&NotificationPayload {
            title: "Test reminder".into(),
            body: "Notifications are working.".into(),
            medicine_id: None,
        })
    }

    /// Stops the recheck loop, the pending snooze timer and any alarm sound.
    pub async fn shutdown(&self) {
        if let Err(err) = self.recheck.lock().await.stop().await {
            warn!("Recheck loop did not stop cleanly: {err:#}");
        }
        self.alarm.shutdown().await;
        info!("Reminder core shut down");
    }
}
