use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    clock::Clock, config::ReminderConfig, errors::AlarmError, settings::AlarmSettings,
    settings::SettingsStore, store::MedicineStore,
};

use super::{
    outputs::{AlarmOutputs, CueHandle},
    state::{AlarmEffect, AlarmMachine, DropReason, Transition},
    ActiveAlarm, AlarmState,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

type ActionReply = oneshot::Sender<Result<AlarmState, AlarmError>>;

/// Everything that can change the alarm, including timer fires. The worker
/// handles one command at a time, so no two events interleave.
enum AlarmCommand {
    Due(ActiveAlarm),
    SnoozeElapsed { generation: u64 },
    Take(ActionReply),
    Snooze(ActionReply),
    Dismiss(ActionReply),
    MedicineTaken {
        medicine_id: String,
        reply: oneshot::Sender<AlarmState>,
    },
    MedicineWithdrawn { medicine_id: String },
    Snapshot(oneshot::Sender<AlarmState>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the alarm worker task.
#[derive(Clone)]
pub struct AlarmController {
    tx: mpsc::UnboundedSender<AlarmCommand>,
}

impl AlarmController {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn(
        store: Arc<MedicineStore>,
        outputs: AlarmOutputs,
        settings: Arc<SettingsStore>,
        clock: Arc<dyn Clock>,
        config: &ReminderConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = AlarmWorker {
            machine: AlarmMachine::new(config.snooze_delay),
            outputs,
            store,
            settings,
            clock,
            vibration_pattern: config.vibration_pattern_ms.clone(),
            events: tx.downgrade(),
            cue: None,
            snooze_task: None,
        };
        tokio::spawn(worker.run(rx));

        Self { tx }
    }

    /// Due-event from the recheck loop. Dropped by the worker unless idle.
    pub fn notify_due(&self, alarm: ActiveAlarm) {
        if self.tx.send(AlarmCommand::Due(alarm)).is_err() {
            log_warn!("Alarm worker stopped; due event dropped");
        }
    }

    pub async fn take(&self) -> Result<AlarmState, AlarmError> {
        self.request(AlarmCommand::Take).await?
    }

    pub async fn snooze(&self) -> Result<AlarmState, AlarmError> {
        self.request(AlarmCommand::Snooze).await?
    }

    pub async fn dismiss(&self) -> Result<AlarmState, AlarmError> {
        self.request(AlarmCommand::Dismiss).await?
    }

    /// Records a dose taken from the medicine list.
    pub async fn medicine_taken(&self, medicine_id: &str) -> Result<AlarmState, AlarmError> {
        let medicine_id = medicine_id.to_string();
        self.request(|reply| AlarmCommand::MedicineTaken { medicine_id, reply })
            .await
    }

    /// The medicine was deleted or deactivated.
    pub fn medicine_withdrawn(&self, medicine_id: &str) {
        let command = AlarmCommand::MedicineWithdrawn {
            medicine_id: medicine_id.to_string(),
        };
        if self.tx.send(command).is_err() {
            log_debug!("Alarm worker stopped; withdrawal of {medicine_id} ignored");
        }
    }

    pub async fn state(&self) -> AlarmState {
        self.request(AlarmCommand::Snapshot)
            .await
            .unwrap_or_default()
    }

    /// Stops any cue, cancels a pending snooze and ends the worker.
    pub async fn shutdown(&self) {
        if self.request(AlarmCommand::Shutdown).await.is_err() {
            log_debug!("Alarm worker already stopped");
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> AlarmCommand,
    ) -> Result<T, AlarmError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .map_err(|_| AlarmError::Stopped)?;
        reply_rx.await.map_err(|_| AlarmError::Stopped)
    }
}

struct AlarmWorker {
    machine: AlarmMachine,
    outputs: AlarmOutputs,
    store: Arc<MedicineStore>,
    settings: Arc<SettingsStore>,
    clock: Arc<dyn Clock>,
    vibration_pattern: Vec<u64>,
    /// Weak so the worker ends once every controller handle is gone.
    events: mpsc::WeakUnboundedSender<AlarmCommand>,
    cue: Option<CueHandle>,
    snooze_task: Option<JoinHandle<()>>,
}

impl AlarmWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<AlarmCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                AlarmCommand::Due(alarm) => {
                    let name = alarm.name.clone();
                    let transition = self.machine.on_due(alarm);
                    if self.apply(transition).await {
                        log_info!("Alarm ringing for {name}");
                    }
                }
                AlarmCommand::SnoozeElapsed { generation } => {
                    let transition = self.machine.on_snooze_elapsed(generation);
                    self.apply(transition).await;
                }
                AlarmCommand::Take(reply) => {
                    let transition = self.machine.on_take();
                    let _ = reply.send(self.apply_action(transition).await);
                }
                AlarmCommand::Snooze(reply) => {
                    let now = self.clock.now().with_timezone(&Utc);
                    let transition = self.machine.on_snooze(now);
                    let _ = reply.send(self.apply_action(transition).await);
                }
                AlarmCommand::Dismiss(reply) => {
                    let transition = self.machine.on_dismiss();
                    let _ = reply.send(self.apply_action(transition).await);
                }
                AlarmCommand::MedicineTaken { medicine_id, reply } => {
                    let transition = self.machine.on_medicine_taken(&medicine_id);
                    self.apply(transition).await;
                    let _ = reply.send(self.machine.state().clone());
                }
                AlarmCommand::MedicineWithdrawn { medicine_id } => {
                    let transition = self.machine.on_medicine_withdrawn(&medicine_id);
                    self.apply(transition).await;
                }
                AlarmCommand::Snapshot(reply) => {
                    let _ = reply.send(self.machine.state().clone());
                }
                AlarmCommand::Shutdown(reply) => {
                    let effects = self.machine.on_shutdown();
                    self.execute(effects).await;
                    self.release();
                    let _ = reply.send(());
                    log_info!("Alarm worker shut down");
                    return;
                }
            }
        }

        self.release();
    }

    async fn apply(&mut self, transition: Transition) -> bool {
        match transition {
            Transition::Applied(effects) => {
                self.execute(effects).await;
                true
            }
            Transition::Dropped(reason) => {
                log_debug!("Alarm event dropped: {reason:?}");
                false
            }
        }
    }

    async fn apply_action(&mut self, transition: Transition) -> Result<AlarmState, AlarmError> {
        match transition {
            Transition::Applied(effects) => {
                self.execute(effects).await;
                Ok(self.machine.state().clone())
            }
            Transition::Dropped(DropReason::NothingRinging) => Err(AlarmError::NothingRinging),
            Transition::Dropped(reason) => {
                log_debug!("Alarm action dropped: {reason:?}");
                Err(AlarmError::NothingRinging)
            }
        }
    }

    async fn execute(&mut self, effects: Vec<AlarmEffect>) {
        let settings = self.settings.alarm();

        for effect in effects {
            match effect {
                AlarmEffect::StartCue => self.start_cue(&settings),
                AlarmEffect::StopCue => {
                    if let Some(handle) = self.cue.take() {
                        self.outputs.cue.stop(handle);
                    }
                }
                AlarmEffect::StartVibration => {
                    if settings.vibration_enabled {
                        if let Err(err) = self.outputs.haptics.start_pattern(&self.vibration_pattern) {
                            log::warn!("Vibration unavailable: {err:#}");
                        }
                    }
                }
                AlarmEffect::StopVibration => {
                    if let Err(err) = self.outputs.haptics.stop() {
                        log::warn!("Failed to stop vibration: {err:#}");
                    }
                }
                AlarmEffect::Present(alarm) => {
                    if let Err(err) = self.outputs.presenter.show(&alarm) {
                        log::error!("Failed to present alarm for {}: {err:#}", alarm.name);
                    }
                }
                AlarmEffect::ClosePresentation => {
                    if let Err(err) = self.outputs.presenter.close() {
                        log::warn!("Failed to close alarm view: {err:#}");
                    }
                }
                AlarmEffect::RecordDose { medicine_id } => {
                    let at = self.clock.now().with_timezone(&Utc);
                    match self.store.record_dose(&medicine_id, at).await {
                        Ok(record) => log_info!(
                            "Dose of {} recorded, stock {:?}",
                            record.name,
                            record.stock
                        ),
                        Err(err) => log::warn!("Could not record dose: {err}"),
                    }
                }
                AlarmEffect::ScheduleSnooze { generation, delay } => {
                    self.schedule_snooze(generation, delay);
                }
                AlarmEffect::CancelSnooze => self.cancel_snooze(),
            }
        }
    }

    // A cue failure must not keep vibration or the alarm view from starting.
    fn start_cue(&mut self, settings: &AlarmSettings) {
        if !settings.sound_enabled {
            return;
        }
        if let Some(previous) = self.cue.take() {
            self.outputs.cue.stop(previous);
        }
        match self.outputs.cue.play_loop(settings.volume) {
            Ok(handle) => self.cue = Some(handle),
            Err(err) => log_warn!("Alarm sound unavailable, vibration only: {err:#}"),
        }
    }

    fn schedule_snooze(&mut self, generation: u64, delay: Duration) {
        self.cancel_snooze();
        let events = self.events.clone();
        self.snooze_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = events.upgrade() {
                let _ = tx.send(AlarmCommand::SnoozeElapsed { generation });
            }
        }));
        log_info!("Alarm snoozed for {}s", delay.as_secs());
    }

    fn cancel_snooze(&mut self) {
        if let Some(task) = self.snooze_task.take() {
            task.abort();
        }
    }

    fn release(&mut self) {
        self.cancel_snooze();
        if let Some(handle) = self.cue.take() {
            self.outputs.cue.stop(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicineRecord, TimeOfDay};
    use crate::settings::AlarmSettings;
    use crate::store::MemoryStore;
    use crate::test_utils::{local_at, new_medicine, FixedClock, OutputsProbe};

    const SNOOZE: Duration = Duration::from_secs(300);

    struct Harness {
        controller: AlarmController,
        store: Arc<MedicineStore>,
        probe: OutputsProbe,
        record: MedicineRecord,
    }

    async fn harness_with(probe: OutputsProbe, settings: AlarmSettings) -> Harness {
        let store = Arc::new(MedicineStore::new(Arc::new(MemoryStore::new())));
        let mut input = new_medicine("Aspirin", &["08:00"]);
        input.stock = Some(1);
        let record = store.add(input, Utc::now()).await.unwrap();

        let settings_store = Arc::new(SettingsStore::in_memory());
        settings_store.update_alarm(settings).unwrap();

        let config = ReminderConfig {
            snooze_delay: SNOOZE,
            ..ReminderConfig::default()
        };
        let clock = Arc::new(FixedClock::new(local_at((2024, 1, 2), 8, 0, 0)));
        let controller = AlarmController::spawn(
            store.clone(),
            probe.outputs(),
            settings_store,
            clock,
            &config,
        );

        Harness {
            controller,
            store,
            probe,
            record,
        }
    }

    async fn harness() -> Harness {
        harness_with(OutputsProbe::new(), AlarmSettings::default()).await
    }

    fn alarm_for(record: &MedicineRecord) -> ActiveAlarm {
        ActiveAlarm::for_medicine(record, TimeOfDay::new(8, 0).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn due_event_rings_with_sound_vibration_and_view() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        let state = h.controller.state().await;
        assert_eq!(state.active_alarm().unwrap().snooze_count, 0);
        assert!(matches!(state, AlarmState::Ringing { .. }));
        assert_eq!(h.probe.cue.plays(), 1);
        assert_eq!(h.probe.haptics.starts(), 1);
        assert_eq!(h.probe.presenter.shown().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_due_event_is_dropped_while_ringing() {
        let h = harness().await;
        let first = alarm_for(&h.record);
        h.controller.notify_due(first.clone());

        let mut other = first.clone();
        other.medicine_id = "other".into();
        h.controller.notify_due(other);

        assert_eq!(h.controller.state().await, AlarmState::Ringing { alarm: first });
        assert_eq!(h.probe.presenter.shown().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn take_records_the_dose_and_silences() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        let state = h.controller.take().await.unwrap();

        assert!(state.is_idle());
        let record = h.store.get(&h.record.id).await.unwrap();
        assert_eq!(record.stock, Some(0));
        assert_eq!(
            record.last_taken,
            Some(local_at((2024, 1, 2), 8, 0, 0).with_timezone(&Utc))
        );
        assert_eq!(h.probe.cue.stops(), 1);
        assert_eq!(h.probe.haptics.stops(), 1);
        assert_eq!(h.probe.presenter.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_leaves_the_dose_unrecorded() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        assert!(h.controller.dismiss().await.unwrap().is_idle());
        let record = h.store.get(&h.record.id).await.unwrap();
        assert!(record.last_taken.is_none());
        assert_eq!(record.stock, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn actions_without_an_alarm_report_nothing_ringing() {
        let h = harness().await;
        assert_eq!(h.controller.take().await, Err(AlarmError::NothingRinging));
        assert_eq!(h.controller.snooze().await, Err(AlarmError::NothingRinging));
        assert_eq!(h.controller.dismiss().await, Err(AlarmError::NothingRinging));
    }

    #[tokio::test(start_paused = true)]
    async fn snooze_rings_again_after_the_delay() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        let state = h.controller.snooze().await.unwrap();
        assert!(matches!(state, AlarmState::SnoozedPending { .. }));
        assert_eq!(h.probe.cue.stops(), 1);

        tokio::time::sleep(SNOOZE - Duration::from_secs(1)).await;
        assert!(matches!(
            h.controller.state().await,
            AlarmState::SnoozedPending { .. }
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let state = h.controller.state().await;
        assert!(matches!(state, AlarmState::Ringing { .. }));
        assert_eq!(state.active_alarm().unwrap().snooze_count, 1);
        assert_eq!(h.probe.cue.plays(), 2);
        assert_eq!(h.probe.presenter.shown().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dismissing_a_snooze_cancels_the_retrigger() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));
        h.controller.snooze().await.unwrap();

        assert!(h.controller.dismiss().await.unwrap().is_idle());

        tokio::time::sleep(SNOOZE * 2).await;
        assert!(h.controller.state().await.is_idle());
        assert_eq!(h.probe.cue.plays(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snoozed_alarm_blocks_new_due_events() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));
        h.controller.snooze().await.unwrap();

        let mut other = alarm_for(&h.record);
        other.medicine_id = "other".into();
        h.controller.notify_due(other);

        let state = h.controller.state().await;
        assert!(matches!(state, AlarmState::SnoozedPending { .. }));
        assert_eq!(state.active_alarm().unwrap().medicine_id, h.record.id);
    }

    #[tokio::test(start_paused = true)]
    async fn cue_failure_still_vibrates_and_presents() {
        let h = harness_with(OutputsProbe::with_failing_cue(), AlarmSettings::default()).await;
        h.controller.notify_due(alarm_for(&h.record));

        assert!(matches!(h.controller.state().await, AlarmState::Ringing { .. }));
        assert_eq!(h.probe.haptics.starts(), 1);
        assert_eq!(h.probe.presenter.shown().len(), 1);

        h.controller.take().await.unwrap();
        assert_eq!(h.probe.cue.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn settings_can_mute_sound_and_vibration() {
        let settings = AlarmSettings {
            sound_enabled: false,
            vibration_enabled: false,
            ..AlarmSettings::default()
        };
        let h = harness_with(OutputsProbe::new(), settings).await;
        h.controller.notify_due(alarm_for(&h.record));

        assert!(matches!(h.controller.state().await, AlarmState::Ringing { .. }));
        assert_eq!(h.probe.cue.plays(), 0);
        assert_eq!(h.probe.haptics.starts(), 0);
        assert_eq!(h.probe.presenter.shown().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn marking_taken_from_the_list_records_without_an_alarm() {
        let h = harness().await;

        let state = h.controller.medicine_taken(&h.record.id).await.unwrap();

        assert!(state.is_idle());
        assert_eq!(h.store.get(&h.record.id).await.unwrap().stock, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn withdrawing_the_ringing_medicine_silences_it() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        h.controller.medicine_withdrawn(&h.record.id);

        assert!(h.controller.state().await.is_idle());
        assert_eq!(h.probe.cue.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_everything_and_ends_the_worker() {
        let h = harness().await;
        h.controller.notify_due(alarm_for(&h.record));

        h.controller.shutdown().await;

        assert_eq!(h.probe.cue.stops(), 1);
        assert_eq!(h.controller.take().await, Err(AlarmError::Stopped));
        assert!(h.controller.state().await.is_idle());
    }
}
