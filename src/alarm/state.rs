use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MedicineRecord, TimeOfDay};

/// The alarm currently ringing or waiting out a snooze.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAlarm {
    pub medicine_id: String,
    pub name: String,
    pub dosage: String,
    pub time: TimeOfDay,
    pub snooze_count: u32,
}

impl ActiveAlarm {
    pub fn for_medicine(record: &MedicineRecord, time: TimeOfDay) -> Self {
        Self {
            medicine_id: record.id.clone(),
            name: record.name.clone(),
            dosage: record.dosage.clone(),
            time,
            snooze_count: 0,
        }
    }

    fn snoozed(&self) -> Self {
        Self {
            snooze_count: self.snooze_count + 1,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AlarmState {
    #[default]
    Idle,
    Ringing {
        alarm: ActiveAlarm,
    },
    /// `alarm` already carries the incremented snooze count it will ring with.
    #[serde(rename_all = "camelCase")]
    SnoozedPending {
        alarm: ActiveAlarm,
        fire_at: DateTime<Utc>,
    },
}

impl AlarmState {
    pub fn active_alarm(&self) -> Option<&ActiveAlarm> {
        match self {
            AlarmState::Idle => None,
            AlarmState::Ringing { alarm } | AlarmState::SnoozedPending { alarm, .. } => Some(alarm),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, AlarmState::Idle)
    }
}

/// Side effects a transition asks the alarm worker to perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmEffect {
    StartCue,
    StopCue,
    StartVibration,
    StopVibration,
    Present(ActiveAlarm),
    ClosePresentation,
    RecordDose { medicine_id: String },
    ScheduleSnooze { generation: u64, delay: Duration },
    CancelSnooze,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Another alarm is ringing or snoozed; at most one exists at a time.
    AlarmActive,
    /// The user action has no alarm to act on.
    NothingRinging,
    /// A snooze timer fired for an alarm that was since resolved.
    StaleSnooze,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Applied(Vec<AlarmEffect>),
    Dropped(DropReason),
}

/// The alarm state machine. Pure: it only decides state and effects, the
/// worker in `controller` carries the effects out.
#[derive(Debug)]
pub struct AlarmMachine {
    state: AlarmState,
    snooze_delay: Duration,
    /// Bumped on every snooze so a timer can prove it is still current.
    generation: u64,
}

impl AlarmMachine {
    pub fn new(snooze_delay: Duration) -> Self {
        Self {
            state: AlarmState::Idle,
            snooze_delay,
            generation: 0,
        }
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn on_due(&mut self, alarm: ActiveAlarm) -> Transition {
        if !self.state.is_idle() {
            return Transition::Dropped(DropReason::AlarmActive);
        }
        Transition::Applied(self.ring(alarm))
    }

    pub fn on_take(&mut self) -> Transition {
        match std::mem::take(&mut self.state) {
            AlarmState::Idle => Transition::Dropped(DropReason::NothingRinging),
            AlarmState::Ringing { alarm } => {
                let mut effects = silence();
                effects.push(AlarmEffect::RecordDose {
                    medicine_id: alarm.medicine_id,
                });
                Transition::Applied(effects)
            }
            AlarmState::SnoozedPending { alarm, .. } => Transition::Applied(vec![
                AlarmEffect::CancelSnooze,
                AlarmEffect::RecordDose {
                    medicine_id: alarm.medicine_id,
                },
            ]),
        }
    }

    /// A dose marked taken outside the alarm screen. Always recorded; also
    /// resolves the alarm when it belongs to the same medicine.
    pub fn on_medicine_taken(&mut self, medicine_id: &str) -> Transition {
        if self.alarm_is_for(medicine_id) {
            return self.on_take();
        }
        Transition::Applied(vec![AlarmEffect::RecordDose {
            medicine_id: medicine_id.to_string(),
        }])
    }

    pub fn on_snooze(&mut self, now: DateTime<Utc>) -> Transition {
        let AlarmState::Ringing { alarm } = &self.state else {
            return Transition::Dropped(DropReason::NothingRinging);
        };

        let next = alarm.snoozed();
        self.generation = self.generation.wrapping_add(1);
        let fire_at = chrono::Duration::from_std(self.snooze_delay)
            .map(|delay| now + delay)
            .unwrap_or(now);
        self.state = AlarmState::SnoozedPending {
            alarm: next,
            fire_at,
        };

        let mut effects = silence();
        effects.push(AlarmEffect::ScheduleSnooze {
            generation: self.generation,
            delay: self.snooze_delay,
        });
        Transition::Applied(effects)
    }

    pub fn on_dismiss(&mut self) -> Transition {
        match std::mem::take(&mut self.state) {
            AlarmState::Idle => Transition::Dropped(DropReason::NothingRinging),
            AlarmState::Ringing { .. } => Transition::Applied(silence()),
            AlarmState::SnoozedPending { .. } => {
                Transition::Applied(vec![AlarmEffect::CancelSnooze])
            }
        }
    }

    pub fn on_snooze_elapsed(&mut self, generation: u64) -> Transition {
        match &self.state {
            AlarmState::SnoozedPending { alarm, .. } if generation == self.generation => {
                let alarm = alarm.clone();
                Transition::Applied(self.ring(alarm))
            }
            _ => Transition::Dropped(DropReason::StaleSnooze),
        }
    }

    /// The medicine was deleted or deactivated: an alarm for it goes away
    /// without recording a dose.
    pub fn on_medicine_withdrawn(&mut self, medicine_id: &str) -> Transition {
        if !self.alarm_is_for(medicine_id) {
            return Transition::Applied(Vec::new());
        }
        self.on_dismiss()
    }

    pub fn on_shutdown(&mut self) -> Vec<AlarmEffect> {
        match std::mem::take(&mut self.state) {
            AlarmState::Idle => Vec::new(),
            AlarmState::Ringing { .. } => silence(),
            AlarmState::SnoozedPending { .. } => vec![AlarmEffect::CancelSnooze],
        }
    }

    fn ring(&mut self, alarm: ActiveAlarm) -> Vec<AlarmEffect> {
        self.state = AlarmState::Ringing {
            alarm: alarm.clone(),
        };
        vec![
            AlarmEffect::StartCue,
            AlarmEffect::StartVibration,
            AlarmEffect::Present(alarm),
        ]
    }

    fn alarm_is_for(&self, medicine_id: &str) -> bool {
        self.state
            .active_alarm()
            .is_some_and(|alarm| alarm.medicine_id == medicine_id)
    }
}

fn silence() -> Vec<AlarmEffect> {
    vec![
        AlarmEffect::StopCue,
        AlarmEffect::StopVibration,
        AlarmEffect::ClosePresentation,
    ]
}
