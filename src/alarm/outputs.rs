use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::ActiveAlarm;

/// Identifies one playing alarm cue so a late `stop` can't silence a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CueHandle(pub u64);

/// Looping alarm sound.
pub trait AlarmCue: Send + Sync {
    fn play_loop(&self, volume: f32) -> Result<CueHandle>;
    fn stop(&self, handle: CueHandle);
}

/// Platform vibration. `pattern_ms` alternates wait and vibrate durations
/// and repeats until `stop`.
pub trait Haptics: Send + Sync {
    fn start_pattern(&self, pattern_ms: &[u64]) -> Result<()>;
    fn stop(&self) -> Result<()>;
}

/// The full-screen alarm view.
pub trait AlarmPresenter: Send + Sync {
    fn show(&self, alarm: &ActiveAlarm) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Cue used when no audio output is compiled in or available. Always fails,
/// which puts the alarm into vibration-only mode.
pub struct SilentCue;

impl AlarmCue for SilentCue {
    fn play_loop(&self, _volume: f32) -> Result<CueHandle> {
        Err(anyhow!("no audio output available"))
    }

    fn stop(&self, _handle: CueHandle) {}
}

/// Everything an alarm drives while it rings.
#[derive(Clone)]
pub struct AlarmOutputs {
    pub cue: Arc<dyn AlarmCue>,
    pub haptics: Arc<dyn Haptics>,
    pub presenter: Arc<dyn AlarmPresenter>,
}
