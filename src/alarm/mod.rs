pub mod controller;
pub mod outputs;
pub mod state;

pub use controller::AlarmController;
pub use outputs::{AlarmCue, AlarmOutputs, AlarmPresenter, CueHandle, Haptics, SilentCue};
pub use state::{ActiveAlarm, AlarmState};
