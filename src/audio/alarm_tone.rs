use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
const TONE_HZ: f32 = 880.0;
/// One beep followed by silence, repeated forever.
const BEEP_MS: u32 = 250;
const CYCLE_MS: u32 = 600;

/// Endless beeping sine, mono.
pub struct AlarmTone {
    num_sample: u64,
    beep_samples: u64,
    cycle_samples: u64,
}

impl AlarmTone {
    pub fn new() -> Self {
        Self {
            num_sample: 0,
            beep_samples: u64::from(SAMPLE_RATE * BEEP_MS / 1000),
            cycle_samples: u64::from(SAMPLE_RATE * CYCLE_MS / 1000),
        }
    }
}

impl Iterator for AlarmTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.num_sample % self.cycle_samples;
        self.num_sample = self.num_sample.wrapping_add(1);

        if position >= self.beep_samples {
            return Some(0.0);
        }

        let t = position as f32 / SAMPLE_RATE as f32;
        Some((2.0 * PI * TONE_HZ * t).sin() * 0.4)
    }
}

impl Source for AlarmTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
