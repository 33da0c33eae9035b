pub mod alarm_tone;

use alarm_tone::AlarmTone;

use anyhow::{anyhow, Context, Result};
use rodio::{OutputStream, Sink};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;

use crate::alarm::{AlarmCue, CueHandle};

enum AudioCommand {
    Play {
        handle: CueHandle,
        volume: f32,
        reply: Sender<Result<(), String>>,
    },
    Stop(CueHandle),
}

/// Plays the alarm tone on a dedicated audio thread that owns the non-Send
/// rodio objects.
pub struct RodioCue {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    next_handle: AtomicU64,
}

impl RodioCue {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio sender lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut playing: Option<(CueHandle, Sink)> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play {
                            handle,
                            volume,
                            reply,
                        } => {
                            if let Some((_, sink)) = playing.take() {
                                sink.stop();
                            }

                            let result = OutputStream::try_default()
                                .map_err(|e| format!("Failed to create audio output stream: {e}"))
                                .and_then(|(stream, stream_handle)| {
                                    let sink = Sink::try_new(&stream_handle)
                                        .map_err(|e| format!("Failed to create audio sink: {e}"))?;
                                    sink.set_volume(volume.clamp(0.0, 1.0));
                                    sink.append(AlarmTone::new());
                                    sink.play();
                                    Ok((stream, sink))
                                });

                            match result {
                                Ok((stream, sink)) => {
                                    _stream = Some(stream);
                                    playing = Some((handle, sink));
                                    let _ = reply.send(Ok(()));
                                }
                                Err(err) => {
                                    _stream = None;
                                    let _ = reply.send(Err(err));
                                }
                            }
                        }
                        AudioCommand::Stop(handle) => {
                            // A stale handle belongs to a cue that was already replaced.
                            if playing.as_ref().is_some_and(|(current, _)| *current == handle) {
                                if let Some((_, sink)) = playing.take() {
                                    sink.stop();
                                }
                                _stream = None;
                            }
                        }
                    }
                }
            })
            .context("failed to spawn alarm audio thread")?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for RodioCue {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmCue for RodioCue {
    fn play_loop(&self, volume: f32) -> Result<CueHandle> {
        let tx = self.ensure_thread()?;
        let handle = CueHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let (reply_tx, reply_rx) = mpsc::channel();

        tx.send(AudioCommand::Play {
            handle,
            volume,
            reply: reply_tx,
        })
        .map_err(|_| anyhow!("alarm audio thread stopped"))?;

        reply_rx
            .recv()
            .map_err(|_| anyhow!("alarm audio thread stopped"))?
            .map_err(|err| anyhow!(err))?;
        Ok(handle)
    }

    fn stop(&self, handle: CueHandle) {
        if let Ok(tx) = self.ensure_thread() {
            let _ = tx.send(AudioCommand::Stop(handle));
        }
    }
}
