use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use crate::devices::TonePlayer;
use crate::error::{EngineError, Result};

use super::tone::ToneBurst;

enum PlayerCommand {
    PlayTone { freq_hz: f32, duration: Duration },
    Shutdown,
}

/// Tone output on top of rodio. The output context is lazily created on
/// first use, reused for every tone within a session, and explicitly closed
/// on teardown; a later tone re-opens it.
///
/// rodio's `OutputStream` is not `Send`, so a dedicated audio thread owns it
/// and is driven over an mpsc channel.
pub struct RodioTonePlayer {
    tx: Arc<Mutex<Option<Sender<PlayerCommand>>>>,
}

impl RodioTonePlayer {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<PlayerCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| EngineError::Unexpected(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<PlayerCommand>();

        thread::Builder::new()
            .name("tone-player".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> std::result::Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("failed to create audio output stream: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        PlayerCommand::PlayTone { freq_hz, duration } => {
                            if let Err(e) = ensure_sink(&mut _stream, &mut sink) {
                                log::warn!("tone playback unavailable: {e}");
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.append(ToneBurst::new(freq_hz, duration));
                            }
                        }
                        PlayerCommand::Shutdown => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                            break;
                        }
                    }
                }
            })
            .map_err(|e| EngineError::Unexpected(e.to_string()))?;

        let tx_clone = tx.clone();
        *guard = Some(tx);
        Ok(tx_clone)
    }
}

impl Default for RodioTonePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl TonePlayer for RodioTonePlayer {
    fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<()> {
        let tx = self.ensure_thread()?;
        tx.send(PlayerCommand::PlayTone { freq_hz, duration })
            .map_err(|e| EngineError::Unexpected(e.to_string()))
    }

    fn shutdown(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(PlayerCommand::Shutdown);
            }
        }
    }
}
