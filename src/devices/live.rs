//! Live microphone backend on top of cpal.
//!
//! cpal streams are not `Send`, so a dedicated capture thread owns the
//! stream and forwards sample chunks over a channel, the same shape as the
//! dedicated audio-output thread in `audio::player`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use crate::devices::{MicStream, MicrophoneBackend};
use crate::error::{EngineError, Result};

const WORKER_POLL: Duration = Duration::from_millis(20);

/// Default-input-device microphone backend.
pub struct CpalMicrophone;

impl MicrophoneBackend for CpalMicrophone {
    fn acquire(&self) -> Result<Box<dyn MicStream>> {
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<f32>>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_worker = Arc::clone(&stop);

        thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_worker(chunk_tx, ready_tx, stop_worker))
            .map_err(|e| EngineError::Unexpected(format!("failed to spawn mic thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalMicStream {
                chunks: chunk_rx,
                stop,
            })),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EngineError::DeviceUnavailable(
                "microphone worker exited before opening a stream".to_string(),
            )),
        }
    }
}

fn capture_worker(chunk_tx: Sender<Vec<f32>>, ready_tx: Sender<Result<()>>, stop: Arc<AtomicBool>) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready_tx.send(Err(EngineError::DeviceUnavailable(
            "no default input device".to_string(),
        )));
        return;
    };

    let config = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(EngineError::DeviceUnavailable(format!(
                "no usable input config: {e}"
            ))));
            return;
        }
    };

    if config.sample_format() != SampleFormat::F32 {
        let _ = ready_tx.send(Err(EngineError::DeviceUnavailable(format!(
            "unsupported input sample format: {:?}",
            config.sample_format()
        ))));
        return;
    }

    // A present device that fails to open is not "unavailable"; the anyhow
    // context chain is folded into `Unexpected` at the boundary.
    let stream = match open_stream(&device, config, chunk_tx) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready_tx.send(Err(err.into()));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(WORKER_POLL);
    }
    // Dropping the stream here releases the device on the owning thread.
    drop(stream);
}

fn open_stream(
    device: &cpal::Device,
    config: cpal::SupportedStreamConfig,
    chunk_tx: Sender<Vec<f32>>,
) -> anyhow::Result<cpal::Stream> {
    let stream = device
        .build_input_stream(
            &config.into(),
            move |data: &[f32], _| {
                let _ = chunk_tx.send(data.to_vec());
            },
            |err| log::warn!("microphone stream error: {err}"),
            None,
        )
        .context("failed to open input stream")?;
    stream.play().context("failed to start input stream")?;
    Ok(stream)
}

struct CpalMicStream {
    chunks: Receiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
}

impl MicStream for CpalMicStream {
    fn window_rms(&mut self) -> Result<Option<f64>> {
        let mut sum_squares = 0.0f64;
        let mut count = 0usize;
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => {
                    for sample in chunk {
                        sum_squares += (sample as f64) * (sample as f64);
                        count += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if count == 0 {
                        return Err(EngineError::DeviceUnavailable(
                            "microphone stream closed".to_string(),
                        ));
                    }
                    break;
                }
            }
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some((sum_squares / count as f64).sqrt()))
    }

    fn record(&mut self, ceiling: Duration) -> Result<Duration> {
        let started = Instant::now();
        let deadline = started + ceiling;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(ceiling);
            }
            match self.chunks.recv_timeout(deadline - now) {
                Ok(_) => {}
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(ceiling),
                // Device went away mid-recording; report what we got.
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Ok(started.elapsed().min(ceiling));
                }
            }
        }
    }
}

impl Drop for CpalMicStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
