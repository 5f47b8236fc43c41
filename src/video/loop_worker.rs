use std::sync::{Arc, Mutex};

use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::devices::CameraStream;

use super::motion::{downsample, mean_abs_diff, MOTION_EVENT_THRESHOLD};

const ENABLE_LOGS: bool = true;
use crate::{log_error, log_info, log_warn};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(350);

/// Per-interval motion scores accumulated over one capture.
#[derive(Default)]
pub(crate) struct MotionStats {
    pub scores: Vec<f64>,
    pub events: u32,
}

impl MotionStats {
    fn record(&mut self, score: f64) {
        self.scores.push(score);
        if score > MOTION_EVENT_THRESHOLD {
            self.events += 1;
        }
    }

    pub fn average(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }
}

/// Samples frames on a fixed cadence until cancelled, scoring each interval
/// by mean luminance difference against the previous frame. Releases the
/// stream (clip recorder first) on exit.
pub(crate) async fn motion_loop(
    stream: Box<dyn CameraStream>,
    stats: Arc<Mutex<MotionStats>>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stream = Some(stream);
    let mut prev: Option<image::GrayImage> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(owned) = stream.take() else { break };
                let joined = tokio::task::spawn_blocking(move || {
                    let mut owned = owned;
                    let frame = owned.grab_frame();
                    (owned, frame)
                })
                .await;

                let (owned, frame) = match joined {
                    Ok(pair) => pair,
                    Err(err) => {
                        log_error!("camera worker join failed: {err}");
                        break;
                    }
                };
                stream = Some(owned);

                match frame {
                    Ok(frame) => {
                        let small = downsample(&frame);
                        if let Some(prev_frame) = &prev {
                            let score = mean_abs_diff(prev_frame, &small);
                            stats.lock().unwrap().record(score);
                        }
                        prev = Some(small);
                    }
                    Err(err) => log_warn!("frame grab failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("motion loop shutting down");
                break;
            }
        }
    }

    if let Some(mut owned) = stream.take() {
        owned.end_clip();
    }
}
