use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Envelope time constant. Short enough to be inaudible as a fade, long
/// enough to kill the click of an abrupt sine edge.
const ENVELOPE_TAU_SECS: f32 = 0.012;
const AMPLITUDE: f32 = 0.25;

/// A finite sine tone with an exponential attack/release envelope.
pub struct ToneBurst {
    freq_hz: f32,
    total_samples: usize,
    num_sample: usize,
}

impl ToneBurst {
    pub fn new(freq_hz: f32, duration: Duration) -> Self {
        Self {
            freq_hz,
            total_samples: (duration.as_secs_f32() * SAMPLE_RATE as f32) as usize,
            num_sample: 0,
        }
    }
}

impl Iterator for ToneBurst {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let remaining = (self.total_samples - self.num_sample) as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        let attack = 1.0 - (-t / ENVELOPE_TAU_SECS).exp();
        let release = 1.0 - (-remaining / ENVELOPE_TAU_SECS).exp();
        let envelope = attack.min(release);

        Some((2.0 * PI * self.freq_hz * t).sin() * envelope * AMPLITUDE)
    }
}

impl Source for ToneBurst {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_finite_and_starts_quiet() {
        let burst = ToneBurst::new(440.0, Duration::from_millis(100));
        let samples: Vec<f32> = burst.collect();
        assert_eq!(samples.len(), 4410);
        // Envelope keeps the first sample at zero and the edges attenuated.
        assert_eq!(samples[0], 0.0);
        assert!(samples[1].abs() < 0.01);
        assert!(samples[samples.len() - 1].abs() < 0.01);
        assert!(samples.iter().all(|s| s.abs() <= AMPLITUDE));
    }

    #[test]
    fn burst_reaches_audible_amplitude_mid_tone() {
        let burst = ToneBurst::new(440.0, Duration::from_millis(100));
        let peak = burst.fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak > AMPLITUDE * 0.9);
    }
}
