//! Meters / analyzers (§4.8, C8): running RMS, peak-hold with decay, and
//! transport stop-gating for the master bus.

use crate::buffer::AudioBuffer;

const PEAK_HOLD_SECONDS: f32 = 1.0;
const PEAK_DECAY_PER_FRAME: f32 = 0.02;

/// Maps a linear amplitude to the `[0,1]` meter scale used by the host:
/// `20*log10(max(x, 1e-5))` linearly mapped from `[-60dB, 0dB]` to `[0,1]`.
pub fn to_meter_scale(linear: f32) -> f32 {
    let db = 20.0 * linear.max(1e-5).log10();
    ((db + 60.0) / 60.0).clamp(0.0, 1.0)
}

/// Per-track (or master) analyzer. Owns a ring of squared-sample sums so
/// the RMS window doesn't require rescanning the whole buffer each call.
pub struct Analyzer {
    window: Vec<f32>,
    write: usize,
    sum_sq: f32,
    filled: usize,
    peak: f32,
    held_peak: f32,
    hold_timer: f32,
    sample_rate_hint: f32,
}

impl Analyzer {
    /// `window_samples` should cover roughly a 30ms window at the engine's
    /// sample rate (§4.8). `sample_rate` drives the peak-hold timer, so it
    /// must be the engine's real rate, not an assumed default.
    pub fn new(sample_rate: f32, window_samples: usize) -> Self {
        let window_samples = window_samples.max(1);
        Self {
            window: vec![0.0; window_samples],
            write: 0,
            sum_sq: 0.0,
            filled: 0,
            peak: 0.0,
            held_peak: 0.0,
            hold_timer: 0.0,
            sample_rate_hint: sample_rate.max(1.0),
        }
    }

    /// Folds one block into the running RMS/peak state. Master analyzers
    /// report exactly 0 while the transport is stopped, regardless of
    /// residual buffer content (§4.8 stop-gating); track analyzers keep
    /// reporting to permit input monitoring.
    pub fn observe(&mut self, buffer: &AudioBuffer, transport_playing: bool, is_master: bool) {
        if is_master && !transport_playing {
            self.peak = 0.0;
            self.held_peak = 0.0;
            self.hold_timer = 0.0;
            self.sum_sq = 0.0;
            self.window.fill(0.0);
            self.filled = 0;
            return;
        }

        let frames = buffer.len();
        let channels = buffer.num_channels().max(1);
        let len = self.window.len();
        for frame in 0..frames {
            let mut mixed = 0.0f32;
            let mut peak_sample = 0.0f32;
            for channel in 0..channels.min(buffer.num_channels()) {
                let sample = buffer.channel(channel)[frame];
                mixed += sample * sample;
                peak_sample = peak_sample.max(sample.abs());
            }
            mixed /= channels as f32;

            let outgoing = self.window[self.write];
            self.sum_sq += mixed - outgoing;
            self.window[self.write] = mixed;
            self.write = (self.write + 1) % len;
            self.filled = (self.filled + 1).min(len);

            if peak_sample > self.held_peak {
                self.held_peak = peak_sample;
                self.hold_timer = 0.0;
            } else {
                self.hold_timer += 1.0 / self.sample_rate_hint;
                if self.hold_timer > PEAK_HOLD_SECONDS {
                    self.held_peak = (self.held_peak - PEAK_DECAY_PER_FRAME).max(0.0);
                }
            }
            self.peak = peak_sample;
        }
    }

    pub fn rms(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        (self.sum_sq.max(0.0) / self.filled as f32).sqrt()
    }

    pub fn rms_meter(&self) -> f32 {
        to_meter_scale(self.rms())
    }

    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn held_peak(&self) -> f32 {
        self.held_peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_master_reports_zero() {
        let mut analyzer = Analyzer::new(48_000.0, 64);
        let mut buffer = AudioBuffer::new(1, 64);
        buffer.channel_mut(0).fill(0.8);
        analyzer.observe(&buffer, false, true);
        assert_eq!(analyzer.rms(), 0.0);
    }

    #[test]
    fn playing_track_reports_nonzero_rms() {
        let mut analyzer = Analyzer::new(48_000.0, 64);
        let mut buffer = AudioBuffer::new(1, 64);
        buffer.channel_mut(0).fill(0.5);
        analyzer.observe(&buffer, false, false);
        assert!(analyzer.rms() > 0.0);
    }

    #[test]
    fn meter_scale_clamps_to_unit_range() {
        assert_eq!(to_meter_scale(0.0), 0.0);
        assert!((to_meter_scale(1.0) - 1.0).abs() < 1e-6);
    }
}
