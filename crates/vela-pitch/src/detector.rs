const WINDOW_SIZE: usize = 1024;
const RMS_GATE: f32 = 0.01;
const STRIDE: usize = 2;
const CORRELATION_THRESHOLD: f32 = 0.5;

/// Autocorrelation-based pitch detector (§4.6). Accumulates samples into a
/// fixed analysis window and reports a frequency estimate once it fills.
pub struct AcfDetector {
    sample_rate: f32,
    window: [f32; WINDOW_SIZE],
    filled: usize,
    last_frequency_hz: f32,
    min_period: usize,
    max_period: usize,
}

impl AcfDetector {
    pub fn new(sample_rate: f32) -> Self {
        let min_period = (sample_rate / 1000.0).round().max(1.0) as usize;
        let max_period = (sample_rate / 80.0).round() as usize;
        Self {
            sample_rate,
            window: [0.0; WINDOW_SIZE],
            filled: 0,
            last_frequency_hz: 0.0,
            min_period: min_period.max(1),
            max_period: max_period.min(WINDOW_SIZE - 1),
        }
    }

    pub fn reset(&mut self) {
        self.filled = 0;
        self.last_frequency_hz = 0.0;
    }

    /// Feeds one sample; returns `Some(frequency_hz)` whenever the window
    /// just completed, `None` otherwise (caller should hold the last value).
    pub fn push(&mut self, sample: f32) -> Option<f32> {
        self.window[self.filled] = sample;
        self.filled += 1;
        if self.filled < WINDOW_SIZE {
            return None;
        }
        self.filled = 0;

        let rms = (self.window.iter().map(|s| s * s).sum::<f32>() / WINDOW_SIZE as f32).sqrt();
        if rms < RMS_GATE {
            self.last_frequency_hz = 0.0;
            return Some(0.0);
        }

        let zero_lag_energy: f32 = self.window.iter().map(|s| s * s).sum();
        let mut best_offset = self.min_period;
        let mut best_correlation = f32::MIN;
        let mut offset = self.min_period;
        while offset <= self.max_period {
            let mut correlation = 0.0f32;
            for i in 0..(WINDOW_SIZE - offset) {
                correlation += self.window[i] * self.window[i + offset];
            }
            if correlation > best_correlation {
                best_correlation = correlation;
                best_offset = offset;
            }
            offset += STRIDE;
        }

        if best_correlation > CORRELATION_THRESHOLD * zero_lag_energy {
            self.last_frequency_hz = self.sample_rate / best_offset as f32;
        }
        Some(self.last_frequency_hz)
    }

    pub fn last_frequency_hz(&self) -> f32 {
        self.last_frequency_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn detects_pure_tone_frequency() {
        let sample_rate = 44_100.0;
        let frequency = 220.0;
        let mut detector = AcfDetector::new(sample_rate);
        let mut phase = 0.0f32;
        let mut last = None;
        for _ in 0..WINDOW_SIZE {
            let sample = (phase).sin() * 0.5;
            phase += TAU * frequency / sample_rate;
            last = detector.push(sample);
        }
        let detected = last.unwrap();
        assert!((detected - frequency).abs() / frequency < 0.02);
    }

    #[test]
    fn silence_reports_zero() {
        let mut detector = AcfDetector::new(44_100.0);
        let mut last = None;
        for _ in 0..WINDOW_SIZE {
            last = detector.push(0.0);
        }
        assert_eq!(last.unwrap(), 0.0);
    }
}
