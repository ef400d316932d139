use crate::detector::AcfDetector;
use crate::scale::Scale;
use crate::shifter::GranularShifter;

const UI_FEEDBACK_PERIOD_BLOCKS: u32 = 8;

#[derive(Clone, Copy, Debug)]
pub struct PitchFeedback {
    pub detected_hz: f32,
    pub target_hz: f32,
    pub cents: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct PitchSettings {
    pub root_key: i32,
    pub scale: Scale,
    pub amount: f32,
    pub retune_speed: f32,
    pub bypass: bool,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            root_key: 69,
            scale: Scale::Chromatic,
            amount: 1.0,
            retune_speed: 0.5,
            bypass: false,
        }
    }
}

/// Per-block vocal pitch correction: ACF detection, scale-quantized target
/// selection, smoothed ratio, and a granular shifter (§4.6). Processes mono;
/// stereo callers duplicate the instance per channel.
pub struct PitchEngine {
    detector: AcfDetector,
    shifter: GranularShifter,
    current_ratio: f32,
    blocks_since_feedback: u32,
    last_feedback: Option<PitchFeedback>,
    target_hz: f32,
}

impl PitchEngine {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            detector: AcfDetector::new(sample_rate),
            shifter: GranularShifter::new(),
            current_ratio: 1.0,
            blocks_since_feedback: 0,
            last_feedback: None,
            target_hz: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.detector.reset();
        self.shifter.reset();
        self.current_ratio = 1.0;
        self.blocks_since_feedback = 0;
        self.last_feedback = None;
        self.target_hz = 0.0;
    }

    fn target_frequency(detected_hz: f32, settings: &PitchSettings) -> f32 {
        if detected_hz <= 0.0 {
            return 0.0;
        }
        let midi = 69.0 + 12.0 * (detected_hz / 440.0).log2();
        let rounded = midi.round();
        let pitch_class = (rounded as i32 - settings.root_key).rem_euclid(12);
        let nearest_class = settings.scale.nearest(pitch_class);
        let target_midi = rounded as i32 - pitch_class + nearest_class;
        440.0 * 2f32.powf((target_midi as f32 - 69.0) / 12.0)
    }

    /// Processes one mono block in place. Emits `Some(PitchFeedback)` at
    /// most once every [`UI_FEEDBACK_PERIOD_BLOCKS`] blocks.
    pub fn process_block(
        &mut self,
        block: &mut [f32],
        settings: &PitchSettings,
    ) -> Option<PitchFeedback> {
        if settings.bypass || settings.amount <= 0.0 {
            return None;
        }

        let alpha = 0.1 + 0.89 * settings.retune_speed.clamp(0.0, 1.0);

        for sample in block.iter_mut() {
            if let Some(detected) = self.detector.push(*sample) {
                if detected > 0.0 {
                    self.target_hz = Self::target_frequency(detected, settings);
                    let target_ratio = (self.target_hz / detected).clamp(0.5, 2.0);
                    self.current_ratio = alpha * self.current_ratio + (1.0 - alpha) * target_ratio;
                }
            }

            let dry = *sample;
            let wet = self.shifter.process(dry, self.current_ratio);
            *sample = wet * settings.amount + dry * (1.0 - settings.amount);
        }

        self.blocks_since_feedback += 1;
        if self.blocks_since_feedback >= UI_FEEDBACK_PERIOD_BLOCKS {
            self.blocks_since_feedback = 0;
            let feedback = PitchFeedback {
                detected_hz: self.detector.last_frequency_hz(),
                target_hz: self.target_hz,
                cents: 1200.0 * self.current_ratio.max(1e-9).log2(),
            };
            self.last_feedback = Some(feedback);
            Some(feedback)
        } else {
            None
        }
    }

    pub fn last_feedback(&self) -> Option<PitchFeedback> {
        self.last_feedback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn bypass_is_bit_identical_passthrough() {
        let mut engine = PitchEngine::new(44_100.0);
        let mut settings = PitchSettings::default();
        settings.bypass = true;
        let original = vec![0.1, -0.2, 0.3, -0.4];
        let mut block = original.clone();
        let feedback = engine.process_block(&mut block, &settings);
        assert!(feedback.is_none());
        assert_eq!(block, original);
    }

    #[test]
    fn amount_zero_is_passthrough() {
        let mut engine = PitchEngine::new(44_100.0);
        let mut settings = PitchSettings::default();
        settings.amount = 0.0;
        let original = vec![0.1, -0.2, 0.3, -0.4];
        let mut block = original.clone();
        engine.process_block(&mut block, &settings);
        assert_eq!(block, original);
    }

    #[test]
    fn corrects_slightly_sharp_sine_toward_target() {
        let sample_rate = 44_100.0;
        let mut engine = PitchEngine::new(sample_rate);
        let settings = PitchSettings {
            root_key: 69,
            scale: Scale::Chromatic,
            amount: 1.0,
            retune_speed: 0.0,
            bypass: false,
        };
        let mut phase = 0.0f32;
        let frequency = 443.0;
        let mut block = vec![0.0f32; 4096];
        for sample in block.iter_mut() {
            *sample = phase.sin() * 0.5;
            phase += TAU * frequency / sample_rate;
        }
        engine.process_block(&mut block, &settings);
        // ratio should converge toward 440/443, i.e. slightly below 1.
        assert!(engine.current_ratio < 1.0);
        assert!(engine.current_ratio > 0.99);
    }
}
