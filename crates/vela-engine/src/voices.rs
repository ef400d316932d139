//! Sampler and drum-rack voices (§4.2 step 1): note-triggered, ADSR-gated
//! playback of a loaded buffer. One [`VoicePool`] lives per [`crate::track::TrackRuntime`]
//! and renders every active voice into the block alongside the track's audio
//! clips, so a note whose release tail outlives its clip still sounds out.

use std::sync::Arc;

use vela_dsp::envelope::Adsr;
use vela_dsp::pan::constant_power;

use crate::buffer::AudioBuffer;
use crate::clips::AudioClip;

struct Voice {
    key: u64,
    source: Arc<AudioClip>,
    position: usize,
    gain: f32,
    pan: f32,
    envelope: Adsr,
}

impl Voice {
    fn is_done(&self) -> bool {
        !self.envelope.is_active() || self.position >= self.source.frames()
    }

    fn render(&mut self, out: &mut AudioBuffer, frames: usize) {
        let total = self.source.frames();
        let (left_gain, right_gain) = constant_power(self.pan);
        for frame in 0..frames {
            if self.position >= total || !self.envelope.is_active() {
                break;
            }
            let envelope = self.envelope.next() * self.gain;
            if out.num_channels() >= 2 {
                let left = self.source.channel(0).and_then(|c| c.get(self.position)).copied().unwrap_or(0.0);
                let right = self
                    .source
                    .channel(1.min(self.source.channels().saturating_sub(1)))
                    .and_then(|c| c.get(self.position))
                    .copied()
                    .unwrap_or(left);
                out.channel_mut(0)[frame] += left * envelope * left_gain;
                out.channel_mut(1)[frame] += right * envelope * right_gain;
                for channel in 2..out.num_channels() {
                    let sample = self.source.channel(0).and_then(|c| c.get(self.position)).copied().unwrap_or(0.0);
                    out.channel_mut(channel)[frame] += sample * envelope;
                }
            } else if out.num_channels() == 1 {
                let sample = self.source.channel(0).and_then(|c| c.get(self.position)).copied().unwrap_or(0.0);
                out.channel_mut(0)[frame] += sample * envelope;
            }
            self.position += 1;
        }
    }
}

/// A pool of concurrently-sounding voices keyed by an opaque `u64` (a note id
/// or a synthetic trigger counter) so a later release can find the voice it
/// started without the caller tracking indices.
#[derive(Default)]
pub struct VoicePool {
    voices: Vec<Voice>,
}

impl VoicePool {
    pub fn new() -> Self {
        Self { voices: Vec::new() }
    }

    pub fn trigger(&mut self, key: u64, source: Arc<AudioClip>, gain: f32, pan: f32, template: &Adsr) {
        let mut envelope = template.clone();
        envelope.note_on();
        self.voices.push(Voice { key, source, position: 0, gain, pan, envelope });
    }

    pub fn release(&mut self, key: u64) {
        for voice in self.voices.iter_mut().filter(|v| v.key == key) {
            voice.envelope.note_off();
        }
    }

    pub fn render_block(&mut self, out: &mut AudioBuffer, frames: usize) {
        for voice in &mut self.voices {
            voice.render(out, frames);
        }
        self.voices.retain(|v| !v.is_done());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_clip() -> Arc<AudioClip> {
        let samples: Vec<f32> = (0..4096).map(|_| 1.0).collect();
        Arc::new(AudioClip::with_sample_rate(48_000.0, vec![samples.clone(), samples]))
    }

    #[test]
    fn triggered_voice_renders_nonzero_signal() {
        let mut pool = VoicePool::new();
        let mut template = Adsr::new(48_000.0);
        template.set_adsr(0.0, 0.0, 1.0, 0.01);
        pool.trigger(1, sine_clip(), 1.0, 0.0, &template);
        let mut out = AudioBuffer::new(2, 256);
        pool.render_block(&mut out, 256);
        assert!(out.channel(0).iter().any(|s| *s != 0.0));
    }

    #[test]
    fn released_voice_eventually_drops_out() {
        let mut pool = VoicePool::new();
        let mut template = Adsr::new(48_000.0);
        template.set_adsr(0.0, 0.0, 1.0, 0.001);
        pool.trigger(7, sine_clip(), 1.0, 0.0, &template);
        let mut out = AudioBuffer::new(2, 64);
        pool.render_block(&mut out, 64);
        pool.release(7);
        for _ in 0..20 {
            pool.render_block(&mut out, 64);
        }
        let mut silence = AudioBuffer::new(2, 64);
        pool.render_block(&mut silence, 64);
        assert!(silence.channel(0).iter().all(|s| *s == 0.0));
    }
}
