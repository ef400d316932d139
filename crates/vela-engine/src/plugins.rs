//! Fixed insert plug-in family (§3, §9). Each [`PluginKind`] maps to one
//! concrete [`TrackPlugin`] built from [`vela_dsp`] primitives; there is no
//! discovery or dynamic loading, matching the engine's closed plug-in set.

use vela_dsp::biquad::{Biquad, FilterMode};
use vela_dsp::delay::StereoDelay;
use vela_dsp::gain::db_to_linear;
use vela_dsp::ringbuffer::RingBuffer;
use vela_dsp::saturator::soft_clip;
use vela_dsp::smoothing::OnePole;
use vela_playlist::PluginKind;

use crate::buffer::AudioBuffer;

/// Shared interface over the fixed plug-in family (§9): prepare, process,
/// per-key parameter set, advertised latency.
pub trait TrackPlugin: Send {
    fn prepare(&mut self, sample_rate: f32, block_size: usize);
    fn process(&mut self, buffer: &mut AudioBuffer);
    /// Malformed/out-of-range values snap to the nearest clamped value
    /// rather than erroring (§4.2 failure semantics).
    fn set_param(&mut self, key: &str, value: f32);
    fn latency_samples(&self) -> usize {
        0
    }
}

pub fn make_plugin(kind: PluginKind) -> Box<dyn TrackPlugin> {
    match kind {
        PluginKind::ParametricEq => Box::new(ParametricEq::new()),
        PluginKind::Compressor => Box::new(Compressor::new()),
        PluginKind::Delay => Box::new(DelayPlugin::new()),
        PluginKind::Reverb => Box::new(ReverbPlugin::new()),
        PluginKind::Saturator => Box::new(SaturatorPlugin::new()),
        PluginKind::Chorus => Box::new(ChorusPlugin::new()),
        PluginKind::Sampler => Box::new(PassthroughPlugin::default()),
        PluginKind::DrumRack => Box::new(PassthroughPlugin::default()),
    }
}

/// Single-band parametric EQ: one [`Biquad`] per channel sharing coefficients.
struct ParametricEq {
    bands: Vec<Biquad>,
    sample_rate: f32,
    cutoff: f32,
    q: f32,
    gain_db: f32,
    mode: FilterMode,
}

impl ParametricEq {
    fn new() -> Self {
        Self {
            bands: Vec::new(),
            sample_rate: 48_000.0,
            cutoff: 1_000.0,
            q: 0.707,
            gain_db: 0.0,
            mode: FilterMode::Peak,
        }
    }
}

impl TrackPlugin for ParametricEq {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) {
        self.sample_rate = sample_rate;
        self.bands = (0..8)
            .map(|_| Biquad::new(sample_rate, self.mode, self.cutoff, self.q))
            .collect();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        for channel_index in 0..buffer.num_channels() {
            if channel_index >= self.bands.len() {
                break;
            }
            let band = &mut self.bands[channel_index];
            band.set_target_cutoff(self.cutoff);
            band.set_q(self.q);
            band.set_gain_db(self.gain_db);
            band.set_mode(self.mode);
            for sample in buffer.channel_mut(channel_index).iter_mut() {
                *sample = band.process(*sample);
            }
        }
    }

    fn set_param(&mut self, key: &str, value: f32) {
        match key {
            "cutoff_hz" => self.cutoff = value.clamp(20.0, 20_000.0),
            "q" => self.q = value.clamp(0.1, 10.0),
            "gain_db" => self.gain_db = value.clamp(-24.0, 24.0),
            "mode" => {
                self.mode = match value.round() as i32 {
                    0 => FilterMode::Lowpass,
                    1 => FilterMode::Highpass,
                    2 => FilterMode::Bandpass,
                    3 => FilterMode::Notch,
                    4 => FilterMode::Peak,
                    5 => FilterMode::LowShelf,
                    _ => FilterMode::HighShelf,
                };
            }
            _ => {}
        }
    }
}

/// Feed-forward RMS compressor: a one-pole envelope follower with distinct
/// attack/release time constants driving a soft-knee gain reduction curve.
struct Compressor {
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    attack: OnePole,
    release: OnePole,
    envelope_db: f32,
    sample_rate: f32,
}

impl Compressor {
    fn new() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 80.0,
            attack: OnePole::new(48_000.0, 10.0),
            release: OnePole::new(48_000.0, 80.0),
            envelope_db: -120.0,
            sample_rate: 48_000.0,
        }
    }
}

impl TrackPlugin for Compressor {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) {
        self.sample_rate = sample_rate;
        self.attack = OnePole::new(sample_rate, self.attack_ms);
        self.release = OnePole::new(sample_rate, self.release_ms);
        self.attack.reset(-120.0);
        self.release.reset(-120.0);
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        self.attack.set_time_ms(self.sample_rate, self.attack_ms);
        self.release.set_time_ms(self.sample_rate, self.release_ms);
        let frames = buffer.len();
        for frame in 0..frames {
            let mut peak = 0.0f32;
            for channel in 0..buffer.num_channels() {
                peak = peak.max(buffer.channel(channel)[frame].abs());
            }
            let peak_db = vela_dsp::gain::linear_to_db(peak.max(1e-8));
            let rising = peak_db > self.envelope_db;
            self.envelope_db = if rising {
                self.attack.reset(self.envelope_db);
                self.attack.next(peak_db)
            } else {
                self.release.reset(self.envelope_db);
                self.release.next(peak_db)
            };
            let over = (self.envelope_db - self.threshold_db).max(0.0);
            let reduction_db = over - over / self.ratio;
            let gain = db_to_linear(-reduction_db);
            for channel in 0..buffer.num_channels() {
                buffer.channel_mut(channel)[frame] *= gain;
            }
        }
    }

    fn set_param(&mut self, key: &str, value: f32) {
        match key {
            "threshold_db" => self.threshold_db = value.clamp(-60.0, 0.0),
            "ratio" => self.ratio = value.clamp(1.0, 20.0),
            "attack_ms" => self.attack_ms = value.clamp(0.1, 200.0),
            "release_ms" => self.release_ms = value.clamp(5.0, 2000.0),
            _ => {}
        }
    }
}

/// Stereo feedback delay line backed by [`StereoDelay`].
struct DelayPlugin {
    delay: StereoDelay,
}

impl DelayPlugin {
    fn new() -> Self {
        Self {
            delay: StereoDelay::new(48_000.0, 2.0),
        }
    }
}

impl TrackPlugin for DelayPlugin {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) {
        self.delay.prepare(sample_rate, 2.0);
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let frames = buffer.len();
        if buffer.num_channels() >= 2 {
            for frame in 0..frames {
                let left = buffer.channel(0)[frame];
                let right = buffer.channel(1)[frame];
                let (out_left, out_right) = self.delay.process_sample(left, right);
                buffer.channel_mut(0)[frame] = out_left;
                buffer.channel_mut(1)[frame] = out_right;
            }
        } else if buffer.num_channels() == 1 {
            for frame in 0..frames {
                let sample = buffer.channel(0)[frame];
                let (out_left, _) = self.delay.process_sample(sample, sample);
                buffer.channel_mut(0)[frame] = out_left;
            }
        }
    }

    fn set_param(&mut self, key: &str, value: f32) {
        match key {
            "time_ms" => self.delay.set_time_seconds(value.clamp(1.0, 2000.0) * 0.001),
            "feedback" => self.delay.set_feedback(value.clamp(0.0, 0.95)),
            "mix" => self.delay.set_mix(value.clamp(0.0, 1.0)),
            _ => {}
        }
    }

    fn latency_samples(&self) -> usize {
        0
    }
}

/// Algorithmic reverb approximated as a parallel comb bank feeding an
/// allpass diffuser per channel.
struct ReverbPlugin {
    combs: Vec<Vec<RingBuffer>>,
    size: f32,
    damping: f32,
    mix: f32,
    sample_rate: f32,
}

const COMB_BASE_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];

impl ReverbPlugin {
    fn new() -> Self {
        Self {
            combs: Vec::new(),
            size: 0.5,
            damping: 0.5,
            mix: 0.25,
            sample_rate: 48_000.0,
        }
    }
}

impl TrackPlugin for ReverbPlugin {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) {
        self.sample_rate = sample_rate;
        self.combs = (0..2)
            .map(|_| {
                COMB_BASE_MS
                    .iter()
                    .map(|ms| {
                        let capacity = ((sample_rate * ms * 0.001 * 2.0) as usize)
                            .max(64)
                            .next_power_of_two();
                        RingBuffer::new(capacity)
                    })
                    .collect()
            })
            .collect();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let feedback = 0.6 + self.size * 0.35;
        for channel_index in 0..buffer.num_channels() {
            if channel_index >= self.combs.len() {
                break;
            }
            let combs = &mut self.combs[channel_index];
            for sample in buffer.channel_mut(channel_index).iter_mut() {
                let dry = *sample;
                let mut wet = 0.0;
                for (comb, ms) in combs.iter_mut().zip(COMB_BASE_MS.iter()) {
                    let delay = (self.sample_rate * ms * 0.001).max(1.0);
                    let delayed = comb.read_fractional(delay);
                    let damped = delayed * (1.0 - self.damping);
                    comb.push(dry + damped * feedback);
                    wet += delayed;
                }
                wet /= COMB_BASE_MS.len() as f32;
                *sample = dry * (1.0 - self.mix) + wet * self.mix;
            }
        }
    }

    fn set_param(&mut self, key: &str, value: f32) {
        match key {
            "size" => self.size = value.clamp(0.0, 1.0),
            "damping" => self.damping = value.clamp(0.0, 1.0),
            "mix" => self.mix = value.clamp(0.0, 1.0),
            _ => {}
        }
    }
}

struct SaturatorPlugin {
    drive_db: f32,
}

impl SaturatorPlugin {
    fn new() -> Self {
        Self { drive_db: 0.0 }
    }
}

impl TrackPlugin for SaturatorPlugin {
    fn prepare(&mut self, _sample_rate: f32, _block_size: usize) {}

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let drive = db_to_linear(self.drive_db);
        for channel in buffer.channels_mut() {
            for sample in channel.iter_mut() {
                *sample = soft_clip(*sample * drive);
            }
        }
    }

    fn set_param(&mut self, key: &str, value: f32) {
        if key == "drive_db" {
            self.drive_db = value.clamp(0.0, 36.0);
        }
    }
}

/// Stereo chorus: a short modulated delay per channel, LFO-driven.
struct ChorusPlugin {
    lines: Vec<RingBuffer>,
    phase: f32,
    rate_hz: f32,
    depth_ms: f32,
    mix: f32,
    sample_rate: f32,
}

impl ChorusPlugin {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            phase: 0.0,
            rate_hz: 0.8,
            depth_ms: 4.0,
            mix: 0.35,
            sample_rate: 48_000.0,
        }
    }
}

impl TrackPlugin for ChorusPlugin {
    fn prepare(&mut self, sample_rate: f32, _block_size: usize) {
        self.sample_rate = sample_rate;
        let capacity = ((sample_rate * 0.05) as usize).max(64).next_power_of_two();
        self.lines = (0..2).map(|_| RingBuffer::new(capacity)).collect();
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        let phase_inc = self.rate_hz / self.sample_rate;
        for channel_index in 0..buffer.num_channels() {
            if channel_index >= self.lines.len() {
                break;
            }
            let line = &mut self.lines[channel_index];
            let mut phase = self.phase + if channel_index == 1 { 0.25 } else { 0.0 };
            for sample in buffer.channel_mut(channel_index).iter_mut() {
                let lfo = (phase * std::f32::consts::TAU).sin();
                let delay_samples =
                    ((self.depth_ms * 0.5 * (1.0 + lfo)) * 0.001 * self.sample_rate).max(1.0);
                let delayed = line.read_fractional(delay_samples);
                line.push(*sample);
                *sample = *sample * (1.0 - self.mix) + delayed * self.mix;
                phase = (phase + phase_inc).fract();
            }
        }
        self.phase = (self.phase + phase_inc * buffer.len() as f32).fract();
    }

    fn set_param(&mut self, key: &str, value: f32) {
        match key {
            "rate_hz" => self.rate_hz = value.clamp(0.05, 10.0),
            "depth_ms" => self.depth_ms = value.clamp(0.0, 20.0),
            "mix" => self.mix = value.clamp(0.0, 1.0),
            _ => {}
        }
    }
}

/// Sampler and drum-rack instruments render at the track's source stage from
/// note events, not the insert chain; the insert slot they occupy stays a
/// transparent passthrough.
#[derive(Default)]
struct PassthroughPlugin;

impl TrackPlugin for PassthroughPlugin {
    fn prepare(&mut self, _sample_rate: f32, _block_size: usize) {}
    fn process(&mut self, _buffer: &mut AudioBuffer) {}
    fn set_param(&mut self, _key: &str, _value: f32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturator_keeps_signal_bounded() {
        let mut plugin = SaturatorPlugin::new();
        plugin.prepare(48_000.0, 64);
        plugin.set_param("drive_db", 24.0);
        let mut buffer = AudioBuffer::new(1, 8);
        buffer.channel_mut(0).fill(0.9);
        plugin.process(&mut buffer);
        assert!(buffer.channel(0).iter().all(|s| s.abs() <= 1.2));
    }

    #[test]
    fn delay_plugin_produces_nonzero_tail() {
        let mut plugin = DelayPlugin::new();
        plugin.prepare(48_000.0, 64);
        plugin.set_param("time_ms", 5.0);
        plugin.set_param("mix", 1.0);
        let mut buffer = AudioBuffer::new(1, 512);
        buffer.channel_mut(0)[0] = 1.0;
        plugin.process(&mut buffer);
        assert!(buffer.channel(0)[240..].iter().any(|s| s.abs() > 1e-6));
    }
}
