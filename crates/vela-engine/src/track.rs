//! Per-track DSP chain (§4.2, C4): source stage, inserts, post-fader sends,
//! fader, analyzer tap. One [`TrackRuntime`] shadows each [`Track`] in the
//! project and is rebuilt whenever the track's insert chain changes shape.

use std::collections::HashSet;
use std::sync::Arc;

use vela_dsp::envelope::Adsr;
use vela_dsp::pan::constant_power;
use vela_dsp::smoothing::OnePole;
use vela_playlist::{Clip, ClipContent, DrumPadId, MidiNote, Track, TrackId, TrackKind};

use crate::buffer::AudioBuffer;
use crate::clips::AudioClip;
use crate::delay::DelayCompensator;
use crate::meters::Analyzer;
use crate::plugins::{make_plugin, TrackPlugin};
use crate::voices::VoicePool;

/// Voice keys minted for a [`crate::commands::Command::TriggerPad`] live in
/// the upper half of the `u64` space so they never collide with a
/// [`vela_playlist::NoteId`]-derived key from a MIDI clip.
const MANUAL_TRIGGER_BASE: u64 = 1 << 63;

/// Resolves a clip's stable source reference to decoded audio. The engine
/// façade owns the real cache; tests can stub this with a closure.
pub trait ClipSource {
    fn resolve(&self, source_ref: &str) -> Option<Arc<AudioClip>>;
}

impl<F> ClipSource for F
where
    F: Fn(&str) -> Option<Arc<AudioClip>>,
{
    fn resolve(&self, source_ref: &str) -> Option<Arc<AudioClip>> {
        self(source_ref)
    }
}

/// Per-block automation overrides consumed at the top of [`TrackRuntime::process`]
/// (§4.2 step 2). `None` leaves the track's own stored value untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackAutomation {
    pub volume: Option<f32>,
    pub pan: Option<f32>,
}

/// Audio thread mirror of a [`Track`]: owns the things that must not
/// allocate per block (plug-in instances, PDC ring buffers, the analyzer).
pub struct TrackRuntime {
    pub id: TrackId,
    plugins: Vec<(vela_playlist::PluginInstanceId, Box<dyn TrackPlugin>)>,
    compensator: DelayCompensator,
    pub analyzer: Analyzer,
    volume_smoother: OnePole,
    pan_smoother: OnePole,
    sample_rate: f32,
    sampler_adsr: Adsr,
    sampler_voices: VoicePool,
    drum_adsr: Adsr,
    drum_voices: VoicePool,
    sounding_notes: HashSet<u64>,
    manual_trigger_seq: u64,
}

impl TrackRuntime {
    pub fn new(id: TrackId, sample_rate: f32, meter_window_samples: usize) -> Self {
        let mut volume_smoother = OnePole::new(sample_rate, 10.0);
        volume_smoother.reset(1.0);
        let mut pan_smoother = OnePole::new(sample_rate, 10.0);
        pan_smoother.reset(0.0);
        let mut drum_adsr = Adsr::new(sample_rate);
        drum_adsr.set_adsr(0.001, 0.0, 1.0, 0.08);
        Self {
            id,
            plugins: Vec::new(),
            compensator: DelayCompensator::new(),
            analyzer: Analyzer::new(sample_rate, meter_window_samples),
            volume_smoother,
            pan_smoother,
            sample_rate,
            sampler_adsr: Adsr::new(sample_rate),
            sampler_voices: VoicePool::new(),
            drum_adsr,
            drum_voices: VoicePool::new(),
            sounding_notes: HashSet::new(),
            manual_trigger_seq: 0,
        }
    }

    /// Rebuilds the plug-in chain to mirror the track's insert list,
    /// preserving state for instances that survive unchanged.
    pub fn sync_inserts(&mut self, track: &Track, block_size: usize) {
        let mut rebuilt = Vec::with_capacity(track.inserts.len());
        for insert in &track.inserts {
            let existing = self
                .plugins
                .iter()
                .position(|(id, _)| *id == insert.id)
                .map(|pos| self.plugins.remove(pos));
            let mut plugin = match existing {
                Some((_, plugin)) => plugin,
                None => make_plugin(insert.kind),
            };
            plugin.prepare(self.sample_rate, block_size);
            for (key, value) in &insert.params {
                plugin.set_param(key, *value);
            }
            rebuilt.push((insert.id, plugin));
        }
        self.plugins = rebuilt;
    }

    pub fn configure_pdc(&mut self, delay_samples: u32, channels: usize, block_size: usize) {
        self.compensator
            .configure(channels, delay_samples as usize, block_size);
    }

    /// Mixes every clip of `track` active at `[block_start, block_start + frames)`
    /// project-time seconds into `out` (§4.2 step 1). Audio clips render
    /// directly from position; MIDI clips fire and release ADSR-gated
    /// sampler/drum-rack voices, which then render alongside them. Missing
    /// sources output silence (§4.2 failure semantics).
    pub fn mix_clips(
        &mut self,
        out: &mut AudioBuffer,
        track: &Track,
        source: &dyn ClipSource,
        block_start: f64,
        frames: usize,
        sample_rate: f32,
    ) {
        let block_end = block_start + frames as f64 / sample_rate as f64;
        for clip in &track.clips {
            if clip.is_muted || clip.start >= block_end || clip.end() <= block_start {
                continue;
            }
            match &clip.content {
                ClipContent::Audio { source_ref } => {
                    if let Some(audio) = source.resolve(source_ref) {
                        mix_one_clip(out, clip, &audio, block_start, frames, sample_rate);
                    }
                }
                ClipContent::Midi { notes } => {
                    self.trigger_notes(track, notes, source, block_start, block_end);
                }
            }
        }
        self.sampler_voices.render_block(out, frames);
        self.drum_voices.render_block(out, frames);
    }

    /// Drives the sampler/drum-rack voice pools from one MIDI clip's notes
    /// (§4.2 step 1): a note newly overlapping the block fires a voice, one
    /// whose end has just passed releases it. Voices persist past their note
    /// across block boundaries so release tails keep sounding.
    fn trigger_notes(
        &mut self,
        track: &Track,
        notes: &[MidiNote],
        source: &dyn ClipSource,
        block_start: f64,
        block_end: f64,
    ) {
        for note in notes {
            let key = note.id.0;
            let active = note.start < block_end && note.end() > block_start;
            let sounding = self.sounding_notes.contains(&key);
            if active && !sounding {
                match track.kind {
                    TrackKind::Sampler => {
                        if let Some(source_ref) = track.sampler.source_ref.as_deref() {
                            if let Some(audio) = source.resolve(source_ref) {
                                self.sampler_adsr.set_adsr(
                                    track.sampler.attack,
                                    track.sampler.decay,
                                    track.sampler.sustain,
                                    track.sampler.release,
                                );
                                self.sampler_voices.trigger(key, audio, note.velocity, 0.0, &self.sampler_adsr);
                            }
                        }
                    }
                    TrackKind::DrumRack => {
                        if let Some(pad) = pad_for_pitch(note.pitch).and_then(|id| track.drum_pad(id)) {
                            if !pad.is_muted {
                                if let Some(source_ref) = pad.buffer_ref.as_deref() {
                                    if let Some(audio) = source.resolve(source_ref) {
                                        self.drum_voices.trigger(
                                            key,
                                            audio,
                                            note.velocity * pad.gain,
                                            pad.pan,
                                            &self.drum_adsr,
                                        );
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
                self.sounding_notes.insert(key);
            } else if !active && sounding {
                self.sampler_voices.release(key);
                self.drum_voices.release(key);
                self.sounding_notes.remove(&key);
            }
        }
    }

    /// Fires a one-shot drum voice from a direct `TriggerPad` command rather
    /// than a clip's note stream; used for live pad playing.
    pub fn trigger_drum_pad(&mut self, source: Arc<AudioClip>, gain: f32, pan: f32) {
        let key = MANUAL_TRIGGER_BASE + self.manual_trigger_seq;
        self.manual_trigger_seq = self.manual_trigger_seq.wrapping_add(1);
        self.drum_voices.trigger(key, source, gain, pan, &self.drum_adsr);
    }

    /// Runs the insert chain in order (§4.2 step 3). A track whose inserts
    /// were frozen for record-mode isolation is handled by the caller
    /// skipping this call for the disabled instances' track.
    pub fn process_inserts(&mut self, buffer: &mut AudioBuffer, frozen: &[vela_playlist::PluginInstanceId]) {
        for (id, plugin) in &mut self.plugins {
            if frozen.contains(id) {
                continue;
            }
            plugin.process(buffer);
        }
    }

    /// Applies the fader stage: volume (already audio-taper linear gain per
    /// §3) with a short smoothing ramp, then equal-power pan (§4.1).
    pub fn apply_fader(&mut self, buffer: &mut AudioBuffer, volume: f32, pan: f32, audible: bool) {
        let target_volume = if audible { volume } else { 0.0 };
        for frame in 0..buffer.len() {
            let gain = self.volume_smoother.next(target_volume);
            let pan_value = self.pan_smoother.next(pan);
            let (left_gain, right_gain) = constant_power(pan_value);
            if buffer.num_channels() >= 2 {
                buffer.channel_mut(0)[frame] *= gain * left_gain;
                buffer.channel_mut(1)[frame] *= gain * right_gain;
                for channel in 2..buffer.num_channels() {
                    buffer.channel_mut(channel)[frame] *= gain;
                }
            } else if buffer.num_channels() == 1 {
                buffer.channel_mut(0)[frame] *= gain;
            }
        }
    }

    pub fn apply_pdc(&mut self, buffer: &mut AudioBuffer) {
        self.compensator.process(buffer);
    }

    pub fn tap_analyzer(&mut self, buffer: &AudioBuffer, transport_playing: bool, is_master: bool) {
        self.analyzer.observe(buffer, transport_playing, is_master);
    }
}

/// Inverse of [`DrumPadId::midi_note`]: maps a note pitch back to the pad it
/// would trigger, or `None` if it falls outside the mapped range.
fn pad_for_pitch(pitch: u8) -> Option<DrumPadId> {
    pitch.checked_sub(60).map(|offset| DrumPadId(offset + 1))
}

fn mix_one_clip(
    out: &mut AudioBuffer,
    clip: &Clip,
    audio: &AudioClip,
    block_start: f64,
    frames: usize,
    sample_rate: f32,
) {
    let clip_local_start = (block_start - clip.start).max(0.0);
    let samples_per_sec = sample_rate as f64;
    let source_frames = audio.frames();

    for frame in 0..frames {
        let project_time = block_start + frame as f64 / samples_per_sec;
        if project_time < clip.start || project_time >= clip.end() {
            continue;
        }
        let time_in_clip = project_time - clip.start + clip.offset;
        let source_index = (time_in_clip * samples_per_sec).round() as i64;
        let resolved_index = if clip.reverse {
            source_frames as i64 - 1 - source_index
        } else {
            source_index
        };
        if resolved_index < 0 || resolved_index as usize >= source_frames {
            continue;
        }
        let fade_gain = clip_fade_gain(clip, project_time, clip_local_start);
        let gain = clip.gain * fade_gain;
        let channels = out.num_channels().min(audio.channels());
        for channel in 0..channels {
            let sample = audio
                .channel(channel)
                .and_then(|c| c.get(resolved_index as usize))
                .copied()
                .unwrap_or(0.0);
            out.channel_mut(channel)[frame] += sample * gain;
        }
    }
}

fn clip_fade_gain(clip: &Clip, project_time: f64, _clip_local_start: f64) -> f32 {
    let since_start = project_time - clip.start;
    let until_end = clip.end() - project_time;
    let mut gain = 1.0_f32;
    if clip.fade_in > 0.0 && since_start < clip.fade_in {
        gain *= (since_start / clip.fade_in).clamp(0.0, 1.0) as f32;
    }
    if clip.fade_out > 0.0 && until_end < clip.fade_out {
        gain *= (until_end / clip.fade_out).clamp(0.0, 1.0) as f32;
    }
    gain
}

/// Tracks a track's send contributions for the block just processed so the
/// graph driver can accumulate them into destination input buffers (§4.2
/// step 4, post-fader).
pub struct SendContribution {
    pub destination: TrackId,
    pub buffer: AudioBuffer,
}

pub fn collect_sends(track: &Track, post_fader: &AudioBuffer) -> Vec<SendContribution> {
    let mut contributions = Vec::new();
    for send in &track.sends {
        if !send.is_enabled {
            continue;
        }
        let mut copy = post_fader.clone();
        for channel in copy.channels_mut() {
            for sample in channel.iter_mut() {
                *sample *= send.level;
            }
        }
        contributions.push(SendContribution {
            destination: send.destination,
            buffer: copy,
        });
    }
    contributions
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_playlist::{ClipId, TrackKind};

    #[test]
    fn missing_source_outputs_silence() {
        let mut track = Track::new(TrackId(1), TrackKind::Audio, "t");
        track.clips.push(Clip::new_audio(ClipId(1), "a", 0.0, 1.0, "missing"));
        let mut out = AudioBuffer::new(2, 64);
        let resolver = |_: &str| -> Option<Arc<AudioClip>> { None };
        let mut runtime = TrackRuntime::new(TrackId(1), 48_000.0, 64);
        runtime.mix_clips(&mut out, &track, &resolver, 0.0, 64, 48_000.0);
        assert!(out.channels().all(|c| c.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn resolved_source_is_mixed_in() {
        let mut track = Track::new(TrackId(1), TrackKind::Audio, "t");
        track.clips.push(Clip::new_audio(ClipId(1), "a", 0.0, 1.0, "sine"));
        let buf = AudioClip::with_sample_rate(48_000.0, vec![vec![0.5; 64], vec![0.5; 64]]);
        let shared = Arc::new(buf);
        let resolver = move |r: &str| -> Option<Arc<AudioClip>> {
            if r == "sine" {
                Some(shared.clone())
            } else {
                None
            }
        };
        let mut out = AudioBuffer::new(2, 64);
        let mut runtime = TrackRuntime::new(TrackId(1), 48_000.0, 64);
        runtime.mix_clips(&mut out, &track, &resolver, 0.0, 64, 48_000.0);
        assert!(out.channel(0).iter().any(|s| *s != 0.0));
    }

    #[test]
    fn disabled_sends_are_excluded() {
        let mut track = Track::new(TrackId(1), TrackKind::Audio, "t");
        track.sends.push(vela_playlist::Send {
            id: vela_playlist::SendId(1),
            destination: TrackId(2),
            level: 1.0,
            is_enabled: false,
        });
        let post_fader = AudioBuffer::new(2, 16);
        let sends = collect_sends(&track, &post_fader);
        assert!(sends.is_empty());
    }
}
