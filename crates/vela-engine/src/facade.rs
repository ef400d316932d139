//! Engine façade (§4.11, C10): the external command surface and read-only
//! project snapshot a host embeds. Owns every other subsystem and is the
//! only thing [`crate::render`] or a CLI driver talks to.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use vela_playlist::{
    AutomationLaneId, AutomationTarget, ClipId, IdGenerator, PluginInstanceId, ProjectState,
    Track, TrackId, MASTER_TRACK,
};

use crate::automation::{AutomationManager, AutomationMode as EngineAutomationMode, ParameterSpec};
use crate::buffer::{AudioBuffer, BufferConfig};
use crate::clips::AudioClip;
use crate::commands::{AutomationMode, ClipEdit, Command};
use crate::core::{EngineError, EngineResult};
use crate::graph::{self, PdcPlan};
use crate::meters::Analyzer;
use crate::track::{collect_sends, TrackRuntime};
use crate::transport::Transport;

const METER_WINDOW_MS: f32 = 30.0;

/// Monotonically increasing version published alongside every snapshot so
/// readers can detect a torn read without locking (§4.11).
static SNAPSHOT_VERSION: AtomicU64 = AtomicU64::new(0);

pub struct Engine {
    project: ProjectState,
    config: BufferConfig,
    transport: Transport,
    automation: AutomationManager,
    runtimes: HashMap<TrackId, TrackRuntime>,
    order: Vec<TrackId>,
    pdc: PdcPlan,
    audio_clock: f64,
    clip_cache: HashMap<String, Arc<AudioClip>>,
    id_gen: IdGenerator,
    frozen_inserts: HashSet<PluginInstanceId>,
    snapshot_version: u64,
    master_analyzer: Analyzer,
    automation_targets: HashMap<AutomationLaneId, AutomationTarget>,
}

impl Engine {
    pub fn new(config: BufferConfig) -> Self {
        let project = ProjectState::new();
        let sample_rate = config.sample_rate;
        let meter_window = ((sample_rate * METER_WINDOW_MS / 1000.0) as usize).max(1);
        let mut engine = Self {
            project,
            config,
            transport: Transport::new(),
            automation: AutomationManager::new(),
            runtimes: HashMap::new(),
            order: vec![MASTER_TRACK],
            pdc: PdcPlan::default(),
            audio_clock: 0.0,
            clip_cache: HashMap::new(),
            id_gen: IdGenerator::new(),
            frozen_inserts: HashSet::new(),
            snapshot_version: 0,
            master_analyzer: Analyzer::new(sample_rate, meter_window),
            automation_targets: HashMap::new(),
        };
        engine.rebuild_runtime(MASTER_TRACK);
        engine.recompute_topology();
        engine
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Replaces the whole project (used by the offline renderer to stand up
    /// an isolated engine instance per §4.9) and rebuilds every runtime.
    pub fn load_project(&mut self, project: ProjectState) {
        self.project = project;
        self.runtimes.clear();
        self.frozen_inserts.clear();
        let ids: Vec<TrackId> = self.project.tracks.iter().map(|t| t.id).collect();
        for id in ids {
            self.rebuild_runtime(id);
        }
        self.recompute_topology();
        self.bump_snapshot();
    }

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    pub fn snapshot(&self) -> (u64, ProjectState) {
        (self.snapshot_version, self.project.clone())
    }

    /// Registers decoded audio under a stable source reference so clip
    /// mixing can resolve it; the decode pipeline itself is a host concern
    /// (§1 scope), this is the seam it plugs into.
    pub fn register_source(&mut self, source_ref: impl Into<String>, clip: AudioClip) {
        self.clip_cache.insert(source_ref.into(), Arc::new(clip));
    }

    fn resolve_source(&self, source_ref: &str) -> Option<Arc<AudioClip>> {
        self.clip_cache.get(source_ref).cloned()
    }

    fn bump_snapshot(&mut self) {
        self.snapshot_version = SNAPSHOT_VERSION.fetch_add(1, Ordering::Relaxed) + 1;
    }

    fn rebuild_runtime(&mut self, id: TrackId) {
        let meter_window = ((self.config.sample_rate * METER_WINDOW_MS / 1000.0) as usize).max(1);
        let runtime = self
            .runtimes
            .entry(id)
            .or_insert_with(|| TrackRuntime::new(id, self.config.sample_rate, meter_window));
        if let Some(track) = self.project.track(id) {
            runtime.sync_inserts(track, self.config.block_size);
        }
    }

    fn recompute_topology(&mut self) {
        self.order = graph::topological_order(&self.project);
        self.pdc = graph::compute_pdc(&self.project, &self.order, self.project.pdc_enabled);
        let channels = self.config.layout.channels() as usize;
        for &id in &self.order {
            let delay = self.pdc.compensation.get(&id).copied().unwrap_or(0);
            if let Some(runtime) = self.runtimes.get_mut(&id) {
                runtime.configure_pdc(delay, channels, self.config.block_size);
            }
            let latency = self.pdc.total_latency.get(&id).copied().unwrap_or(0);
            if let Some(track) = self.project.track_mut(id) {
                track.total_latency = latency;
            }
        }
        tracing::debug!(
            tracks = self.order.len(),
            total_latency = ?self.pdc.total_latency,
            "recomputed mix graph topology"
        );
    }

    /// Applies one command synchronously; on error the project is left
    /// unchanged (§7).
    pub fn apply(&mut self, command: Command) -> EngineResult<()> {
        let result = self.apply_inner(command);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "command rejected");
        }
        result
    }

    fn apply_inner(&mut self, command: Command) -> EngineResult<()> {
        match command {
            Command::Play { start_offset } => {
                self.transport.play(self.audio_clock, start_offset);
                self.project.is_playing = true;
            }
            Command::Stop => {
                self.transport.stop(self.audio_clock);
                self.project.is_playing = false;
            }
            Command::Seek { time } => {
                self.transport.seek(self.audio_clock, time);
                self.project.current_time = time;
            }
            Command::SetBpm { bpm } => {
                if bpm <= 0.0 {
                    return Err(EngineError::OutOfRange("bpm"));
                }
                self.project.bpm = bpm;
            }
            Command::SetLoop { active, start, end } => {
                self.transport.set_loop(active, start, end);
                self.project.loop_state = vela_playlist::LoopState { active, start, end };
            }
            Command::SetLatencyMode { mode } => {
                self.transport.set_latency_mode(mode);
                self.project.latency_mode = mode;
            }
            Command::AddTrack { kind, name } => {
                let id = TrackId(self.id_gen.next());
                let track = Track::new(id, kind, name.unwrap_or_else(|| "Track".to_string()));
                self.project.tracks.push(track);
                self.rebuild_runtime(id);
                self.recompute_topology();
            }
            Command::DeleteTrack { id } => {
                if id == MASTER_TRACK {
                    return Err(EngineError::InvalidCommand("cannot delete master"));
                }
                let before = self.project.tracks.len();
                self.project.tracks.retain(|t| t.id != id);
                if self.project.tracks.len() == before {
                    return Err(EngineError::unknown_id(id.0));
                }
                self.runtimes.remove(&id);
                self.recompute_topology();
            }
            Command::UpdateTrack { id, patch } => {
                let track = self
                    .project
                    .track_mut(id)
                    .ok_or_else(|| EngineError::unknown_id(id.0))?;
                if let Some(name) = patch.name {
                    track.name = name;
                }
                if let Some(v) = patch.is_muted {
                    track.is_muted = v;
                }
                if let Some(v) = patch.is_solo {
                    track.is_solo = v;
                }
                if let Some(v) = patch.is_armed {
                    track.is_armed = v;
                }
                if let Some(v) = patch.volume {
                    track.volume = v.clamp(0.0, 1.5);
                }
                if let Some(v) = patch.pan {
                    track.pan = v.clamp(-1.0, 1.0);
                }
            }
            Command::ReorderTracks { .. } => {
                // Ordering for routing purposes is derived topologically
                // (§4.3); explicit reorder only affects host display order,
                // which this engine does not model.
            }
            Command::SetOutput { track_id, dest_id } => {
                graph::validate_destination(&self.project, track_id, dest_id)?;
                self.project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?
                    .output_track_id = dest_id;
                self.recompute_topology();
            }
            Command::SetSend { track_id, send_id, level, enabled } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                let send = track
                    .sends
                    .iter_mut()
                    .find(|s| s.id == send_id)
                    .ok_or_else(|| EngineError::unknown_id(send_id.0))?;
                send.level = level.clamp(0.0, 1.5);
                send.is_enabled = enabled;
            }
            Command::AddPlugin { track_id, kind, plugin_id } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                track.inserts.push(vela_playlist::PluginInstance::new(plugin_id, kind));
                self.rebuild_runtime(track_id);
            }
            Command::RemovePlugin { track_id, plugin_id } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                track.inserts.retain(|p| p.id != plugin_id);
                self.rebuild_runtime(track_id);
                self.recompute_topology();
            }
            Command::SetPluginParam { track_id, plugin_id, key, value } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                let plugin = track
                    .insert_mut(plugin_id)
                    .ok_or_else(|| EngineError::unknown_id(plugin_id.0))?;
                plugin.params.insert(key, value);
                self.rebuild_runtime(track_id);
            }
            Command::SetPluginEnabled { track_id, plugin_id, enabled } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                let plugin = track
                    .insert_mut(plugin_id)
                    .ok_or_else(|| EngineError::unknown_id(plugin_id.0))?;
                plugin.is_enabled = enabled;
                self.recompute_topology();
            }
            Command::AddClip { track_id, clip } => {
                clip.validate(None).map_err(|_| EngineError::OutOfRange("clip"))?;
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                track.clips.push(clip);
            }
            Command::EditClip { track_id, clip_id, edit } => {
                self.edit_clip(track_id, clip_id, edit)?;
            }
            Command::PrepareForRecording => {
                self.frozen_inserts.clear();
                for track in &self.project.tracks {
                    if track.enabled_insert_latency() > 0 {
                        for insert in &track.inserts {
                            if insert.is_enabled && insert.latency > 0 {
                                self.frozen_inserts.insert(insert.id);
                            }
                        }
                    }
                }
                self.project.rec_mode = true;
                self.recompute_topology();
                tracing::info!(frozen = self.frozen_inserts.len(), "entered record mode");
            }
            Command::FinalizeRecording => {
                self.frozen_inserts.clear();
                self.project.rec_mode = false;
                self.recompute_topology();
                tracing::info!("finalized recording, PDC restored");
            }
            Command::SetAutomationMode { lane_id, mode } => {
                self.automation.set_mode(lane_id, to_engine_mode(mode));
            }
            Command::Touch { lane_id } => self.automation.touch(lane_id),
            Command::Release { lane_id } => self.automation.release(lane_id),
            Command::SetValue { lane_id, value, time } => {
                self.automation.set_value(lane_id, time, value);
            }
            Command::TriggerPad { track_id, pad_id, velocity } => {
                let track = self
                    .project
                    .track(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                let pad = track
                    .drum_pad(pad_id)
                    .ok_or_else(|| EngineError::unknown_id(pad_id.0))?;
                let source_ref = pad
                    .buffer_ref
                    .clone()
                    .ok_or_else(|| EngineError::missing_source(format!("pad {}", pad_id.0)))?;
                let gain = velocity.clamp(0.0, 1.0) * pad.gain;
                let pan = pad.pan;
                let audio = self
                    .resolve_source(&source_ref)
                    .ok_or_else(|| EngineError::missing_source(source_ref))?;
                if let Some(runtime) = self.runtimes.get_mut(&track_id) {
                    runtime.trigger_drum_pad(audio, gain, pan);
                }
            }
            Command::SetAdsr { track_id, attack, decay, sustain, release } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                track.sampler.attack = attack.max(0.0);
                track.sampler.decay = decay.max(0.0);
                track.sampler.sustain = sustain.clamp(0.0, 1.0);
                track.sampler.release = release.max(0.0);
            }
            Command::LoadSamplerBuffer { track_id, source_ref } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                track.sampler.source_ref = Some(source_ref);
            }
            Command::LoadDrumSample { track_id, pad_id, source_ref } => {
                let track = self
                    .project
                    .track_mut(track_id)
                    .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
                match track.drum_pad_mut(pad_id) {
                    Some(pad) => pad.buffer_ref = Some(source_ref),
                    None => {
                        let mut pad = vela_playlist::DrumPad::new(pad_id);
                        pad.buffer_ref = Some(source_ref);
                        track.drum_pads.push(pad);
                    }
                }
            }
        }
        self.bump_snapshot();
        Ok(())
    }

    fn edit_clip(&mut self, track_id: TrackId, clip_id: ClipId, edit: ClipEdit) -> EngineResult<()> {
        let track = self
            .project
            .track_mut(track_id)
            .ok_or_else(|| EngineError::unknown_id(track_id.0))?;
        match edit {
            ClipEdit::UpdateProps { start, duration, gain } => {
                let clip = track
                    .clip_mut(clip_id)
                    .ok_or_else(|| EngineError::unknown_id(clip_id.0))?;
                if let Some(s) = start {
                    clip.start = s;
                }
                if let Some(d) = duration {
                    clip.duration = d;
                }
                if let Some(g) = gain {
                    clip.gain = g;
                }
            }
            ClipEdit::SplitAt { time, new_id } => {
                let clip = track
                    .clip_mut(clip_id)
                    .ok_or_else(|| EngineError::unknown_id(clip_id.0))?
                    .clone();
                let (left, right) = clip
                    .split_at(time, new_id)
                    .ok_or(EngineError::OutOfRange("split_at"))?;
                *track.clip_mut(clip_id).unwrap() = left;
                track.clips.push(right);
            }
            ClipEdit::Duplicate { new_id } => {
                let mut copy = track
                    .clip_mut(clip_id)
                    .ok_or_else(|| EngineError::unknown_id(clip_id.0))?
                    .clone();
                copy.id = new_id;
                track.clips.push(copy);
            }
            ClipEdit::Delete => {
                track.clips.retain(|c| c.id != clip_id);
            }
            ClipEdit::Normalize => {
                // Peak-normalizing a clip's underlying buffer is a source
                // cache operation; not modeled at the data-model layer.
            }
            ClipEdit::Rename { name } => {
                let clip = track
                    .clip_mut(clip_id)
                    .ok_or_else(|| EngineError::unknown_id(clip_id.0))?;
                clip.name = name;
            }
            ClipEdit::Reverse => {
                let clip = track
                    .clip_mut(clip_id)
                    .ok_or_else(|| EngineError::unknown_id(clip_id.0))?;
                clip.reverse = !clip.reverse;
            }
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Advances the graph by one block, writing the master mix into `out`
    /// (§4.2, §4.3). This is the only audio-thread entry point; it never
    /// allocates on the steady-state path once tracks/inserts are stable.
    pub fn process_block(&mut self, out: &mut AudioBuffer) {
        let block_start_time = self.transport.current_time(self.audio_clock);
        let frames = self.config.block_size;
        self.transport.tick(self.audio_clock);

        let mut automation_updates = Vec::new();
        self.automation.read_block(block_start_time, |lane_id, value| {
            automation_updates.push((lane_id, value));
        });
        for (lane_id, value) in automation_updates {
            apply_automation_value(&mut self.project, &self.automation_targets, lane_id, value);
        }

        let any_soloed = self.project.any_track_soloed();
        let channels = self.config.layout.channels() as usize;
        let mut bus_inputs: HashMap<TrackId, AudioBuffer> = self
            .order
            .iter()
            .map(|&id| (id, AudioBuffer::new(channels, frames)))
            .collect();

        let sample_rate = self.config.sample_rate;
        let order = self.order.clone();
        for id in order {
            let Some(track) = self.project.track(id).cloned() else { continue };
            let mut signal = bus_inputs
                .remove(&id)
                .unwrap_or_else(|| AudioBuffer::new(channels, frames));
            let audible = track.is_audible(any_soloed);

            if let Some(runtime) = self.runtimes.get_mut(&id) {
                if !matches!(track.kind, vela_playlist::TrackKind::Bus | vela_playlist::TrackKind::Send) {
                    let clip_cache = &self.clip_cache;
                    let source = move |r: &str| clip_cache.get(r).cloned();
                    runtime.mix_clips(&mut signal, &track, &source, block_start_time, frames, sample_rate);
                }

                if !audible {
                    signal.clear();
                }

                let frozen: Vec<_> = self.frozen_inserts.iter().copied().collect();
                runtime.process_inserts(&mut signal, &frozen);
                runtime.apply_fader(&mut signal, track.volume, track.pan, audible);

                for contribution in collect_sends(&track, &signal) {
                    if let Some(dest) = bus_inputs.get_mut(&contribution.destination) {
                        dest.mix_from(&contribution.buffer, 1.0);
                    }
                }

                runtime.apply_pdc(&mut signal);
                runtime.tap_analyzer(&mut signal, self.transport.is_playing(), id == MASTER_TRACK);

                if id == MASTER_TRACK {
                    self.master_analyzer
                        .observe(&signal, self.transport.is_playing(), true);
                    for channel in 0..out.num_channels().min(signal.num_channels()) {
                        out.channel_mut(channel).copy_from_slice(signal.channel(channel));
                    }
                } else if let Some(dest) = bus_inputs.get_mut(&track.output_track_id) {
                    dest.mix_from(&signal, 1.0);
                }
            }
        }

        self.audio_clock += frames as f64 / self.config.sample_rate as f64;
    }

    pub fn register_automation_parameter(
        &mut self,
        lane_id: AutomationLaneId,
        target: AutomationTarget,
        spec: ParameterSpec,
    ) {
        self.automation.register_parameter(spec);
        self.automation_targets.insert(lane_id, target);
    }
}

fn to_engine_mode(mode: AutomationMode) -> EngineAutomationMode {
    match mode {
        AutomationMode::Off => EngineAutomationMode::Off,
        AutomationMode::Read => EngineAutomationMode::Read,
        AutomationMode::Write => EngineAutomationMode::Write,
        AutomationMode::Latch => EngineAutomationMode::Latch,
    }
}

fn apply_automation_value(
    project: &mut ProjectState,
    targets: &HashMap<AutomationLaneId, AutomationTarget>,
    lane_id: AutomationLaneId,
    value: f32,
) {
    let Some(target) = targets.get(&lane_id) else { return };
    match target {
        AutomationTarget::Track { track, param } => {
            if let Some(t) = project.track_mut(*track) {
                match param.as_str() {
                    "volume" => t.volume = value.clamp(0.0, 1.5),
                    "pan" => t.pan = value.clamp(-1.0, 1.0),
                    _ => {}
                }
            }
        }
        AutomationTarget::Plugin { track, plugin, param } => {
            if let Some(t) = project.track_mut(*track) {
                if let Some(p) = t.insert_mut(*plugin) {
                    p.params.insert(param.clone(), value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ChannelLayout;
    use vela_playlist::TrackKind;

    #[test]
    fn add_track_then_process_block_stays_silent_without_clips() {
        let config = BufferConfig::new(48_000.0, 64, ChannelLayout::Stereo);
        let mut engine = Engine::new(config.clone());
        engine
            .apply(Command::AddTrack { kind: TrackKind::Audio, name: None })
            .unwrap();
        engine.apply(Command::Play { start_offset: Some(0.0) }).unwrap();
        let mut out = AudioBuffer::from_config(&config);
        engine.process_block(&mut out);
        assert!(out.channels().all(|c| c.iter().all(|s| *s == 0.0)));
    }

    #[test]
    fn set_output_rejects_cycle() {
        let config = BufferConfig::new(48_000.0, 64, ChannelLayout::Stereo);
        let mut engine = Engine::new(config);
        engine
            .apply(Command::AddTrack { kind: TrackKind::Bus, name: None })
            .unwrap();
        let a = engine.project.tracks.last().unwrap().id;
        engine
            .apply(Command::AddTrack { kind: TrackKind::Bus, name: None })
            .unwrap();
        let b = engine.project.tracks.last().unwrap().id;
        engine.apply(Command::SetOutput { track_id: b, dest_id: a }).unwrap();
        let result = engine.apply(Command::SetOutput { track_id: a, dest_id: b });
        assert!(result.is_err());
    }

    #[test]
    fn clip_audio_reaches_master_output() {
        let config = BufferConfig::new(48_000.0, 64, ChannelLayout::Stereo);
        let mut engine = Engine::new(config.clone());
        engine
            .apply(Command::AddTrack { kind: TrackKind::Audio, name: None })
            .unwrap();
        let track_id = engine.project.tracks.last().unwrap().id;
        engine.register_source("tone", AudioClip::with_sample_rate(48_000.0, vec![vec![0.5; 64], vec![0.5; 64]]));
        engine
            .apply(Command::AddClip {
                track_id,
                clip: vela_playlist::Clip::new_audio(ClipId(1), "c", 0.0, 1.0, "tone"),
            })
            .unwrap();
        engine.apply(Command::Play { start_offset: Some(0.0) }).unwrap();
        let mut out = AudioBuffer::from_config(&config);
        engine.process_block(&mut out);
        assert!(out.channel(0).iter().any(|s| *s != 0.0));
    }
}
