//! Offline renderer (§4.9, C9): deterministic, faster-than-realtime
//! master/stem render driven through the same [`Engine`] the audio thread
//! uses, so the offline path can only diverge from the live path at
//! dithering/normalization (§4.10), never in DSP ordering.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vela_playlist::{ProjectState, Track, TrackId, TrackKind, MASTER_TRACK};

use crate::buffer::{AudioBuffer, BufferConfig, ChannelLayout};
use crate::clips::AudioClip;
use crate::commands::Command;
use crate::core::{EngineError, EngineResult};
use crate::facade::Engine;
use crate::graph::MAX_ROUTE_DEPTH;

/// Parameters common to a master or stem render (§4.9).
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub duration_seconds: f64,
    pub start_offset_seconds: f64,
    pub target_sample_rate: f32,
    pub block_size: usize,
}

/// Cooperative cancellation flag; checked once per rendered block so a
/// cancelled render discards partial output rather than returning it (§5, §7).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One rendered stem (§4.9, §6 `renderStems`).
pub struct StemRender {
    pub track_id: TrackId,
    pub name: String,
    pub buffer: AudioBuffer,
}

fn build_engine(
    project: &ProjectState,
    sources: &HashMap<String, AudioClip>,
    request: &RenderRequest,
) -> Engine {
    let config = BufferConfig::new(request.target_sample_rate, request.block_size, ChannelLayout::Stereo);
    let mut engine = Engine::new(config);
    let mut rendered_project = project.clone();
    rendered_project.pdc_enabled = true;
    rendered_project.rec_mode = false;
    engine.load_project(rendered_project);
    for (reference, clip) in sources {
        engine.register_source(reference.clone(), clip.clone());
    }
    engine
}

/// Drives `engine` in fixed blocks until `duration_seconds` of audio has been
/// produced, writing into one stereo buffer and reporting `[0,1]` monotonic
/// progress (§4.9).
fn run_to_buffer(
    engine: &mut Engine,
    request: &RenderRequest,
    cancel: &CancellationToken,
    mut progress: impl FnMut(f32),
) -> EngineResult<AudioBuffer> {
    engine
        .apply(Command::Play { start_offset: Some(request.start_offset_seconds) })
        .map_err(|_| EngineError::InvalidCommand("render start_offset"))?;

    let total_frames = ((request.duration_seconds * request.target_sample_rate as f64).round() as i64)
        .max(0) as usize;
    let mut out = AudioBuffer::new(2, total_frames);
    let mut block = AudioBuffer::new(2, request.block_size);
    let mut rendered = 0usize;

    tracing::info!(total_frames, block_size = request.block_size, "render started");
    while rendered < total_frames {
        if cancel.is_cancelled() {
            tracing::warn!(rendered, total_frames, "render cancelled, discarding partial output");
            return Err(EngineError::RenderCancelled);
        }
        block.clear();
        engine.process_block(&mut block);
        let take = request.block_size.min(total_frames - rendered);
        for channel in 0..out.num_channels().min(block.num_channels()) {
            out.channel_mut(channel)[rendered..rendered + take]
                .copy_from_slice(&block.channel(channel)[..take]);
        }
        rendered += take;
        progress((rendered as f32 / total_frames.max(1) as f32).clamp(0.0, 1.0));
    }
    tracing::info!(total_frames, "render complete");
    Ok(out)
}

/// Renders the master mix for `project` over `[start_offset, start_offset +
/// duration)` at `target_sample_rate` (§4.9). `sources` resolves every
/// `source_ref` a clip in the project refers to; a clip whose source is
/// absent renders as silence, matching the live path (§4.2).
pub fn render_master(
    project: &ProjectState,
    sources: &HashMap<String, AudioClip>,
    request: &RenderRequest,
    cancel: &CancellationToken,
    progress: impl FnMut(f32),
) -> EngineResult<AudioBuffer> {
    let mut engine = build_engine(project, sources, request);
    run_to_buffer(&mut engine, request, cancel, progress)
}

/// Every track on `track`'s path to master, inclusive, walking
/// `output_track_id` up to [`MAX_ROUTE_DEPTH`] hops (§4.3).
fn routing_path(project: &ProjectState, track: TrackId) -> HashSet<TrackId> {
    let mut path = HashSet::new();
    path.insert(track);
    let mut current = track;
    for _ in 0..MAX_ROUTE_DEPTH {
        let Some(t) = project.track(current) else { break };
        if t.output_track_id == current {
            break;
        }
        current = t.output_track_id;
        path.insert(current);
    }
    path
}

/// Isolates `track` by muting every other track not on its routing path,
/// leaving buses/sends on that path untouched so its signal still reaches
/// master (§4.9, §9 open question c).
fn isolate_for_stem(project: &ProjectState, track: TrackId) -> ProjectState {
    let path = routing_path(project, track);
    let mut isolated = project.clone();
    for t in isolated.tracks.iter_mut() {
        if !path.contains(&t.id) {
            t.is_muted = true;
        }
    }
    isolated
}

fn is_stem_source(track: &Track) -> bool {
    matches!(
        track.kind,
        TrackKind::Audio | TrackKind::Midi | TrackKind::Sampler | TrackKind::DrumRack
    )
}

/// Renders one stem per source track by re-running [`render_master`] against
/// an isolated copy of the project (§4.9). Progress is reported per stem,
/// `[0,1]` across the whole batch.
pub fn render_stems(
    project: &ProjectState,
    sources: &HashMap<String, AudioClip>,
    request: &RenderRequest,
    cancel: &CancellationToken,
    mut progress: impl FnMut(f32),
) -> EngineResult<Vec<StemRender>> {
    let stem_tracks: Vec<&Track> = project
        .tracks
        .iter()
        .filter(|t| t.id != MASTER_TRACK && is_stem_source(t))
        .collect();
    let total = stem_tracks.len().max(1);
    let mut results = Vec::with_capacity(stem_tracks.len());

    for (index, track) in stem_tracks.into_iter().enumerate() {
        let isolated = isolate_for_stem(project, track.id);
        let buffer = render_master(&isolated, sources, request, cancel, |p| {
            progress((index as f32 + p) / total as f32);
        })?;
        results.push(StemRender {
            track_id: track.id,
            name: track.name.clone(),
            buffer,
        });
    }
    Ok(results)
}

/// Sanitizes a track name into the filename the stem bundle uses for it:
/// any byte outside `[A-Za-z0-9]` becomes `_` (§6 wire formats).
pub fn sanitize_stem_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_playlist::{Clip, ClipId};

    fn single_clip_project(sample_rate: f32, frames: usize) -> (ProjectState, HashMap<String, AudioClip>) {
        let mut project = ProjectState::new();
        let mut track = Track::new(TrackId(1), TrackKind::Audio, "Lead");
        track
            .clips
            .push(Clip::new_audio(ClipId(1), "c", 0.0, frames as f64 / sample_rate as f64, "tone"));
        project.tracks.push(track);
        project.pdc_enabled = false;

        let mut sources = HashMap::new();
        let samples: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.01).sin()).collect();
        sources.insert(
            "tone".to_string(),
            AudioClip::with_sample_rate(sample_rate, vec![samples.clone(), samples]),
        );
        (project, sources)
    }

    #[test]
    fn render_reaches_full_requested_duration() {
        let sample_rate = 48_000.0;
        let frames = 2048;
        let (project, sources) = single_clip_project(sample_rate, frames);
        let request = RenderRequest {
            duration_seconds: frames as f64 / sample_rate as f64,
            start_offset_seconds: 0.0,
            target_sample_rate: sample_rate,
            block_size: 256,
        };
        let cancel = CancellationToken::new();
        let mut last_progress = 0.0f32;
        let out = render_master(&project, &sources, &request, &cancel, |p| last_progress = p).unwrap();
        assert_eq!(out.len(), frames);
        assert!((last_progress - 1.0).abs() < 1e-6);
        assert!(out.channel(0).iter().any(|s| *s != 0.0));
    }

    #[test]
    fn cancelled_render_returns_error() {
        let sample_rate = 48_000.0;
        let frames = 48_000;
        let (project, sources) = single_clip_project(sample_rate, frames);
        let request = RenderRequest {
            duration_seconds: frames as f64 / sample_rate as f64,
            start_offset_seconds: 0.0,
            target_sample_rate: sample_rate,
            block_size: 256,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = render_master(&project, &sources, &request, &cancel, |_| {});
        assert!(matches!(result, Err(EngineError::RenderCancelled)));
    }

    #[test]
    fn stems_are_rendered_one_per_source_track() {
        let sample_rate = 48_000.0;
        let frames = 512;
        let (mut project, sources) = single_clip_project(sample_rate, frames);
        let mut second = Track::new(TrackId(2), TrackKind::Audio, "Pad");
        second
            .clips
            .push(Clip::new_audio(ClipId(2), "c2", 0.0, frames as f64 / sample_rate as f64, "tone"));
        project.tracks.push(second);

        let request = RenderRequest {
            duration_seconds: frames as f64 / sample_rate as f64,
            start_offset_seconds: 0.0,
            target_sample_rate: sample_rate,
            block_size: 128,
        };
        let cancel = CancellationToken::new();
        let stems = render_stems(&project, &sources, &request, &cancel, |_| {}).unwrap();
        assert_eq!(stems.len(), 2);
    }

    #[test]
    fn sanitize_replaces_non_alphanumeric() {
        assert_eq!(sanitize_stem_name("Lead Vox #1"), "Lead_Vox__1");
    }
}
