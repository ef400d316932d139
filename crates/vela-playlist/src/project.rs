use serde::{Deserialize, Serialize};

use crate::automation::AutomationLane;
use crate::ids::TrackId;
use crate::track::Track;
use crate::MASTER_TRACK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatencyMode {
    Low,
    Balanced,
    High,
}

impl LatencyMode {
    /// `(tick_ms, window_ms)` per §6.
    pub fn timing_ms(self) -> (u32, u32) {
        match self {
            LatencyMode::Low => (15, 40),
            LatencyMode::Balanced => (25, 100),
            LatencyMode::High => (50, 200),
        }
    }
}

impl Default for LatencyMode {
    fn default() -> Self {
        LatencyMode::Balanced
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub active: bool,
    pub start: f64,
    pub end: f64,
}

impl Default for LoopState {
    fn default() -> Self {
        Self {
            active: false,
            start: 0.0,
            end: 0.0,
        }
    }
}

/// Top-level persisted/snapshot state (`DAWState` in the external interface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub bpm: f32,
    pub key_scale: Option<String>,
    pub is_playing: bool,
    pub is_recording: bool,
    pub current_time: f64,
    pub loop_state: LoopState,
    pub tracks: Vec<Track>,
    pub selected_track: Option<TrackId>,
    pub rec_mode: bool,
    pub pdc_enabled: bool,
    pub system_max_latency: u32,
    pub latency_mode: LatencyMode,
    pub automation_lanes: Vec<AutomationLane>,
}

impl ProjectState {
    pub fn new() -> Self {
        Self {
            bpm: 120.0,
            key_scale: None,
            is_playing: false,
            is_recording: false,
            current_time: 0.0,
            loop_state: LoopState::default(),
            tracks: vec![Track::master(MASTER_TRACK)],
            selected_track: None,
            rec_mode: false,
            pdc_enabled: true,
            system_max_latency: 0,
            latency_mode: LatencyMode::default(),
            automation_lanes: Vec::new(),
        }
    }

    pub fn master(&self) -> &Track {
        self.tracks
            .iter()
            .find(|t| t.id == MASTER_TRACK)
            .expect("master track always present")
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn any_track_soloed(&self) -> bool {
        self.tracks.iter().any(|t| t.is_solo)
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}
