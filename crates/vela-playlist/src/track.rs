use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::ids::{AutomationLaneId, ClipId, DrumPadId, PluginInstanceId, SendId, TrackId};
use crate::MASTER_TRACK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Midi,
    Bus,
    Send,
    Sampler,
    DrumRack,
}

/// The fixed effect family a [`PluginInstance`] can be. Drum rack and sampler
/// are modeled as plug-ins driven by a MIDI input stream (design note, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginKind {
    ParametricEq,
    Compressor,
    Delay,
    Reverb,
    Saturator,
    Chorus,
    Sampler,
    DrumRack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInstance {
    pub id: PluginInstanceId,
    pub kind: PluginKind,
    pub is_enabled: bool,
    pub params: std::collections::BTreeMap<String, f32>,
    /// Advertised processing latency in samples, honored by PDC (§4.3).
    pub latency: u32,
}

impl PluginInstance {
    pub fn new(id: PluginInstanceId, kind: PluginKind) -> Self {
        Self {
            id,
            kind,
            is_enabled: true,
            params: std::collections::BTreeMap::new(),
            latency: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Send {
    pub id: SendId,
    pub destination: TrackId,
    pub level: f32,
    pub is_enabled: bool,
}

impl Send {
    pub fn new(id: SendId, destination: TrackId) -> Self {
        Self {
            id,
            destination,
            level: 1.0,
            is_enabled: true,
        }
    }

    pub fn clamp_level(&mut self) {
        self.level = self.level.clamp(0.0, 1.5);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrumPad {
    pub id: DrumPadId,
    pub buffer_ref: Option<String>,
    pub gain: f32,
    pub pan: f32,
    pub is_muted: bool,
    pub is_solo: bool,
}

impl DrumPad {
    pub fn new(id: DrumPadId) -> Self {
        Self {
            id,
            buffer_ref: None,
            gain: 1.0,
            pan: 0.0,
            is_muted: false,
            is_solo: false,
        }
    }
}

/// A sampler track's single loaded buffer and note-gating envelope (§4.2
/// step 1). Drum rack tracks keep the analogous per-pad state on
/// [`DrumPad`] instead, since each pad has its own buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSettings {
    pub source_ref: Option<String>,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            source_ref: None,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.8,
            release: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub color: [f32; 4],
    pub kind: TrackKind,
    pub is_muted: bool,
    pub is_solo: bool,
    pub is_armed: bool,
    pub is_frozen: bool,
    /// Linear gain in `[0, 1.5]`. The UI fader position uses
    /// `sqrt(volume / 1.5)`; the engine always applies `volume` directly.
    pub volume: f32,
    /// Equal-power pan in `[-1, 1]`.
    pub pan: f32,
    pub input_id: Option<String>,
    pub output_track_id: TrackId,
    pub inserts: Vec<PluginInstance>,
    pub sends: Vec<Send>,
    pub clips: Vec<Clip>,
    pub automation_lanes: Vec<AutomationLaneId>,
    pub drum_pads: Vec<DrumPad>,
    pub sampler: SamplerSettings,
    pub total_latency: u32,
}

impl Track {
    pub fn new(id: TrackId, kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: [0.3, 0.5, 0.8, 1.0],
            kind,
            is_muted: false,
            is_solo: false,
            is_armed: false,
            is_frozen: false,
            volume: 1.0,
            pan: 0.0,
            input_id: None,
            output_track_id: MASTER_TRACK,
            inserts: Vec::new(),
            sends: Vec::new(),
            clips: Vec::new(),
            automation_lanes: Vec::new(),
            drum_pads: Vec::new(),
            sampler: SamplerSettings::default(),
            total_latency: 0,
        }
    }

    pub fn master(id: TrackId) -> Self {
        let mut track = Self::new(id, TrackKind::Bus, "Master");
        track.output_track_id = id;
        track
    }

    pub fn insert_mut(&mut self, id: PluginInstanceId) -> Option<&mut PluginInstance> {
        self.inserts.iter_mut().find(|p| p.id == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn drum_pad(&self, id: DrumPadId) -> Option<&DrumPad> {
        self.drum_pads.iter().find(|p| p.id == id)
    }

    pub fn drum_pad_mut(&mut self, id: DrumPadId) -> Option<&mut DrumPad> {
        self.drum_pads.iter_mut().find(|p| p.id == id)
    }

    pub fn enabled_insert_latency(&self) -> u32 {
        self.inserts
            .iter()
            .filter(|p| p.is_enabled)
            .map(|p| p.latency)
            .sum()
    }

    /// §3 invariant: solo-effective iff some track is soloed and this one is
    /// among them, or no track anywhere is soloed.
    pub fn is_solo_effective(&self, any_track_soloed: bool) -> bool {
        !any_track_soloed || self.is_solo
    }

    pub fn is_audible(&self, any_track_soloed: bool) -> bool {
        !self.is_muted && self.is_solo_effective(any_track_soloed)
    }
}
