use serde::{Deserialize, Serialize};

use crate::ids::{ClipId, NoteId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidiNote {
    pub id: NoteId,
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
    pub velocity: f32,
}

impl MidiNote {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClipContent {
    /// Stable source reference (URL or content hash) used to rehydrate the
    /// decoded buffer; the engine resolves this lazily and caches the result.
    Audio { source_ref: String },
    Midi { notes: Vec<MidiNote> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub offset: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    pub gain: f32,
    pub reverse: bool,
    pub is_muted: bool,
    pub content: ClipContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClipError {
    #[error("clip start must be >= 0")]
    NegativeStart,
    #[error("clip duration must be > 0")]
    NonPositiveDuration,
    #[error("fade_in + fade_out must not exceed duration")]
    FadesExceedDuration,
    #[error("offset must lie within [0, source_length)")]
    OffsetOutOfRange,
}

impl Clip {
    pub fn new_audio(
        id: ClipId,
        name: impl Into<String>,
        start: f64,
        duration: f64,
        source_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            start,
            duration,
            offset: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            gain: 1.0,
            reverse: false,
            is_muted: false,
            content: ClipContent::Audio {
                source_ref: source_ref.into(),
            },
        }
    }

    pub fn new_midi(id: ClipId, name: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            id,
            name: name.into(),
            start,
            duration,
            offset: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            gain: 1.0,
            reverse: false,
            is_muted: false,
            content: ClipContent::Midi { notes: Vec::new() },
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Validates the §3 per-clip invariants. `source_length` is `None` for
    /// MIDI clips, which have no offset bound.
    pub fn validate(&self, source_length: Option<f64>) -> Result<(), ClipError> {
        if self.start < 0.0 {
            return Err(ClipError::NegativeStart);
        }
        if self.duration <= 0.0 {
            return Err(ClipError::NonPositiveDuration);
        }
        if self.fade_in + self.fade_out > self.duration || self.fade_in < 0.0 || self.fade_out < 0.0
        {
            return Err(ClipError::FadesExceedDuration);
        }
        if let Some(len) = source_length {
            if self.offset < 0.0 || self.offset >= len {
                return Err(ClipError::OffsetOutOfRange);
            }
        }
        Ok(())
    }

    /// Splits the clip at `split_at` (project time, absolute). Returns
    /// `(left, right)` whose concatenated audio equals the original (§8).
    pub fn split_at(&self, split_at: f64, right_id: ClipId) -> Option<(Clip, Clip)> {
        if split_at <= self.start || split_at >= self.end() {
            return None;
        }
        let left_duration = split_at - self.start;
        let right_duration = self.end() - split_at;

        let mut left = self.clone();
        left.duration = left_duration;
        left.fade_out = left.fade_out.min(left_duration);

        let mut right = self.clone();
        right.id = right_id;
        right.start = split_at;
        right.duration = right_duration;
        right.offset = self.offset + left_duration;
        right.fade_in = right.fade_in.min(right_duration);

        Some((left, right))
    }
}
