use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic id allocator. The host and the engine each own one so that ids
/// assigned on the command-producing side never collide with ids the engine
/// mints internally (e.g. clip halves produced by a split).
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn starting_at(value: u64) -> Self {
        Self {
            next: AtomicU64::new(value),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

macro_rules! stable_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(value: u64) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

stable_id!(TrackId);
stable_id!(ClipId);
stable_id!(PluginInstanceId);
stable_id!(SendId);
stable_id!(AutomationLaneId);
stable_id!(NoteId);

/// The routing id reserved for the unique final sink of the mix graph.
pub const MASTER_TRACK: TrackId = TrackId(0);

/// 1..30: a fixed drum pad slot. MIDI note is `60 + (id - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrumPadId(pub u8);

impl DrumPadId {
    pub fn midi_note(self) -> u8 {
        60 + (self.0.saturating_sub(1))
    }
}
