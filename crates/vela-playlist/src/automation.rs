use serde::{Deserialize, Serialize};

use crate::ids::{AutomationLaneId, PluginInstanceId, TrackId};

/// What an automation lane drives: either a track-level parameter (volume,
/// pan, send level, ...) or a parameter exposed by one of its plug-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AutomationTarget {
    Track { track: TrackId, param: String },
    Plugin {
        track: TrackId,
        plugin: PluginInstanceId,
        param: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub time: f64,
    pub value: f32,
}

/// Stored, serializable lane state. The live read/write behavior (touch set,
/// throttling, interpolation) lives in `vela_engine::automation`; this is the
/// data shape that is loaded, saved, and transmitted as part of `DAWState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationLane {
    pub id: AutomationLaneId,
    pub target: AutomationTarget,
    pub points: Vec<Breakpoint>,
    pub min: f32,
    pub max: f32,
    pub is_expanded: bool,
}

impl AutomationLane {
    pub fn new(id: AutomationLaneId, target: AutomationTarget, min: f32, max: f32) -> Self {
        Self {
            id,
            target,
            points: Vec::new(),
            min,
            max,
            is_expanded: false,
        }
    }

    /// Inserts or overwrites the breakpoint at `time`, keeping `points`
    /// strictly increasing in time as required by §3.
    pub fn insert(&mut self, time: f64, value: f32) {
        let value = value.clamp(self.min, self.max);
        match self.points.binary_search_by(|p| {
            p.time
                .partial_cmp(&time)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) {
            Ok(idx) => self.points[idx].value = value,
            Err(idx) => self.points.insert(idx, Breakpoint { time, value }),
        }
    }

    pub fn is_monotone(&self) -> bool {
        self.points.windows(2).all(|w| w[0].time < w[1].time)
    }
}
