use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use vela_playlist::AutomationLaneId;

use super::curve::LaneCurve;
use super::record::{AutomationMode, Recorder};

/// Bridged parameters throttle applied-value callbacks to this spacing even
/// when the read value changes every sample (§4.7, §5).
pub const BRIDGED_THROTTLE_SECONDS: f64 = 0.030;

#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub id: AutomationLaneId,
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    /// Parameters whose apply path is expensive (e.g. cross-boundary plug-in
    /// bridges) are throttled to at most one apply every 30ms (§4.7).
    pub bridged: bool,
}

impl ParameterSpec {
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

struct ParameterState {
    spec: ParameterSpec,
    curve: LaneCurve,
    recorder: Recorder,
    last_applied_value: Option<f32>,
    last_applied_time: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub struct AutomationFeedback {
    pub parameter: AutomationLaneId,
    pub time: f64,
    pub value: f32,
}

/// Registry + interpolated read + touch/latch write + throttled bridge
/// writes (C7). One instance per engine; the audio thread owns it and the
/// façade only ever talks to it through commands.
pub struct AutomationManager {
    parameters: HashMap<AutomationLaneId, ParameterState>,
    feedback_tx: Sender<AutomationFeedback>,
    feedback_rx: Receiver<AutomationFeedback>,
}

impl AutomationManager {
    pub fn new() -> Self {
        let (feedback_tx, feedback_rx) = crossbeam_channel::unbounded();
        Self {
            parameters: HashMap::new(),
            feedback_tx,
            feedback_rx,
        }
    }

    /// UI feedback subscription, serviced off the audio thread (§9).
    pub fn subscribe(&self) -> Receiver<AutomationFeedback> {
        self.feedback_rx.clone()
    }

    pub fn register_parameter(&mut self, spec: ParameterSpec) {
        let id = spec.id;
        self.parameters.entry(id).or_insert_with(|| ParameterState {
            spec: spec.clone(),
            curve: LaneCurve::new(),
            recorder: Recorder::new(),
            last_applied_value: None,
            last_applied_time: None,
        });
        if let Some(state) = self.parameters.get_mut(&id) {
            state.spec = spec;
        }
    }

    pub fn set_mode(&mut self, id: AutomationLaneId, mode: AutomationMode) {
        if let Some(state) = self.parameters.get_mut(&id) {
            state.recorder.set_mode(mode);
        }
    }

    pub fn touch(&mut self, id: AutomationLaneId) {
        if let Some(state) = self.parameters.get_mut(&id) {
            state.recorder.begin_touch();
        }
    }

    pub fn release(&mut self, id: AutomationLaneId) {
        if let Some(state) = self.parameters.get_mut(&id) {
            state.recorder.end_touch();
        }
    }

    /// `setValue` from the host (§6). Only emits a breakpoint if the
    /// recorder permits writing in its current mode/touch state.
    pub fn set_value(&mut self, id: AutomationLaneId, time: f64, value: f32) {
        if let Some(state) = self.parameters.get_mut(&id) {
            if state.recorder.can_write() {
                let clamped = state.spec.clamp(value);
                state.curve.push(time, clamped);
            }
        }
    }

    pub fn load_curve(&mut self, id: AutomationLaneId, points: &[(f64, f32)]) {
        if let Some(state) = self.parameters.get_mut(&id) {
            state.curve = LaneCurve::new();
            for &(time, value) in points {
                state.curve.push(time, state.spec.clamp(value));
            }
        }
    }

    /// Samples every registered, non-touched parameter at block start and
    /// invokes `apply` with its value (§4.7). Bridged parameters are
    /// throttled to [`BRIDGED_THROTTLE_SECONDS`].
    pub fn read_block(&mut self, block_start_time: f64, mut apply: impl FnMut(AutomationLaneId, f32)) {
        for state in self.parameters.values_mut() {
            if state.recorder.mode() == AutomationMode::Off {
                continue;
            }
            if state.recorder.is_touched() {
                continue;
            }
            let value = state.curve.value_at(block_start_time, state.spec.default);

            if state.spec.bridged {
                let throttled = state
                    .last_applied_time
                    .map(|t| block_start_time - t < BRIDGED_THROTTLE_SECONDS)
                    .unwrap_or(false);
                if throttled {
                    continue;
                }
            }

            let changed = state.last_applied_value != Some(value);
            if changed || state.last_applied_time.is_none() {
                apply(state.spec.id, value);
                state.last_applied_value = Some(value);
                state.last_applied_time = Some(block_start_time);
                let _ = self.feedback_tx.try_send(AutomationFeedback {
                    parameter: state.spec.id,
                    time: block_start_time,
                    value,
                });
            }
        }
    }

    pub fn value_now(&self, id: AutomationLaneId, time: f64) -> Option<f32> {
        self.parameters
            .get(&id)
            .map(|state| state.curve.value_at(time, state.spec.default))
    }
}

impl Default for AutomationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: u64, bridged: bool) -> ParameterSpec {
        ParameterSpec {
            id: AutomationLaneId(id),
            name: "volume".into(),
            min: 0.0,
            max: 1.5,
            default: 1.0,
            bridged,
        }
    }

    #[test]
    fn touched_parameter_is_read_skipped() {
        let mut manager = AutomationManager::new();
        manager.register_parameter(spec(1, false));
        manager.set_mode(AutomationLaneId(1), AutomationMode::Write);
        manager.touch(AutomationLaneId(1));
        manager.set_value(AutomationLaneId(1), 0.0, 0.3);

        let mut applied = Vec::new();
        manager.read_block(0.1, |id, v| applied.push((id, v)));
        assert!(applied.is_empty());
    }

    #[test]
    fn read_mode_interpolates_registered_curve() {
        let mut manager = AutomationManager::new();
        manager.register_parameter(spec(2, false));
        manager.set_mode(AutomationLaneId(2), AutomationMode::Write);
        manager.touch(AutomationLaneId(2));
        manager.set_value(AutomationLaneId(2), 0.0, 0.2);
        manager.release(AutomationLaneId(2));
        manager.set_mode(AutomationLaneId(2), AutomationMode::Read);

        let mut applied = Vec::new();
        manager.read_block(0.0, |id, v| applied.push((id, v)));
        assert_eq!(applied, vec![(AutomationLaneId(2), 0.2)]);
    }

    #[test]
    fn bridged_parameter_throttles_apply() {
        let mut manager = AutomationManager::new();
        manager.register_parameter(spec(3, true));
        manager.set_mode(AutomationLaneId(3), AutomationMode::Write);
        manager.touch(AutomationLaneId(3));
        manager.set_value(AutomationLaneId(3), 0.0, 0.1);
        manager.set_value(AutomationLaneId(3), 0.01, 0.9);
        manager.release(AutomationLaneId(3));
        manager.set_mode(AutomationLaneId(3), AutomationMode::Read);

        let mut applied = Vec::new();
        manager.read_block(0.0, |id, v| applied.push((id, v)));
        manager.read_block(0.01, |id, v| applied.push((id, v)));
        assert_eq!(applied.len(), 1);
    }
}
