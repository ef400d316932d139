//! Transport scheduler (§4.4, C6): wall-clock-driven look-ahead dispatch,
//! loop wrap, seek, and epoch-tagged cancellation of stale events.

use vela_playlist::LatencyMode;

/// A single materialized event, timestamped in project-time seconds and
/// tagged with the epoch active when it was produced. Events whose epoch no
/// longer matches the transport's current epoch are dropped on dispatch
/// (§5 cancellation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub epoch: u64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    ClipBoundary,
    NoteOn { pitch: u8, velocity: f32 },
    NoteOff { pitch: u8 },
    AutomationBreakpoint,
    LoopWrap { to: f64 },
}

/// Single-threaded cooperative scheduler. `tick` is meant to be called from
/// a timer firing every `I` milliseconds (§4.4); it materializes every event
/// whose project time falls in the lookahead window and advances
/// `next_schedule_time`.
pub struct Transport {
    is_playing: bool,
    paused_at: f64,
    /// `project_time = audio_time - t0`, fixed at the start of each play span.
    t0: f64,
    next_schedule_time: f64,
    epoch: u64,
    latency_mode: LatencyMode,
    loop_active: bool,
    loop_start: f64,
    loop_end: f64,
    pending: Vec<ScheduledEvent>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            is_playing: false,
            paused_at: 0.0,
            t0: 0.0,
            next_schedule_time: 0.0,
            epoch: 0,
            latency_mode: LatencyMode::Balanced,
            loop_active: false,
            loop_start: 0.0,
            loop_end: 0.0,
            pending: Vec::new(),
        }
    }

    pub fn set_latency_mode(&mut self, mode: LatencyMode) {
        self.latency_mode = mode;
    }

    /// `(tick_seconds, window_seconds)` for the active latency mode (§6).
    pub fn timing(&self) -> (f64, f64) {
        let (tick_ms, window_ms) = self.latency_mode.timing_ms();
        (tick_ms as f64 / 1000.0, window_ms as f64 / 1000.0)
    }

    pub fn set_loop(&mut self, active: bool, start: f64, end: f64) {
        self.loop_active = active;
        self.loop_start = start;
        self.loop_end = end.max(start);
    }

    /// `play(start_offset)` (§6). Starting playback bumps the epoch so any
    /// stale lookahead events from a previous span are dropped on dispatch.
    pub fn play(&mut self, audio_now: f64, start_offset: Option<f64>) {
        let start_at = start_offset.unwrap_or(self.paused_at);
        self.t0 = audio_now - start_at;
        self.next_schedule_time = start_at;
        self.is_playing = true;
        self.epoch += 1;
        self.pending.clear();
    }

    pub fn stop(&mut self, audio_now: f64) {
        if self.is_playing {
            self.paused_at = audio_now - self.t0;
        }
        self.is_playing = false;
        self.epoch += 1;
        self.pending.clear();
    }

    /// Seeking while playing stops, relocates, and resumes, cancelling
    /// already-materialized future events first (§4.4).
    pub fn seek(&mut self, audio_now: f64, target: f64) {
        let was_playing = self.is_playing;
        self.stop(audio_now);
        self.paused_at = target;
        if was_playing {
            self.play(audio_now, Some(target));
        }
    }

    pub fn current_time(&self, audio_now: f64) -> f64 {
        if self.is_playing {
            audio_now - self.t0
        } else {
            self.paused_at
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Materializes events in `[next_schedule_time, next_schedule_time + W)`
    /// while `next_schedule_time < now + W` (§4.4). Only loop wrap is
    /// synthesized directly here; clip/MIDI/automation event sourcing is the
    /// caller's responsibility, driven by the returned time range.
    pub fn tick(&mut self, audio_now: f64) -> (f64, f64) {
        if !self.is_playing {
            return (self.next_schedule_time, self.next_schedule_time);
        }
        let (_, window) = self.timing();
        let now_project = self.current_time(audio_now);
        let window_end = now_project + window;

        let range_start = self.next_schedule_time;
        if self.loop_active && self.next_schedule_time < self.loop_end && window_end >= self.loop_end
        {
            self.pending.push(ScheduledEvent {
                time: self.loop_end,
                epoch: self.epoch,
                kind: EventKind::LoopWrap {
                    to: self.loop_start,
                },
            });
            // Wrapping invalidates everything materialized past loop_end in
            // this lookahead; bump the epoch so those get dropped downstream.
            self.epoch += 1;
            self.t0 = audio_now - self.loop_start;
            self.next_schedule_time = self.loop_start;
            return (range_start, self.loop_end);
        }

        self.next_schedule_time = window_end;
        (range_start, window_end)
    }

    pub fn drain_events(&mut self) -> Vec<ScheduledEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_time_tracks_audio_clock_while_playing() {
        let mut transport = Transport::new();
        transport.play(10.0, Some(0.0));
        assert!((transport.current_time(11.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stop_freezes_paused_at() {
        let mut transport = Transport::new();
        transport.play(0.0, Some(0.0));
        transport.stop(2.0);
        assert!((transport.current_time(5.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn seek_relocates_and_bumps_epoch() {
        let mut transport = Transport::new();
        transport.play(0.0, Some(0.0));
        let epoch_before = transport.epoch();
        transport.seek(1.0, 5.0);
        assert!(transport.epoch() > epoch_before);
        assert!((transport.current_time(1.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn loop_wrap_resets_schedule_to_loop_start() {
        let mut transport = Transport::new();
        transport.set_loop(true, 1.0, 2.0);
        transport.play(0.0, Some(1.9));
        transport.tick(0.0);
        assert!((transport.current_time(0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn latency_mode_matches_exact_table() {
        let mut transport = Transport::new();
        transport.set_latency_mode(LatencyMode::Low);
        assert_eq!(transport.timing(), (0.015, 0.040));
        transport.set_latency_mode(LatencyMode::High);
        assert_eq!(transport.timing(), (0.050, 0.200));
    }
}
