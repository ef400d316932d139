//! Data model shared by the engine and its host: tracks, clips, automation
//! lanes, and the project snapshot they compose into.

pub mod automation;
pub mod clip;
pub mod ids;
pub mod project;
pub mod track;

pub use automation::{AutomationLane, AutomationTarget, Breakpoint};
pub use clip::{Clip, ClipContent, ClipError, MidiNote};
pub use ids::{
    AutomationLaneId, ClipId, DrumPadId, IdGenerator, NoteId, PluginInstanceId, SendId, TrackId,
    MASTER_TRACK,
};
pub use project::{LatencyMode, LoopState, ProjectState};
pub use track::{DrumPad, PluginInstance, PluginKind, SamplerSettings, Send, Track, TrackKind};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_clip_preserves_total_duration() {
        let clip = Clip::new_audio(ClipId(1), "vocal", 0.0, 4.0, "hash:abc");
        let (left, right) = clip.split_at(1.5, ClipId(2)).unwrap();
        assert_eq!(left.duration + right.duration, clip.duration);
        assert_eq!(left.end(), right.start);
    }

    #[test]
    fn split_outside_bounds_is_rejected() {
        let clip = Clip::new_audio(ClipId(1), "vocal", 0.0, 4.0, "hash:abc");
        assert!(clip.split_at(0.0, ClipId(2)).is_none());
        assert!(clip.split_at(4.0, ClipId(2)).is_none());
        assert!(clip.split_at(10.0, ClipId(2)).is_none());
    }

    #[test]
    fn track_solo_effective_rules() {
        let mut a = Track::new(TrackId(1), TrackKind::Audio, "A");
        let mut b = Track::new(TrackId(2), TrackKind::Audio, "B");
        assert!(a.is_solo_effective(false));
        b.is_solo = true;
        assert!(!a.is_solo_effective(true));
        assert!(b.is_solo_effective(true));
        a.is_solo = true;
        assert!(a.is_solo_effective(true));
    }

    #[test]
    fn automation_lane_stays_monotone_after_inserts() {
        let mut lane = AutomationLane::new(
            AutomationLaneId(1),
            AutomationTarget::Track {
                track: TrackId(1),
                param: "volume".into(),
            },
            0.0,
            1.5,
        );
        lane.insert(1.0, 0.5);
        lane.insert(0.2, 0.1);
        lane.insert(1.0, 0.8);
        assert!(lane.is_monotone());
        assert_eq!(lane.points.len(), 2);
        assert_eq!(lane.points[1].value, 0.8);
    }

    #[test]
    fn project_master_track_is_a_sink_to_itself() {
        let project = ProjectState::new();
        let master = project.master();
        assert_eq!(master.output_track_id, MASTER_TRACK);
    }
}
