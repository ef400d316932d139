/// Fixed scale set (§4.6). Each entry is a sorted set of semitone classes
/// relative to the root, in `0..12`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    Chromatic,
    Major,
    Minor,
    HarmonicMinor,
    Pentatonic,
    TrapDark,
}

impl Scale {
    pub fn members(self) -> &'static [i32] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::Pentatonic => &[0, 3, 5, 7, 10],
            Scale::TrapDark => &[0, 1, 4, 5, 7, 8, 11],
        }
    }

    /// Nearest member of the scale to `pitch_class` (`0..12`), measuring
    /// distance around the 12-class wheel and resolving ties upward.
    pub fn nearest(self, pitch_class: i32) -> i32 {
        let pitch_class = pitch_class.rem_euclid(12);
        let mut best = self.members()[0];
        let mut best_dist = i32::MAX;
        let mut best_is_upward = false;
        for &member in self.members() {
            let dist_up = (member - pitch_class).rem_euclid(12);
            let dist_down = (pitch_class - member).rem_euclid(12);
            let dist = dist_up.min(dist_down);
            let is_upward = dist_up <= dist_down;
            if dist < best_dist || (dist == best_dist && is_upward && !best_is_upward) {
                best_dist = dist;
                best = member;
                best_is_upward = is_upward;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chromatic_is_identity() {
        for pc in 0..12 {
            assert_eq!(Scale::Chromatic.nearest(pc), pc);
        }
    }

    #[test]
    fn major_snaps_to_nearest_degree() {
        // pitch class 1 (C#) is equidistant from 0 and 2 in major; ties
        // resolve upward (§4.6) -> 2.
        assert_eq!(Scale::Major.nearest(1), 2);
        assert_eq!(Scale::Major.nearest(6), 7);
    }

    #[test]
    fn wraparound_distance_is_bounded() {
        // pitch class 11 is distance 1 from member 0 going "up" through the
        // wrap, not distance 11 going down.
        assert_eq!(Scale::Pentatonic.nearest(11), 0);
    }
}
