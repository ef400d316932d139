#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationMode {
    Off,
    Read,
    Write,
    Latch,
}

/// Per-parameter touch/latch bookkeeping (§4.7, §9: the `touched` set
/// consulted at block start; a touched parameter is read-skipped for that
/// block).
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    mode: ModeState,
    touching: bool,
    latched: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeState {
    Off,
    Read,
    Write,
    Latch,
}

impl Default for ModeState {
    fn default() -> Self {
        ModeState::Off
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AutomationMode {
        match self.mode {
            ModeState::Off => AutomationMode::Off,
            ModeState::Read => AutomationMode::Read,
            ModeState::Write => AutomationMode::Write,
            ModeState::Latch => AutomationMode::Latch,
        }
    }

    pub fn set_mode(&mut self, mode: AutomationMode) {
        self.mode = match mode {
            AutomationMode::Off => ModeState::Off,
            AutomationMode::Read => ModeState::Read,
            AutomationMode::Write => ModeState::Write,
            AutomationMode::Latch => ModeState::Latch,
        };
        if mode != AutomationMode::Latch {
            self.latched = false;
        }
        if !matches!(mode, AutomationMode::Write | AutomationMode::Latch) {
            self.touching = false;
        }
    }

    /// Called on user touch. Returns whether the touch enters the `touched`
    /// set (i.e. whether subsequent `setValue`s should write breakpoints).
    pub fn begin_touch(&mut self) -> bool {
        match self.mode {
            ModeState::Off | ModeState::Read => false,
            ModeState::Write => {
                self.touching = true;
                true
            }
            ModeState::Latch => {
                self.touching = true;
                self.latched = true;
                true
            }
        }
    }

    pub fn end_touch(&mut self) {
        match self.mode {
            ModeState::Off | ModeState::Read => {}
            ModeState::Write => self.touching = false,
            ModeState::Latch => self.touching = false,
        }
    }

    pub fn is_touched(&self) -> bool {
        self.touching || self.latched
    }

    pub fn can_write(&self) -> bool {
        match self.mode {
            ModeState::Off | ModeState::Read => false,
            ModeState::Write => self.touching,
            ModeState::Latch => self.touching || self.latched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_mode_requires_active_touch() {
        let mut recorder = Recorder::new();
        recorder.set_mode(AutomationMode::Write);
        assert!(!recorder.can_write());
        assert!(recorder.begin_touch());
        assert!(recorder.can_write());
        recorder.end_touch();
        assert!(!recorder.can_write());
    }

    #[test]
    fn latch_mode_sticks_after_release() {
        let mut recorder = Recorder::new();
        recorder.set_mode(AutomationMode::Latch);
        recorder.begin_touch();
        recorder.end_touch();
        assert!(recorder.can_write());
    }

    #[test]
    fn off_and_read_never_write() {
        let mut recorder = Recorder::new();
        for mode in [AutomationMode::Off, AutomationMode::Read] {
            recorder.set_mode(mode);
            recorder.begin_touch();
            assert!(!recorder.can_write());
        }
    }
}
