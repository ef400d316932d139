use crate::smoothing::OnePole;

/// Topology-preserving-transform state-variable filter core (Andrew Simper's
/// formulation). Produces lowpass, highpass, bandpass and notch taps from a
/// single set of coefficients; `process` returns the lowpass tap to preserve
/// the original call sites, use [`Svf::process_taps`] for the rest.
#[derive(Clone, Copy, Debug)]
pub struct Svf {
    g: f32,
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    ic1eq: f32,
    ic2eq: f32,
}

pub struct SvfTaps {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

impl Svf {
    #[inline]
    pub fn new() -> Self {
        Self {
            g: 0.0,
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    #[inline]
    pub fn lowpass(sample_rate: f32, cutoff_hz: f32, q: f32) -> Self {
        let mut s = Self::new();
        s.set_lowpass(sample_rate, cutoff_hz, q);
        s
    }

    #[inline]
    pub fn set_lowpass(&mut self, sample_rate: f32, cutoff_hz: f32, q: f32) {
        self.set_coefficients(sample_rate, cutoff_hz, q);
    }

    #[inline]
    pub fn set_coefficients(&mut self, sample_rate: f32, cutoff_hz: f32, q: f32) {
        let sr = sample_rate.max(1.0);
        let cutoff = cutoff_hz.clamp(10.0, 0.45 * sr);
        let res = q.max(0.05);
        let g = (core::f32::consts::PI * (cutoff / sr)).tan();
        let k = 1.0 / res;
        let a1 = 1.0 / (1.0 + g * (g + k));
        let a2 = g * a1;
        let a3 = g * a2;
        self.g = g;
        self.k = k;
        self.a1 = a1;
        self.a2 = a2;
        self.a3 = a3;
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.process_taps(input).lowpass
    }

    #[inline]
    pub fn process_taps(&mut self, input: f32) -> SvfTaps {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        let bandpass = v1;
        let lowpass = v2;
        let highpass = input - self.k * bandpass - lowpass;
        let notch = input - self.k * bandpass;
        SvfTaps {
            lowpass,
            bandpass,
            highpass,
            notch,
        }
    }
}

/// Filter response selectable on a single [`Biquad`] instance (§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peak,
    LowShelf,
    HighShelf,
}

/// Convenience wrapper around [`Svf`] that smooths cutoff/gain changes
/// toward their target with a one-pole ramp (time constant `tau`) instead of
/// snapping, avoiding zipper noise on automated parameter changes.
#[derive(Clone, Debug)]
pub struct Biquad {
    mode: FilterMode,
    core: Svf,
    sample_rate: f32,
    q: f32,
    gain_db: f32,
    target_cutoff: f32,
    cutoff_smoother: OnePole,
}

impl Biquad {
    pub fn new(sample_rate: f32, mode: FilterMode, cutoff_hz: f32, q: f32) -> Self {
        let mut smoother = OnePole::new(sample_rate, 5.0);
        smoother.reset(cutoff_hz);
        let mut filter = Self {
            mode,
            core: Svf::new(),
            sample_rate: sample_rate.max(1.0),
            q: q.max(0.05),
            gain_db: 0.0,
            target_cutoff: cutoff_hz,
            cutoff_smoother: smoother,
        };
        filter.core.set_coefficients(filter.sample_rate, cutoff_hz, filter.q);
        filter
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.gain_db = gain_db;
    }

    pub fn set_target_cutoff(&mut self, cutoff_hz: f32) {
        self.target_cutoff = cutoff_hz.clamp(10.0, 0.45 * self.sample_rate);
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q.max(0.05);
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.cutoff_smoother.reset(self.target_cutoff);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let cutoff = self.cutoff_smoother.next(self.target_cutoff);
        self.core.set_coefficients(self.sample_rate, cutoff, self.q);
        let taps = self.core.process_taps(input);
        match self.mode {
            FilterMode::Lowpass => taps.lowpass,
            FilterMode::Highpass => taps.highpass,
            FilterMode::Bandpass => taps.bandpass,
            FilterMode::Notch => taps.notch,
            FilterMode::Peak => {
                let gain = crate::gain::db_to_linear(self.gain_db) - 1.0;
                input + gain * taps.bandpass * self.q.recip().max(0.1)
            }
            FilterMode::LowShelf => {
                let gain = crate::gain::db_to_linear(self.gain_db);
                taps.lowpass * gain + taps.highpass
            }
            FilterMode::HighShelf => {
                let gain = crate::gain::db_to_linear(self.gain_db);
                taps.highpass * gain + taps.lowpass
            }
        }
    }
}
