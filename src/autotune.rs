//! Relay-feedback gain estimation (Åström–Hägglund).
//!
//! While active the tuner owns the heater duty: it bangs the output between
//! `output_start ± OUTPUT_STEP` whenever the temperature leaves a noise band
//! around the level it started at, watches the resulting oscillation for
//! stable peaks, and derives PID gains from the ultimate gain and period
//! with the Ziegler-Nichols rules. The control loop installs the gains; the
//! tuner never touches the regulator itself.

use crate::pid::Tunings;
use embassy_time::{Duration, Instant};
use heapless::Vec;
use log::debug;

pub const OUTPUT_STEP: f32 = 50.0;
pub const NOISE_BAND_C: f32 = 1.0;

/// Peaks are only trusted once a sample dominates this many previous
/// evaluations: 20 s of lookback at the 250 ms evaluation interval.
const LOOKBACK_SAMPLES: usize = 80;
const EVAL_INTERVAL_MS: u64 = 250;

/// Hard cap on half-cycles before the estimate is taken as-is.
const MAX_PEAKS: usize = 10;

/// Successive maxima must agree within this fraction of the oscillation
/// envelope before the estimate is considered stable.
const CONVERGENCE_BAND: f32 = 0.05;

/// Non-convergence ceiling. The upstream relay procedure would oscillate
/// forever on a process that never settles; past this we give up and leave
/// the previous gains in place.
const TUNE_CEILING: Duration = Duration::from_secs(20 * 60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunerOutcome {
    /// Still oscillating; apply this duty.
    Pending(u8),
    /// Converged; the control loop installs these gains.
    Done(Tunings),
    Failed(TuneError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneError {
    /// No stable estimate within the time ceiling.
    Timeout,
    /// The process never produced a measurable oscillation.
    NoOscillation,
}

impl std::fmt::Display for TuneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TuneError::Timeout => write!(f, "tuning did not converge in time"),
            TuneError::NoOscillation => write!(f, "no oscillation detected"),
        }
    }
}

impl std::error::Error for TuneError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Max,
    Min,
}

pub struct RelayTuner {
    /// Temperature the oscillation is centered on, captured at activation.
    reference: f32,
    /// Duty the regulator held at activation; the relay swings around it.
    output_start: f32,
    output: f32,
    started_at: Instant,
    last_eval: Option<Instant>,
    window: Vec<f32, LOOKBACK_SAMPLES>,
    maxima: Vec<f32, MAX_PEAKS>,
    phase: Option<Phase>,
    /// Completed max→min transitions.
    half_cycles: usize,
    just_changed: bool,
    last_max_at: Option<Instant>,
    prev_max_at: Option<Instant>,
    envelope_max: f32,
    envelope_min: f32,
}

impl RelayTuner {
    pub fn new(output_start: f32, reference: f32, now: Instant) -> Self {
        Self {
            reference,
            output_start,
            // heat first, like the upstream relay procedure
            output: output_start + OUTPUT_STEP,
            started_at: now,
            last_eval: None,
            window: Vec::new(),
            maxima: Vec::new(),
            phase: None,
            half_cycles: 0,
            just_changed: false,
            last_max_at: None,
            prev_max_at: None,
            envelope_max: reference,
            envelope_min: reference,
        }
    }

    fn duty(&self) -> u8 {
        self.output.clamp(0.0, 255.0) as u8
    }

    /// Advance the procedure with a fresh measurement. Internally
    /// rate-limited to one evaluation per `EVAL_INTERVAL_MS`; between
    /// evaluations the previous duty is repeated.
    pub fn step(&mut self, input: f32, now: Instant) -> TunerOutcome {
        if now.duration_since(self.started_at) > TUNE_CEILING {
            return TunerOutcome::Failed(TuneError::Timeout);
        }

        if let Some(last_eval) = self.last_eval {
            if now.duration_since(last_eval) < Duration::from_millis(EVAL_INTERVAL_MS) {
                return TunerOutcome::Pending(self.duty());
            }
        }
        self.last_eval = Some(now);

        if self.half_cycles >= MAX_PEAKS {
            return self.finish();
        }

        self.envelope_max = self.envelope_max.max(input);
        self.envelope_min = self.envelope_min.min(input);

        // Relay action: bang the output whenever the measurement leaves the
        // noise band around the reference.
        if input > self.reference + NOISE_BAND_C {
            self.output = self.output_start - OUTPUT_STEP;
        } else if input < self.reference - NOISE_BAND_C {
            self.output = self.output_start + OUTPUT_STEP;
        }

        // A sample is a peak (trough) when it dominates the whole lookback
        // window. Evaluated before the sample enters the window.
        let is_max = self.window.iter().all(|&v| input > v);
        let is_min = self.window.iter().all(|&v| input < v);
        let window_full = self.window.is_full();
        if window_full {
            self.window.remove(0);
        }
        let _ = self.window.push(input);
        if !window_full {
            // not enough context to trust peaks yet
            return TunerOutcome::Pending(self.duty());
        }

        if is_max {
            if self.phase != Some(Phase::Max) {
                if self.phase == Some(Phase::Min) {
                    self.just_changed = true;
                    self.prev_max_at = self.last_max_at;
                }
                self.phase = Some(Phase::Max);
                if self.maxima.is_full() {
                    self.maxima.remove(0);
                }
                let _ = self.maxima.push(input);
            } else if let Some(last) = self.maxima.last_mut() {
                // still climbing inside the same max phase
                *last = input;
            }
            self.last_max_at = Some(now);
        } else if is_min {
            if self.phase == Some(Phase::Max) {
                self.half_cycles += 1;
                self.just_changed = true;
            }
            self.phase = Some(Phase::Min);
        }

        debug!(
            "tuner: input={:.2} duty={} half_cycles={} envelope=[{:.2},{:.2}]",
            input,
            self.duty(),
            self.half_cycles,
            self.envelope_min,
            self.envelope_max
        );

        if self.just_changed && self.half_cycles > 2 && self.maxima.len() >= 3 {
            let m = &self.maxima;
            let separation = ((m[m.len() - 1] - m[m.len() - 2]).abs()
                + (m[m.len() - 2] - m[m.len() - 3]).abs())
                / 2.0;
            if separation < CONVERGENCE_BAND * (self.envelope_max - self.envelope_min) {
                self.just_changed = false;
                return self.finish();
            }
        }
        self.just_changed = false;

        TunerOutcome::Pending(self.duty())
    }

    /// Turn the collected oscillation into gains, or fail if it is
    /// degenerate.
    fn finish(&self) -> TunerOutcome {
        let amplitude = self.envelope_max - self.envelope_min;
        if amplitude <= f32::EPSILON {
            return TunerOutcome::Failed(TuneError::NoOscillation);
        }
        let period_s = match (self.last_max_at, self.prev_max_at) {
            (Some(last), Some(prev)) if last > prev => {
                last.duration_since(prev).as_millis() as f32 / 1000.0
            }
            _ => return TunerOutcome::Failed(TuneError::NoOscillation),
        };

        // Ultimate gain from relay amplitude, then Ziegler-Nichols PID.
        let ku = 4.0 * (2.0 * OUTPUT_STEP) / (amplitude * core::f32::consts::PI);
        let pu = period_s;
        TunerOutcome::Done(Tunings {
            kp: 0.6 * ku,
            ki: 1.2 * ku / pu,
            kd: 0.075 * ku * pu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(step: u64) -> Instant {
        Instant::from_millis(step * EVAL_INTERVAL_MS)
    }

    #[test]
    fn test_starts_heating() {
        let tuner = RelayTuner::new(100.0, 95.0, at(0));
        assert_eq!(tuner.duty(), 150);
    }

    #[test]
    fn test_relay_flips_outside_noise_band() {
        let mut tuner = RelayTuner::new(100.0, 95.0, at(0));

        // above the band: back off
        match tuner.step(96.5, at(0)) {
            TunerOutcome::Pending(duty) => assert_eq!(duty, 50),
            other => panic!("unexpected outcome {:?}", other),
        }
        // below the band: heat
        match tuner.step(93.5, at(1)) {
            TunerOutcome::Pending(duty) => assert_eq!(duty, 150),
            other => panic!("unexpected outcome {:?}", other),
        }
        // inside the band: hold
        match tuner.step(95.2, at(2)) {
            TunerOutcome::Pending(duty) => assert_eq!(duty, 150),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_rate_limited_between_evaluations() {
        let mut tuner = RelayTuner::new(100.0, 95.0, at(0));
        tuner.step(93.0, at(0));
        // 100 ms later the relay must not re-evaluate even though the
        // measurement crossed the band
        match tuner.step(97.0, Instant::from_millis(100)) {
            TunerOutcome::Pending(duty) => assert_eq!(duty, 150),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    /// Slowly growing triangle oscillation around the reference; every crest
    /// tops the lookback window and every trough undercuts it, which is what
    /// a real relay oscillation looks like through sensor noise.
    fn synthetic_sample(step: u64) -> f32 {
        const PERIOD: u64 = 40;
        let cycle = (step / PERIOD) as f32;
        let amplitude = 2.0 + 0.02 * cycle;
        let phase = (step % PERIOD) as f32 / PERIOD as f32;
        let triangle = if phase < 0.5 {
            4.0 * phase - 1.0
        } else {
            3.0 - 4.0 * phase
        };
        95.0 + amplitude * triangle
    }

    #[test]
    fn test_converges_on_sustained_oscillation() {
        let mut tuner = RelayTuner::new(100.0, 95.0, at(0));

        for step in 0..2000 {
            match tuner.step(synthetic_sample(step), at(step)) {
                TunerOutcome::Pending(_) => continue,
                TunerOutcome::Done(tunings) => {
                    assert!(tunings.kp.is_finite() && tunings.kp > 0.0);
                    assert!(tunings.ki.is_finite() && tunings.ki > 0.0);
                    assert!(tunings.kd.is_finite() && tunings.kd > 0.0);
                    // Ziegler-Nichols internal consistency: ki = 2·kp/Pu and
                    // kd = kp·Pu/8 for the PID rule set, with Pu = 10 s here.
                    let pu = 10.0;
                    assert!((tunings.ki - 2.0 * tunings.kp / pu).abs() < 0.05 * tunings.ki);
                    assert!((tunings.kd - tunings.kp * pu / 8.0).abs() < 0.05 * tunings.kd);
                    return;
                }
                TunerOutcome::Failed(e) => panic!("tuning failed: {}", e),
            }
        }
        panic!("tuner did not converge");
    }

    #[test]
    fn test_times_out_past_ceiling() {
        let mut tuner = RelayTuner::new(100.0, 95.0, at(0));
        tuner.step(95.0, at(0));
        let late = Instant::from_millis(21 * 60 * 1000);
        assert_eq!(
            tuner.step(95.0, late),
            TunerOutcome::Failed(TuneError::Timeout)
        );
    }
}
