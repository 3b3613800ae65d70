//! Module containing the acceleration model: what each driving mode can
//! actually achieve at a given speed, and how effort is blended while it
//! builds up after a mode change.

use crate::driver::Mode;
use crate::imports::*;
use crate::lookahead::Phase;
use crate::params::DriverParams;

/// Ramp remainders shorter than this are treated as complete, $s$
const RAMP_TOL_S: f64 = 1e-9;

/// Traction limit above the power curve speed.
///
/// Follows `sqrt((k1 + v) * (v_line - v)) / (v + k2)`, with `k1` and `k2`
/// chosen so the curve equals the nominal acceleration with zero slope at the
/// threshold speed and falls to zero at line speed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PowerCurve {
    accel_max_mps2: f64,
    speed_threshold_mps: f64,
    line_speed_mps: f64,
    k1: f64,
    k2: f64,
}

impl PowerCurve {
    pub fn new(accel_max_mps2: f64, speed_threshold_mps: f64, line_speed_mps: f64) -> Self {
        // with u = T + k2 and p = k1 + T, f(T) = A and f'(T) = 0 reduce to
        // A^2 u^2 + 2 A^2 M u - M^2 = 0 where M = v_line - T
        let a = accel_max_mps2;
        let m = line_speed_mps - speed_threshold_mps;
        let u = m * ((a * a + 1.0).sqrt() - a) / a;
        let p = a * a * u * u / m;
        Self {
            accel_max_mps2,
            speed_threshold_mps,
            line_speed_mps,
            k1: p - speed_threshold_mps,
            k2: u - speed_threshold_mps,
        }
    }

    pub fn from_params(params: &DriverParams) -> Self {
        Self::new(
            params.accel_max_mps2,
            params.power_curve_speed_mps,
            params.line_speed_mps,
        )
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    pub fn k2(&self) -> f64 {
        self.k2
    }

    /// Maximum acceleration available under power at `speed_mps`
    pub fn max_power(&self, speed_mps: f64) -> f64 {
        if speed_mps <= self.speed_threshold_mps {
            self.accel_max_mps2
        } else if speed_mps >= self.line_speed_mps {
            0.0
        } else {
            ((self.k1 + speed_mps) * (self.line_speed_mps - speed_mps)).sqrt()
                / (speed_mps + self.k2)
        }
    }
}

/// Progress of power or brake effort towards full magnitude after the most
/// recent mode change
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    /// Mode before the most recent change
    pub mode_from: Mode,
    pub mode: Mode,
    /// Time since the most recent change, $s$
    pub elapsed_s: f64,
}

impl Ramp {
    /// Effort in `mode` already fully built up
    pub fn settled(mode: Mode, ramp_time_s: f64) -> Self {
        Self {
            mode_from: mode,
            mode,
            elapsed_s: ramp_time_s,
        }
    }

    pub fn begin(&mut self, mode_next: Mode) {
        self.mode_from = self.mode;
        self.mode = mode_next;
        self.elapsed_s = 0.0;
    }

    pub fn advance(&mut self, dt_s: f64) {
        self.elapsed_s += dt_s;
    }
}

/// Acceleration available in each [Mode]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct AccelModel {
    pub power_curve: PowerCurve,
    pub accel_max_mps2: f64,
    pub ramp_time_s: f64,
    pub step_s: f64,
}

impl AccelModel {
    pub fn from_params(params: &DriverParams) -> Self {
        Self {
            power_curve: PowerCurve::from_params(params),
            accel_max_mps2: params.accel_max_mps2,
            ramp_time_s: params.ramp_time_s,
            step_s: params.step_s,
        }
    }

    pub fn is_settled(&self, ramp: &Ramp) -> bool {
        self.ramp_time_s - ramp.elapsed_s < RAMP_TOL_S
    }

    /// Duration and mean acceleration of the next step if `mode_next` is
    /// chosen: a fresh ramp on a mode change, the rest of an unfinished ramp,
    /// or one nominal step at full effect
    pub fn step_phase(&self, ramp: &Ramp, mode_next: Mode, speed_mps: f64) -> Phase {
        if mode_next != ramp.mode {
            Phase::new(
                self.ramp_time_s,
                self.blended_accel(ramp.mode, mode_next, speed_mps),
            )
        } else if !self.is_settled(ramp) {
            Phase::new(
                self.ramp_time_s - ramp.elapsed_s,
                self.blended_accel(ramp.mode_from, ramp.mode, speed_mps),
            )
        } else {
            Phase::new(self.step_s, self.effective_accel(ramp.mode, speed_mps))
        }
    }

    fn nominal_accel(&self, mode: Mode) -> f64 {
        match mode {
            Mode::Power => self.accel_max_mps2,
            Mode::Cruise => 0.0,
            Mode::Brake => -self.accel_max_mps2,
        }
    }

    pub fn max_power(&self, speed_mps: f64) -> f64 {
        self.power_curve.max_power(speed_mps)
    }

    /// Acceleration once effort in `mode` has fully built up
    pub fn effective_accel(&self, mode: Mode, speed_mps: f64) -> f64 {
        self.nominal_accel(mode).min(self.max_power(speed_mps))
    }

    /// Mean acceleration over a ramp from `mode_prev` to `mode_next`
    pub fn blended_accel(&self, mode_prev: Mode, mode_next: Mode, speed_mps: f64) -> f64 {
        if mode_prev == mode_next {
            return self.effective_accel(mode_next, speed_mps);
        }
        0.5 * (self.effective_accel(mode_prev, speed_mps)
            + self.effective_accel(mode_next, speed_mps))
    }

    /// Deceleration magnitude that brings the train to rest in exactly
    /// `dist_m`, never more than full brake
    pub fn stopping_decel(&self, speed_mps: f64, dist_m: f64) -> f64 {
        if dist_m <= 0.0 {
            return self.accel_max_mps2;
        }
        (speed_mps * speed_mps / (2.0 * dist_m)).min(self.accel_max_mps2)
    }
}
