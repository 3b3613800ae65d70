//! Module containing the lookahead: the speed the train would have on
//! reaching the next section boundary if it committed to braking now.

use crate::imports::*;

/// Interval of constant acceleration
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub dt_s: f64,
    pub accel_mps2: f64,
}

impl Phase {
    pub fn new(dt_s: f64, accel_mps2: f64) -> Self {
        Self { dt_s, accel_mps2 }
    }

    /// Speed at the end of the phase when entered at `speed_mps`
    pub fn end_speed(&self, speed_mps: f64) -> f64 {
        speed_mps + self.accel_mps2 * self.dt_s
    }

    /// Splits the phase where, entered at `speed_mps`, it would pass
    /// `ceiling_mps` speeding up or `floor_mps` slowing down. The first part
    /// runs at the phase's acceleration up to the limit and the rest holds
    /// speed. A phase entered at or past its limit holds speed throughout.
    pub fn bounded(self, speed_mps: f64, floor_mps: f64, ceiling_mps: f64) -> (Self, Option<Self>) {
        if self.dt_s <= 0.0 || self.accel_mps2 == 0.0 {
            return (self, None);
        }
        let limit_mps = if self.accel_mps2 > 0.0 {
            ceiling_mps
        } else {
            floor_mps
        };
        let dt_to_limit_s = (limit_mps - speed_mps) / self.accel_mps2;
        if dt_to_limit_s <= LIMIT_TOL_S {
            (Self::new(self.dt_s, 0.0), None)
        } else if dt_to_limit_s >= self.dt_s {
            (self, None)
        } else {
            (
                Self::new(dt_to_limit_s, self.accel_mps2),
                Some(Self::new(self.dt_s - dt_to_limit_s, 0.0)),
            )
        }
    }
}

/// Shortest part of a phase worth taking before a limit, anything less holds
/// speed
const LIMIT_TOL_S: f64 = 1e-9;

/// Speed on reaching a boundary `dist_m` ahead under full braking at
/// `decel_mps2`, starting from `speed_mps`.
///
/// Solves `0.5 * decel * t^2 - v * t + d = 0`. A negative discriminant means
/// the train stops short of the boundary and the result is zero. Of the two
/// roots only the smaller is physical; the larger one is the train stopping,
/// reversing and crossing the boundary a second time. The smaller root is
/// never negative since `sqrt(D) < v` whenever `d > 0`.
///
/// The result is always in `[0, speed_mps]`.
pub fn projected_speed_at_boundary(speed_mps: f64, dist_m: f64, decel_mps2: f64) -> f64 {
    let speed_mps = speed_mps.max(0.0);
    if dist_m <= 0.0 {
        return speed_mps;
    }
    let decel = decel_mps2.abs();
    let discriminant = speed_mps * speed_mps - 2.0 * decel * dist_m;
    if discriminant < 0.0 {
        return 0.0;
    }
    let t = (speed_mps - discriminant.sqrt()) / decel;
    (speed_mps - decel * t).clamp(0.0, speed_mps)
}

/// Speed after covering `dist_m` at constant `accel_mps2`, zero if the train
/// stops first
fn speed_after_dist(speed_mps: f64, accel_mps2: f64, dist_m: f64) -> f64 {
    (speed_mps * speed_mps + 2.0 * accel_mps2 * dist_m)
        .max(0.0)
        .sqrt()
}

/// Speed on reaching a boundary `dist_m` ahead when the train first runs
/// through `phases` (the committed step and any ramp before the brakes are
/// fully on) and then brakes at `decel_mps2`.
pub fn boundary_speed(phases: &[Phase], speed_mps: f64, dist_m: f64, decel_mps2: f64) -> f64 {
    let mut speed_mps = speed_mps.max(0.0);
    let mut dist_left_m = dist_m;
    for phase in phases {
        if dist_left_m <= 0.0 {
            return speed_mps;
        }
        let a = phase.accel_mps2;
        if a < 0.0 && speed_mps + a * phase.dt_s <= 0.0 {
            // comes to rest inside this phase
            let dist_to_stop_m = speed_mps * speed_mps / (-2.0 * a);
            return if dist_to_stop_m >= dist_left_m {
                speed_after_dist(speed_mps, a, dist_left_m)
            } else {
                0.0
            };
        }
        let dist_phase_m = speed_mps * phase.dt_s + 0.5 * a * phase.dt_s * phase.dt_s;
        if dist_phase_m >= dist_left_m {
            return speed_after_dist(speed_mps, a, dist_left_m);
        }
        speed_mps += a * phase.dt_s;
        dist_left_m -= dist_phase_m;
    }
    projected_speed_at_boundary(speed_mps, dist_left_m, decel_mps2)
}
