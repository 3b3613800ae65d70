//! Module containing the mode state machine: the idealized driver choosing
//! between power, cruise and brake at every step.

use std::fmt;

use crate::accel::{AccelModel, Ramp};
use crate::imports::*;
use crate::lookahead::{boundary_speed, Phase};
use crate::params::DriverParams;

/// Driving mode
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Power,
    #[default]
    Cruise,
    Brake,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Power => "Power",
            Mode::Cruise => "Cruise",
            Mode::Brake => "Brake",
        };
        write!(f, "{name}")
    }
}

/// What the driver can see of the track ahead
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    /// Distance to the end of the current section, $m$
    pub dist_to_boundary_m: f64,
    /// Limit of the next section, zero at end of line, $\frac{m}{s}$
    pub speed_limit_next_mps: f64,
    /// Highest speed currently allowed, $\frac{m}{s}$
    pub max_safe_mps: f64,
}

impl Approach {
    pub fn is_end_of_line(&self) -> bool {
        self.speed_limit_next_mps <= 0.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Driver {
    pub params: DriverParams,
    pub accel: AccelModel,
}

impl Driver {
    pub fn new(params: DriverParams) -> Self {
        let accel = AccelModel::from_params(&params);
        Self { params, accel }
    }

    /// Highest speed allowed at `offset_m` into a section. The tail of the
    /// train is still in the previous section until it has covered one train
    /// length.
    pub fn max_safe_speed(
        &self,
        offset_m: f64,
        speed_limit_curr_mps: f64,
        speed_limit_prev_mps: f64,
    ) -> f64 {
        let tail_limit_mps = if offset_m < self.params.train_length_m {
            speed_limit_prev_mps
        } else {
            self.params.line_speed_mps
        };
        speed_limit_curr_mps.min(tail_limit_mps)
    }

    /// Speed to be at or below on reaching the next boundary. Limits within
    /// twice the leeway of a standstill are approached at half the limit.
    pub fn target_speed(&self, speed_limit_next_mps: f64) -> f64 {
        if speed_limit_next_mps <= 0.0 {
            0.0
        } else {
            (speed_limit_next_mps - self.params.leeway_mps).max(0.5 * speed_limit_next_mps)
        }
    }

    /// Lowest speed braking sheds down to ahead of a slower section, zero
    /// into end of line
    fn brake_floor(&self, approach: &Approach) -> f64 {
        self.target_speed(approach.speed_limit_next_mps)
    }

    /// Lowest speed the brakes releasing shed down to. On the last section
    /// the train keeps rolling at the target for its own limit.
    fn release_floor(&self, approach: &Approach) -> f64 {
        if approach.is_end_of_line() {
            self.target_speed(approach.max_safe_mps)
        } else {
            self.brake_floor(approach)
        }
    }

    /// Next step in `mode` as the train will actually take it. Power stops at
    /// the max safe speed, braking and releasing stop at their floor, and
    /// braking into end of line eases to halt exactly there.
    pub fn step_phase(&self, ramp: &Ramp, mode: Mode, speed_mps: f64, approach: &Approach) -> Phase {
        self.step_phases(ramp, mode, speed_mps, approach).0
    }

    /// [Driver::step_phase] followed by the rest of the step held at the
    /// limit it stopped at, if any
    fn step_phases(
        &self,
        ramp: &Ramp,
        mode: Mode,
        speed_mps: f64,
        approach: &Approach,
    ) -> (Phase, Option<Phase>) {
        let phase = self.accel.step_phase(ramp, mode, speed_mps);
        match mode {
            Mode::Brake if approach.is_end_of_line() => (
                Phase::new(
                    phase.dt_s,
                    -self
                        .accel
                        .stopping_decel(speed_mps, approach.dist_to_boundary_m)
                        .min(-phase.accel_mps2),
                ),
                None,
            ),
            Mode::Brake => phase.bounded(speed_mps, self.brake_floor(approach), approach.max_safe_mps),
            _ => phase.bounded(speed_mps, self.release_floor(approach), approach.max_safe_mps),
        }
    }

    /// Phases the train is committed to if it takes one step in `candidate`
    /// and then backs off to full braking as quickly as the ramps allow
    fn plan(&self, ramp: &Ramp, speed_mps: f64, approach: &Approach, candidate: Mode) -> Vec<Phase> {
        let ramp_time_s = self.params.ramp_time_s;
        let floor_mps = self.brake_floor(approach);
        let ceiling_mps = approach.max_safe_mps;
        let mut phases = Vec::with_capacity(6);
        let mut speed_mps = push_phases(
            &mut phases,
            speed_mps,
            self.step_phases(ramp, candidate, speed_mps, approach),
        );
        let backing_off: &[(Mode, Mode)] = match candidate {
            Mode::Brake => &[],
            Mode::Cruise => &[(Mode::Cruise, Mode::Brake)],
            Mode::Power => &[(Mode::Power, Mode::Cruise), (Mode::Cruise, Mode::Brake)],
        };
        for &(from, to) in backing_off {
            let ramp_phase = Phase::new(ramp_time_s, self.accel.blended_accel(from, to, speed_mps));
            speed_mps = push_phases(
                &mut phases,
                speed_mps,
                ramp_phase.bounded(speed_mps, floor_mps, ceiling_mps),
            );
        }
        phases
    }

    /// Whether committing to `candidate` for the next step still lets the
    /// train brake down to the target speed before the next boundary
    pub fn is_safe(&self, ramp: &Ramp, speed_mps: f64, approach: &Approach, candidate: Mode) -> bool {
        let phases = self.plan(ramp, speed_mps, approach, candidate);
        let speed_at_boundary_mps = boundary_speed(
            &phases,
            speed_mps,
            approach.dist_to_boundary_m,
            self.params.accel_max_mps2,
        );
        speed_at_boundary_mps <= self.target_speed(approach.speed_limit_next_mps) + self.params.speed_tol_mps
    }

    /// Speed after a step of power followed by the ramp back to cruise
    fn speed_after_power_mps(&self, ramp: &Ramp, speed_mps: f64) -> f64 {
        let speed_mps = self
            .accel
            .step_phase(ramp, Mode::Power, speed_mps)
            .end_speed(speed_mps);
        speed_mps
            + self.params.ramp_time_s
                * self.accel.blended_accel(Mode::Power, Mode::Cruise, speed_mps)
    }

    /// Mode for the next step, in priority order:
    /// 1. when braking, keep braking into end of line, otherwise release once
    ///    the target is within what releasing the brakes sheds (and the speed
    ///    is already legal beyond the boundary) or cruising is safe
    /// 2. above the target with cruising unsafe, brake, easing off to cruise
    ///    for one step first when powering
    /// 3. below max safe speed, power when it is safe, the dwell margin allows
    ///    and the ramp back to cruise stays under max safe speed. A standing
    ///    train always gets going, its power is eased onto max safe speed.
    /// 4. otherwise cruise
    pub fn decide_mode(&self, ramp: &Ramp, speed_mps: f64, approach: &Approach) -> Mode {
        let mode = ramp.mode;
        let target_mps = self.target_speed(approach.speed_limit_next_mps);

        if mode == Mode::Brake {
            if approach.is_end_of_line() {
                return Mode::Brake;
            }
            let release_mps = (target_mps + self.params.brake_ramp_allowance_mps())
                .min(approach.speed_limit_next_mps);
            if speed_mps <= release_mps || self.is_safe(ramp, speed_mps, approach, Mode::Cruise) {
                return Mode::Cruise;
            }
            return Mode::Brake;
        }

        if speed_mps > target_mps && !self.is_safe(ramp, speed_mps, approach, Mode::Cruise) {
            return match mode {
                Mode::Power => Mode::Cruise,
                _ => Mode::Brake,
            };
        }

        if speed_mps < approach.max_safe_mps {
            let standing = speed_mps <= 0.0;
            let dwell_allows = mode == Mode::Power
                || standing
                || approach.max_safe_mps - speed_mps > self.params.power_dwell_margin_mps;
            let fits = standing
                || self.speed_after_power_mps(ramp, speed_mps)
                    <= approach.max_safe_mps + self.params.speed_tol_mps;
            if dwell_allows && fits && self.is_safe(ramp, speed_mps, approach, Mode::Power) {
                return Mode::Power;
            }
        }

        Mode::Cruise
    }
}

/// Appends a bounded phase and returns the speed it ends at
fn push_phases(phases: &mut Vec<Phase>, speed_mps: f64, (first, hold): (Phase, Option<Phase>)) -> f64 {
    phases.push(first);
    phases.extend(hold);
    first.end_speed(speed_mps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::kmh_to_mps;

    fn driver() -> Driver {
        Driver::new(DriverParams::default())
    }

    fn settled(mode: Mode) -> Ramp {
        Ramp::settled(mode, DriverParams::default().ramp_time_s)
    }

    fn open_line(speed_limit_mps: f64) -> Approach {
        Approach {
            dist_to_boundary_m: 10_000.0,
            speed_limit_next_mps: speed_limit_mps,
            max_safe_mps: speed_limit_mps,
        }
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Power.to_string(), "Power");
        assert_eq!(Mode::Cruise.to_string(), "Cruise");
        assert_eq!(Mode::Brake.to_string(), "Brake");
        assert_eq!(Mode::default(), Mode::Cruise);
    }

    #[test]
    fn test_max_safe_speed_holds_previous_limit_for_train_length() {
        let driver = driver();
        let slow = kmh_to_mps(60.0);
        let fast = kmh_to_mps(200.0);
        assert_eq!(driver.max_safe_speed(0.0, fast, slow), slow);
        assert_eq!(driver.max_safe_speed(263.9, fast, slow), slow);
        assert_eq!(driver.max_safe_speed(264.0, fast, slow), fast);
        // entering a slower section the new limit applies at once
        assert_eq!(driver.max_safe_speed(0.0, slow, fast), slow);
    }

    #[test]
    fn test_target_speed() {
        let driver = driver();
        assert_eq!(driver.target_speed(0.0), 0.0);
        assert_eq!(driver.target_speed(10.0), 9.0);
        // slow limits are approached at half speed, never at a standstill
        assert_eq!(driver.target_speed(0.5), 0.25);
        assert_eq!(driver.target_speed(2.0), 1.0);
    }

    #[test]
    fn test_standing_start_powers() {
        let driver = driver();
        let approach = open_line(kmh_to_mps(80.0));
        assert_eq!(driver.decide_mode(&settled(Mode::Cruise), 0.0, &approach), Mode::Power);
    }

    #[test]
    fn test_standing_start_below_ramp_speed() {
        let driver = driver();
        for kmh in [1.0, 3.0, 5.0, 6.0] {
            let approach = open_line(kmh_to_mps(kmh));
            let ramp = settled(Mode::Cruise);
            assert_eq!(driver.decide_mode(&ramp, 0.0, &approach), Mode::Power, "{kmh} km/h");
            // the power ramp is eased so it tops out on the limit
            let mut powering = ramp;
            powering.begin(Mode::Power);
            let phase = driver.step_phase(&powering, Mode::Power, 0.0, &approach);
            assert!(phase.accel_mps2 > 0.0);
            assert!(phase.end_speed(0.0) <= approach.max_safe_mps + 1e-12);
        }
    }

    #[test]
    fn test_dwell_margin() {
        let driver = driver();
        let approach = open_line(kmh_to_mps(120.0));
        let near = approach.max_safe_mps - 5.0;
        let far = approach.max_safe_mps - 10.0;
        assert_eq!(driver.decide_mode(&settled(Mode::Cruise), near, &approach), Mode::Cruise);
        assert_eq!(driver.decide_mode(&settled(Mode::Cruise), far, &approach), Mode::Power);
        // already powering keeps powering inside the margin
        assert_eq!(driver.decide_mode(&settled(Mode::Power), near, &approach), Mode::Power);
    }

    #[test]
    fn test_power_stops_short_of_max_safe_speed() {
        let driver = driver();
        let approach = open_line(kmh_to_mps(120.0));
        let speed = approach.max_safe_mps - 1.0;
        assert_eq!(driver.decide_mode(&settled(Mode::Power), speed, &approach), Mode::Cruise);
        assert_eq!(
            driver.decide_mode(&settled(Mode::Cruise), approach.max_safe_mps, &approach),
            Mode::Cruise
        );
    }

    #[test]
    fn test_brakes_for_slower_section_ahead() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 100.0,
            speed_limit_next_mps: kmh_to_mps(40.0),
            max_safe_mps: kmh_to_mps(120.0),
        };
        let speed = kmh_to_mps(120.0);
        assert!(!driver.is_safe(&settled(Mode::Cruise), speed, &approach, Mode::Cruise));
        assert_eq!(driver.decide_mode(&settled(Mode::Cruise), speed, &approach), Mode::Brake);
        // from power ease off to cruise first
        assert_eq!(driver.decide_mode(&settled(Mode::Power), speed, &approach), Mode::Cruise);
        assert_eq!(driver.decide_mode(&settled(Mode::Brake), speed, &approach), Mode::Brake);
    }

    #[test]
    fn test_keeps_braking_into_end_of_line() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 5.0,
            speed_limit_next_mps: 0.0,
            max_safe_mps: kmh_to_mps(80.0),
        };
        assert!(approach.is_end_of_line());
        assert_eq!(driver.decide_mode(&settled(Mode::Brake), 0.5, &approach), Mode::Brake);
    }

    #[test]
    fn test_releases_brakes_near_target() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 500.0,
            speed_limit_next_mps: kmh_to_mps(40.0),
            max_safe_mps: kmh_to_mps(120.0),
        };
        let target = driver.target_speed(approach.speed_limit_next_mps);
        assert_eq!(
            driver.decide_mode(&settled(Mode::Brake), target + 0.5, &approach),
            Mode::Cruise
        );
    }

    #[test]
    fn test_release_lands_on_target() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 5.0,
            speed_limit_next_mps: kmh_to_mps(40.0),
            max_safe_mps: kmh_to_mps(120.0),
        };
        let target = driver.target_speed(approach.speed_limit_next_mps);
        let mut ramp = settled(Mode::Brake);
        assert_eq!(driver.decide_mode(&ramp, target + 0.1, &approach), Mode::Cruise);
        ramp.begin(Mode::Cruise);
        let release = driver.step_phase(&ramp, Mode::Cruise, target + 0.1, &approach);
        assert_approx_eq!(release.end_speed(target + 0.1), target, 1e-12);
    }

    #[test]
    fn test_holds_brakes_above_very_slow_limit() {
        let driver = driver();
        // 1 km/h ahead, releasing at 0.54 m/s would still be too fast on
        // reaching the boundary
        let approach = Approach {
            dist_to_boundary_m: 0.3,
            speed_limit_next_mps: kmh_to_mps(1.0),
            max_safe_mps: kmh_to_mps(5.0),
        };
        let ramp = settled(Mode::Brake);
        assert_eq!(driver.decide_mode(&ramp, 0.54, &approach), Mode::Brake);
        let braking = driver.step_phase(&ramp, Mode::Brake, 0.54, &approach);
        assert_approx_eq!(
            braking.end_speed(0.54),
            driver.target_speed(kmh_to_mps(1.0)),
            1e-12
        );
    }

    #[test]
    fn test_end_of_line_trim_applies_during_brake_ramp() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 0.3,
            speed_limit_next_mps: 0.0,
            max_safe_mps: kmh_to_mps(5.0),
        };
        let mut ramp = settled(Mode::Cruise);
        ramp.begin(Mode::Brake);
        let phase = driver.step_phase(&ramp, Mode::Brake, 0.4, &approach);
        // 0.4 m/s over 0.3 m needs 0.267 m/s^2, gentler than the ramp
        assert_approx_eq!(phase.accel_mps2, -0.4 * 0.4 / 0.6, 1e-12);
    }

    #[test]
    fn test_power_unsafe_close_to_slow_section() {
        let driver = driver();
        let approach = Approach {
            dist_to_boundary_m: 60.0,
            speed_limit_next_mps: kmh_to_mps(40.0),
            max_safe_mps: kmh_to_mps(120.0),
        };
        let speed = kmh_to_mps(40.0);
        assert!(!driver.is_safe(&settled(Mode::Cruise), speed, &approach, Mode::Power));
        assert_ne!(driver.decide_mode(&settled(Mode::Cruise), speed, &approach), Mode::Power);
    }
}
