//! Module containing driver and train parameters.

use crate::imports::*;
#[cfg(feature = "validation")]
use validator::Validate;

/// Unit conversions that should NEVER change
pub const KMH_PER_MPS: f64 = 3.6;

/// Speed limit assumed for a section entered without one, $\frac{km}{h}$
pub const DEFAULT_SPEED_LIMIT_KMH: f64 = 400.0;

pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh / KMH_PER_MPS
}

pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * KMH_PER_MPS
}

/// Parameters of the idealized driver and the train it drives.
///
/// `power_dwell_margin_mps` and the one-step back-off from power to cruise
/// before braking are empirically tuned; treat them as knobs, not physics.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "validation", derive(Validate))]
#[serde(default)]
pub struct DriverParams {
    /// Maximum speed on straight track, used as "no restriction", $\frac{m}{s}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub line_speed_mps: f64,
    /// Train length, $m$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub train_length_m: f64,
    /// Aim to be this far below a speed limit when reaching it, $\frac{m}{s}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub leeway_mps: f64,
    /// Full power and full brake acceleration magnitude, $\frac{m}{s^2}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub accel_max_mps2: f64,
    /// Speed above which available power falls off towards zero at line speed, $\frac{m}{s}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub power_curve_speed_mps: f64,
    /// Do not start powering within this margin of the max safe speed, $\frac{m}{s}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub power_dwell_margin_mps: f64,
    /// Time for power or brake effort to build up after a mode change, $s$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub ramp_time_s: f64,
    /// Nominal time step, $s$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub step_s: f64,
    /// Tolerance on speed comparisons, $\frac{m}{s}$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub speed_tol_mps: f64,
    /// Tolerance on position comparisons, $m$
    #[cfg_attr(feature = "validation", validate(range(min = 0)))]
    pub dist_tol_m: f64,
    /// Bail after this many iterations; `None` runs until halt or derailment
    pub max_steps: Option<usize>,
    /// Record [SimState](crate::simdrive::SimState) every `save_interval` iterations
    pub save_interval: Option<usize>,
}

impl Default for DriverParams {
    fn default() -> Self {
        Self {
            line_speed_mps: kmh_to_mps(DEFAULT_SPEED_LIMIT_KMH),
            train_length_m: 264.0,
            leeway_mps: 1.0,
            accel_max_mps2: 0.85,
            power_curve_speed_mps: kmh_to_mps(200.0),
            power_dwell_margin_mps: 8.5,
            ramp_time_s: 2.0,
            step_s: 1.0,
            speed_tol_mps: 1e-6,
            dist_tol_m: 1e-6,
            max_steps: None,
            save_interval: None,
        }
    }
}

impl DriverParams {
    /// Speed shed while fully applied brakes release over one ramp, $\frac{m}{s}$
    pub fn brake_ramp_allowance_mps(&self) -> f64 {
        0.5 * self.accel_max_mps2 * self.ramp_time_s
    }

    /// Checks the relationships between fields that range checks cannot express
    pub fn check_derived(&self) -> anyhow::Result<()> {
        ensure!(
            self.accel_max_mps2 > 0.0,
            format_dbg!(self.accel_max_mps2 > 0.0)
        );
        ensure!(self.step_s > 0.0, format_dbg!(self.step_s > 0.0));
        ensure!(
            self.power_curve_speed_mps < self.line_speed_mps,
            "power curve speed ({} m/s) must be below line speed ({} m/s)",
            self.power_curve_speed_mps,
            self.line_speed_mps
        );
        Ok(())
    }
}

impl SerdeAPI for DriverParams {
    fn init(&mut self) -> anyhow::Result<()> {
        #[cfg(feature = "validation")]
        if let Err(e) = self.validate() {
            bail!(e)
        }
        self.check_derived()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let params = DriverParams::default();
        let yaml = params.to_yaml().unwrap();
        assert_eq!(DriverParams::from_yaml(yaml).unwrap(), params);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let params = DriverParams::from_yaml("leeway_mps: 2.5\nmax_steps: 100\n").unwrap();
        assert_eq!(params.leeway_mps, 2.5);
        assert_eq!(params.max_steps, Some(100));
        assert_eq!(params.train_length_m, DriverParams::default().train_length_m);
    }

    #[test]
    #[cfg(feature = "validation")]
    fn test_negative_values_are_rejected() {
        let err = DriverParams::from_yaml("train_length_m: -1.0\n").unwrap_err();
        let validation_errs = err.downcast::<validator::ValidationErrors>().unwrap();
        assert!(validation_errs.errors().contains_key("train_length_m"));
    }

    #[test]
    fn test_power_curve_above_line_speed_is_rejected() {
        assert!(DriverParams::from_json(r#"{"power_curve_speed_mps": 200.0}"#).is_err());
    }

    #[test]
    fn test_unit_conversion() {
        assert_approx_eq!(kmh_to_mps(36.0), 10.0);
        assert_approx_eq!(mps_to_kmh(kmh_to_mps(123.0)), 123.0);
    }
}
