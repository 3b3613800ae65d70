//! Module containing the driver loop: integration of each step, section
//! crossings, derailment and halt.

use std::fmt;

use crate::accel::Ramp;
use crate::driver::{Approach, Driver, Mode};
use crate::imports::*;
use crate::lookahead::Phase;
use crate::params::{mps_to_kmh, DriverParams};
use crate::track::{Track, TrackCursor};

pub mod simdrive_iter;
pub use simdrive_iter::SimDriveVec;

/// Everything that changes from one step to the next
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimState {
    /// iteration counter
    pub i: usize,
    /// Elapsed time, $s$
    pub time_s: f64,
    /// Position within the current section, $m$
    pub offset_m: f64,
    /// Total distance travelled, $m$
    pub dist_m: f64,
    /// $\frac{m}{s}$
    pub speed_mps: f64,
    pub ramp: Ramp,
    pub cursor: TrackCursor,
    /// Limit of the section behind the current one, $\frac{m}{s}$
    pub speed_limit_prev_mps: f64,
}

impl SimState {
    /// At rest at the start of the first section, cruising with no effort
    /// building up, as if the track behind were open line
    pub fn new(params: &DriverParams) -> Self {
        Self {
            i: 0,
            time_s: 0.0,
            offset_m: 0.0,
            dist_m: 0.0,
            speed_mps: 0.0,
            ramp: Ramp::settled(Mode::Cruise, params.ramp_time_s),
            cursor: TrackCursor::default(),
            speed_limit_prev_mps: params.line_speed_mps,
        }
    }

    pub fn mode(&self) -> Mode {
        self.ramp.mode
    }
}

/// Things a driver would call out
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Event {
    ModeChanged {
        time_s: f64,
        mode: Mode,
    },
    SectionEntered {
        time_s: f64,
        length_m: f64,
        speed_limit_mps: f64,
    },
    Derailed {
        time_s: f64,
        speed_mps: f64,
        limit_mps: f64,
    },
    Halted {
        time_s: f64,
        end_of_line: bool,
        /// Track left ahead of the train, $m$
        short_of_end_m: f64,
    },
}

impl Event {
    pub fn time_s(&self) -> f64 {
        match self {
            Event::ModeChanged { time_s, .. }
            | Event::SectionEntered { time_s, .. }
            | Event::Derailed { time_s, .. }
            | Event::Halted { time_s, .. } => *time_s,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}s: ", self.time_s())?;
        match self {
            Event::ModeChanged { mode, .. } => write!(f, "{mode}"),
            Event::SectionEntered {
                length_m,
                speed_limit_mps,
                ..
            } => write!(
                f,
                "next section {length_m}m @ {:.0}km/h",
                mps_to_kmh(*speed_limit_mps)
            ),
            Event::Derailed {
                speed_mps,
                limit_mps,
                ..
            } => write!(
                f,
                "Derailed! {:.1}km/h through {:.0}km/h curve",
                mps_to_kmh(*speed_mps),
                mps_to_kmh(*limit_mps)
            ),
            Event::Halted {
                end_of_line: true, ..
            } => write!(f, "Halt at end of line"),
            Event::Halted { short_of_end_m, .. } => {
                write!(f, "Halt {short_of_end_m:.1}m short of end of line")
            }
        }
    }
}

/// How a run ended
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Came to rest at the end of line
    Completed { time_s: f64, dist_m: f64 },
    Derailed {
        time_s: f64,
        speed_mps: f64,
        limit_mps: f64,
        section_idx: usize,
    },
    /// Came to rest, or could not get going, with track still ahead
    Stalled {
        time_s: f64,
        dist_m: f64,
        short_of_end_m: f64,
    },
}

impl Outcome {
    pub fn time_s(&self) -> f64 {
        match self {
            Outcome::Completed { time_s, .. }
            | Outcome::Derailed { time_s, .. }
            | Outcome::Stalled { time_s, .. } => *time_s,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }

    pub fn is_derailed(&self) -> bool {
        matches!(self, Outcome::Derailed { .. })
    }
}

/// Result of [simulate]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub events: Vec<Event>,
    /// States recorded every [DriverParams::save_interval] iterations
    pub history: Vec<SimState>,
}

impl SerdeAPI for RunSummary {}

/// Simulates the driver taking a train over `track`, from rest at the start
/// to rest at the end or a derailment
pub fn simulate(track: &Track, params: &DriverParams) -> anyhow::Result<RunSummary> {
    let mut sd = SimDrive::new(track.clone(), params.clone());
    sd.walk()?;
    sd.into_summary()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimDrive {
    pub track: Track,
    pub driver: Driver,
    pub state: SimState,
    pub events: Vec<Event>,
    pub history: Vec<SimState>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

impl SerdeAPI for SimDrive {
    fn init(&mut self) -> anyhow::Result<()> {
        self.driver
            .params
            .init()
            .with_context(|| anyhow!(format_dbg!()))?;
        self.driver = Driver::new(self.driver.params.clone());
        self.track.init().with_context(|| anyhow!(format_dbg!()))?;
        self.track = self.track.clone().clamped(self.driver.params.line_speed_mps);
        Ok(())
    }
}

impl SimDrive {
    /// Limits in `track` above the line speed in `params` are clamped
    pub fn new(track: Track, params: DriverParams) -> Self {
        let track = track.clamped(params.line_speed_mps);
        Self {
            track,
            state: SimState::new(&params),
            driver: Driver::new(params),
            events: Vec::new(),
            history: Vec::new(),
            outcome: None,
        }
    }

    pub fn params(&self) -> &DriverParams {
        &self.driver.params
    }

    /// Returns to rest at the start of the track, clearing results
    pub fn reset(&mut self) {
        self.state = SimState::new(&self.driver.params);
        self.events.clear();
        self.history.clear();
        self.outcome = None;
    }

    /// Runs the simulation from the start of the track until the train halts
    /// or derails
    pub fn walk(&mut self) -> anyhow::Result<()> {
        self.reset();
        self.save_state();
        loop {
            if let Some(max_steps) = self.driver.params.max_steps {
                ensure!(
                    self.state.i < max_steps,
                    "{}\nno halt or derailment after {} steps",
                    format_dbg!(self.state.time_s),
                    max_steps
                );
            }
            let outcome = self
                .solve_step()
                .with_context(|| format!("{}\ntime step: {}", format_dbg!(), self.state.i))?;
            self.step();
            if let Some(outcome) = outcome {
                self.save_final_state();
                self.outcome = Some(outcome);
                return Ok(());
            }
            self.save_state();
        }
    }

    pub fn into_summary(self) -> anyhow::Result<RunSummary> {
        let outcome = self
            .outcome
            .ok_or_else(|| anyhow!("{}\nsimulation has not been run", format_dbg!()))?;
        Ok(RunSummary {
            outcome,
            events: self.events,
            history: self.history,
        })
    }

    /// Increments the iteration counter
    pub fn step(&mut self) {
        self.state.i += 1;
    }

    fn save_state(&mut self) {
        if let Some(interval) = self.driver.params.save_interval {
            if self.state.i % interval == 0 {
                self.history.push(self.state.clone());
            }
        }
    }

    /// Ensures the last recorded state is the one the run ended in
    fn save_final_state(&mut self) {
        if self.driver.params.save_interval.is_some()
            && self.history.last().map(|s| s.i) != Some(self.state.i)
        {
            self.history.push(self.state.clone());
        }
    }

    /// One iteration of the driver loop: check limits, choose a mode, then
    /// move. Returns the outcome once the run is over.
    pub fn solve_step(&mut self) -> anyhow::Result<Option<Outcome>> {
        let section = *self.state.cursor.current(&self.track);
        let max_safe_mps = self.driver.max_safe_speed(
            self.state.offset_m,
            section.speed_limit_mps,
            self.state.speed_limit_prev_mps,
        );
        if self.state.speed_mps > max_safe_mps + self.driver.params.speed_tol_mps {
            return Ok(Some(self.derail(max_safe_mps)));
        }
        let speed_limit_next_mps = match self.state.cursor.peek_next(&self.track) {
            Some(next) => next.speed_limit_mps,
            None => return Ok(Some(self.halt())),
        };
        let approach = Approach {
            dist_to_boundary_m: section.length_m - self.state.offset_m,
            speed_limit_next_mps,
            max_safe_mps,
        };

        let mode = self
            .driver
            .decide_mode(&self.state.ramp, self.state.speed_mps, &approach);
        if mode != self.state.mode() {
            log::debug!(
                "{:.2}s: {} -> {} at {:.2} m/s",
                self.state.time_s,
                self.state.mode(),
                mode,
                self.state.speed_mps
            );
            self.state.ramp.begin(mode);
            self.events.push(Event::ModeChanged {
                time_s: self.state.time_s,
                mode,
            });
        }

        let phase = self.driver.step_phase(
            &self.state.ramp,
            self.state.ramp.mode,
            self.state.speed_mps,
            &approach,
        );
        if self.state.speed_mps <= 0.0 && phase.accel_mps2 <= 0.0 {
            // nothing left that would move the train
            return Ok(Some(self.halt()));
        }
        self.integrate(phase, section.length_m, section.speed_limit_mps)
    }

    /// Applies `phase` to the state, cutting it short at the section boundary
    /// or where the train comes to rest
    fn integrate(
        &mut self,
        phase: Phase,
        section_length_m: f64,
        section_limit_mps: f64,
    ) -> anyhow::Result<Option<Outcome>> {
        let speed_mps = self.state.speed_mps;
        let accel_mps2 = phase.accel_mps2;
        let mut dt_s = phase.dt_s;
        let halted = accel_mps2 < 0.0 && speed_mps + accel_mps2 * dt_s <= 0.0;
        if halted {
            dt_s = -speed_mps / accel_mps2;
        }
        let dist_step_m = speed_mps * dt_s + 0.5 * accel_mps2 * dt_s * dt_s;
        let dist_left_m = section_length_m - self.state.offset_m;

        if dist_step_m > dist_left_m {
            let dt_cross_s = dt_s * dist_left_m / dist_step_m;
            self.state.time_s += dt_cross_s;
            self.state.speed_mps = (speed_mps + accel_mps2 * dt_cross_s).max(0.0);
            self.state.dist_m += dist_left_m;
            self.state.offset_m = 0.0;
            self.state.ramp.advance(dt_cross_s);
            self.state.speed_limit_prev_mps = section_limit_mps;
            self.state
                .cursor
                .advance(&self.track)
                .with_context(|| format_dbg!(self.state.cursor))?;
            let entered = *self.state.cursor.current(&self.track);
            if !entered.is_sentinel() {
                log::debug!(
                    "{:.2}s: entered section {} at {:.2} m/s",
                    self.state.time_s,
                    self.state.cursor.idx(),
                    self.state.speed_mps
                );
                self.events.push(Event::SectionEntered {
                    time_s: self.state.time_s,
                    length_m: entered.length_m,
                    speed_limit_mps: entered.speed_limit_mps,
                });
            }
            return Ok(None);
        }

        self.state.time_s += dt_s;
        self.state.offset_m += dist_step_m;
        self.state.dist_m += dist_step_m;
        self.state.speed_mps = speed_mps + accel_mps2 * dt_s;
        self.state.ramp.advance(dt_s);
        if halted {
            self.state.speed_mps = 0.0;
            return Ok(Some(self.halt()));
        }
        Ok(None)
    }

    /// Track left between the train and the end of line, $m$
    fn dist_to_end_m(&self) -> f64 {
        let idx = self.state.cursor.idx();
        self.track.sections()[idx..]
            .iter()
            .map(|s| s.length_m)
            .sum::<f64>()
            - self.state.offset_m
    }

    fn halt(&mut self) -> Outcome {
        self.state.speed_mps = 0.0;
        // stopping within tolerance of the end counts as reaching it
        let at_last_section = self
            .state
            .cursor
            .peek_next(&self.track)
            .map_or(false, |next| next.is_sentinel());
        let dist_to_end_m = self.dist_to_end_m();
        if at_last_section && dist_to_end_m <= self.driver.params.dist_tol_m {
            let section_limit_mps = self.state.cursor.current(&self.track).speed_limit_mps;
            if self.state.cursor.advance(&self.track).is_ok() {
                self.state.dist_m += dist_to_end_m;
                self.state.offset_m = 0.0;
                self.state.speed_limit_prev_mps = section_limit_mps;
            }
        }
        let end_of_line = self.state.cursor.at_sentinel(&self.track);
        let short_of_end_m = if end_of_line {
            0.0
        } else {
            self.dist_to_end_m().max(0.0)
        };
        if end_of_line {
            log::info!("{:.2}s: halted at end of line", self.state.time_s);
        } else {
            log::warn!(
                "{:.2}s: halted {:.1} m short of end of line",
                self.state.time_s,
                short_of_end_m
            );
        }
        self.events.push(Event::Halted {
            time_s: self.state.time_s,
            end_of_line,
            short_of_end_m,
        });
        if end_of_line {
            Outcome::Completed {
                time_s: self.state.time_s,
                dist_m: self.state.dist_m,
            }
        } else {
            Outcome::Stalled {
                time_s: self.state.time_s,
                dist_m: self.state.dist_m,
                short_of_end_m,
            }
        }
    }

    fn derail(&mut self, limit_mps: f64) -> Outcome {
        log::warn!(
            "{:.2}s: derailed at {:.2} m/s with max safe speed {:.2} m/s in section {}",
            self.state.time_s,
            self.state.speed_mps,
            limit_mps,
            self.state.cursor.idx()
        );
        self.events.push(Event::Derailed {
            time_s: self.state.time_s,
            speed_mps: self.state.speed_mps,
            limit_mps,
        });
        Outcome::Derailed {
            time_s: self.state.time_s,
            speed_mps: self.state.speed_mps,
            limit_mps,
            section_idx: self.state.cursor.idx(),
        }
    }
}
