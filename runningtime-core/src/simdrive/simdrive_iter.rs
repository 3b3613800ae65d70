//! Module containing batch running of independent simulations, in parallel or
//! serially
use super::{RunSummary, SimDrive};
use crate::imports::*;
use rayon::prelude::*;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct SimDriveVec(pub Vec<SimDrive>);

impl SimDriveVec {
    /// Calls `walk` method for each simdrive instance in vec.
    /// # Arguments:
    /// * parallelize: whether to parallelize `walk` calls, defaults to `true`
    pub fn sim_drive(&mut self, parallelize: Option<bool>) -> anyhow::Result<()> {
        let parallelize = parallelize.unwrap_or(true);
        if parallelize {
            self.0.par_iter_mut().enumerate().try_for_each(|(i, sd)| {
                sd.walk().with_context(|| format!("simdrive idx: {}", i))
            })?;
        } else {
            self.0.iter_mut().enumerate().try_for_each(|(i, sd)| {
                sd.walk().with_context(|| format!("simdrive idx: {}", i))
            })?;
        }
        Ok(())
    }

    /// Summaries of every run, in order
    pub fn summaries(self) -> anyhow::Result<Vec<RunSummary>> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(i, sd)| {
                sd.into_summary()
                    .with_context(|| format!("simdrive idx: {}", i))
            })
            .collect()
    }

    pub fn push(&mut self, sd: SimDrive) {
        self.0.push(sd);
    }

    pub fn pop(&mut self) -> Option<SimDrive> {
        self.0.pop()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl SerdeAPI for SimDriveVec {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{kmh_to_mps, DriverParams};
    use crate::track::Track;

    fn batch() -> SimDriveVec {
        let params = DriverParams::default();
        let mut sdv = SimDriveVec::default();
        for kmh in [40.0, 80.0, 120.0, 160.0] {
            let track = Track::from_kmh(&[(4000.0, Some(kmh))], params.line_speed_mps);
            sdv.push(SimDrive::new(track, params.clone()));
        }
        sdv
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut parallel = batch();
        parallel.sim_drive(None).unwrap();
        let mut serial = batch();
        serial.sim_drive(Some(false)).unwrap();
        assert_eq!(parallel, serial);
    }

    #[test]
    fn test_faster_limits_finish_sooner() {
        let mut sdv = batch();
        sdv.sim_drive(Some(true)).unwrap();
        let times: Vec<f64> = sdv
            .summaries()
            .unwrap()
            .iter()
            .map(|s| s.outcome.time_s())
            .collect();
        assert_eq!(times.len(), 4);
        assert!(times.windows(2).all(|w| w[1] < w[0]), "{times:?}");
        assert!(times[0] > 4000.0 / kmh_to_mps(40.0));
    }

    #[test]
    fn test_unrun_batch_has_no_summaries() {
        assert!(batch().summaries().is_err());
    }
}
