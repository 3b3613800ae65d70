//! Module containing the track description: an ordered, immutable sequence of
//! sections terminated by a zero-length, zero-speed end-of-line sentinel.

use crate::imports::*;
use crate::params::*;
use crate::validate::*;
use itertools::Itertools;

/// A contiguous stretch of track with a fixed speed limit
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct Section {
    /// Section length, $m$
    pub length_m: f64,
    /// Speed limit, $\frac{m}{s}$
    pub speed_limit_mps: f64,
}

impl Section {
    pub const SENTINEL: Self = Self {
        length_m: 0.0,
        speed_limit_mps: 0.0,
    };

    pub fn new(length_m: f64, speed_limit_mps: f64) -> Self {
        Self {
            length_m,
            speed_limit_mps,
        }
    }

    /// Section from a user entered limit in km/h, defaulting to
    /// [DEFAULT_SPEED_LIMIT_KMH] when absent
    pub fn from_kmh(length_m: f64, speed_limit_kmh: Option<f64>) -> Self {
        Self::new(
            length_m,
            kmh_to_mps(speed_limit_kmh.unwrap_or(DEFAULT_SPEED_LIMIT_KMH)),
        )
    }

    pub fn is_sentinel(&self) -> bool {
        self.length_m == 0.0 && self.speed_limit_mps == 0.0
    }
}

impl ObjState for Section {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        chk_num_gez_fin(&mut errors, self.length_m, "Length");
        chk_num_gez_fin(&mut errors, self.speed_limit_mps, "Speed limit");
        errors.make_err()
    }
}

/// Row of a track CSV file, in the units a person would type
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
struct TrackRow {
    length_m: f64,
    speed_limit_kmh: Option<f64>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackError {
    #[error("track exhausted: cannot advance past end-of-line sentinel at section {idx}")]
    Exhausted { idx: usize },
}

/// Ordered sections, always ending with exactly one [Section::SENTINEL]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    sections: Vec<Section>,
}

impl Default for Track {
    fn default() -> Self {
        Self::new(vec![])
    }
}

impl Track {
    /// Builds a track from real sections, appending the sentinel
    pub fn new(sections: Vec<Section>) -> Self {
        let mut track = Self { sections };
        track.push_sentinel();
        track
    }

    /// Builds a track from `(length in m, speed limit in km/h)` pairs, clamping
    /// each limit to `line_speed_mps`
    pub fn from_kmh(pairs: &[(f64, Option<f64>)], line_speed_mps: f64) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(length_m, limit_kmh)| Section::from_kmh(length_m, limit_kmh))
                .collect(),
        )
        .clamped(line_speed_mps)
    }

    fn push_sentinel(&mut self) {
        while self.sections.last().map_or(false, Section::is_sentinel) {
            self.sections.pop();
        }
        self.sections.push(Section::SENTINEL);
    }

    /// Copy of the track with every limit clamped to `line_speed_mps`
    pub fn clamped(mut self, line_speed_mps: f64) -> Self {
        for section in self.sections.iter_mut() {
            section.speed_limit_mps = section.speed_limit_mps.min(line_speed_mps);
        }
        self
    }

    /// All sections including the trailing sentinel
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sections as entered, without the sentinel
    pub fn real_sections(&self) -> &[Section] {
        &self.sections[..self.sections.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True when there is nothing but the sentinel
    pub fn is_empty(&self) -> bool {
        self.sections.len() <= 1
    }

    /// Total length of track, $m$
    pub fn length_m(&self) -> f64 {
        self.sections.iter().map(|s| s.length_m).sum()
    }

    /// Load track from CSV string with columns `length_m,speed_limit_kmh`
    pub fn from_csv_str<S: AsRef<str>>(csv_str: S) -> anyhow::Result<Self> {
        Self::from_reader(csv_str.as_ref().as_bytes(), "csv")
    }

    /// Write (serialize) track to a CSV string
    pub fn to_csv(&self) -> anyhow::Result<String> {
        let mut buf = Vec::with_capacity(self.len());
        self.to_writer(&mut buf, "csv")?;
        Ok(String::from_utf8(buf)?)
    }

    /// Upfront check of the documented preconditions that the simulation
    /// otherwise only discovers as a derailment:
    /// - every real section is longer than the train
    /// - full braking from a section's limit reaches the next section's limit
    ///   within the section
    /// - no limit is above line speed
    pub fn check_preconditions(&self, params: &DriverParams) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        for (idx, (curr, next)) in self.sections.iter().tuple_windows().enumerate() {
            chk_num_le(
                &mut errors,
                curr.speed_limit_mps,
                params.line_speed_mps,
                &format!("Speed limit of section at index = {idx}"),
            );
            if curr.length_m <= params.train_length_m {
                errors.push(anyhow!(
                    "Section at index = {} is {} m long, must be longer than the train ({} m)!",
                    idx,
                    curr.length_m,
                    params.train_length_m
                ));
            }
            if curr.speed_limit_mps > next.speed_limit_mps {
                let braking_dist_m = (curr.speed_limit_mps.powi(2)
                    - next.speed_limit_mps.powi(2))
                    / (2.0 * params.accel_max_mps2);
                if braking_dist_m > curr.length_m {
                    errors.push(anyhow!(
                        "Section at index = {} needs {:.1} m to brake from {:.1} km/h to {:.1} km/h but is only {} m long!",
                        idx,
                        braking_dist_m,
                        mps_to_kmh(curr.speed_limit_mps),
                        mps_to_kmh(next.speed_limit_mps),
                        curr.length_m
                    ));
                }
            }
        }
        errors.make_err()
    }
}

impl ObjState for Track {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        validate_slice(&mut errors, &self.sections, "Section");
        if !self.sections.last().map_or(false, Section::is_sentinel) {
            errors.push(anyhow!("Track must end with the end-of-line sentinel!"));
        }
        if let Some(idx) = self.real_sections().iter().position(Section::is_sentinel) {
            errors.push(anyhow!(
                "Section at index = {} is a sentinel before the end of the track!",
                idx
            ));
        }
        errors.make_err()
    }
}

impl SerdeAPI for Track {
    const ACCEPTED_FORMATS: &'static [&'static str] = &["yaml", "json", "csv"];

    fn init(&mut self) -> anyhow::Result<()> {
        self.push_sentinel();
        if let Err(errors) = self.validate() {
            bail!(errors)
        }
        Ok(())
    }

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: &str) -> anyhow::Result<()> {
        match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::to_writer(wtr, self)?,
            "json" => serde_json::to_writer(wtr, self)?,
            "csv" => {
                let mut wtr = csv::Writer::from_writer(wtr);
                for section in self.real_sections() {
                    wtr.serialize(TrackRow {
                        length_m: section.length_m,
                        speed_limit_kmh: Some(mps_to_kmh(section.speed_limit_mps)),
                    })?;
                }
                wtr.flush()?
            }
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_FORMATS
            ),
        }
        Ok(())
    }

    fn from_reader<R: std::io::Read>(rdr: R, format: &str) -> anyhow::Result<Self> {
        let mut deserialized = match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => serde_yaml::from_reader(rdr)?,
            "json" => serde_json::from_reader(rdr)?,
            "csv" => {
                let mut sections = Vec::new();
                let mut rdr = csv::Reader::from_reader(rdr);
                for result in rdr.deserialize() {
                    let row: TrackRow = result?;
                    // a zero length row ends the description, as in interactive entry
                    if row.length_m == 0.0 {
                        break;
                    }
                    sections.push(Section::from_kmh(row.length_m, row.speed_limit_kmh));
                }
                Self { sections }
            }
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::ACCEPTED_FORMATS
            ),
        };
        deserialized.init()?;
        Ok(deserialized)
    }
}

/// Position in a [Track], owned by the simulation state and only ever moved
/// forward
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackCursor {
    idx: usize,
}

impl TrackCursor {
    pub fn idx(&self) -> usize {
        self.idx
    }

    pub fn current<'a>(&self, track: &'a Track) -> &'a Section {
        &track.sections[self.idx]
    }

    /// Section after the current one, `None` when standing on the sentinel
    pub fn peek_next<'a>(&self, track: &'a Track) -> Option<&'a Section> {
        track.sections.get(self.idx + 1)
    }

    pub fn at_sentinel(&self, track: &Track) -> bool {
        self.idx + 1 >= track.sections.len()
    }

    pub fn advance(&mut self, track: &Track) -> Result<(), TrackError> {
        if self.at_sentinel(track) {
            return Err(TrackError::Exhausted { idx: self.idx });
        }
        self.idx += 1;
        Ok(())
    }
}
