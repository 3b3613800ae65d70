use std::io::{self, BufRead, Write};

use anyhow::Context;
use clap::{ArgGroup, Parser};

extern crate runningtime_core;
use runningtime_core::prelude::*;
#[cfg(feature = "resources")]
use runningtime_core::resources::list_resources;

/// Minimum running time of a train over speed-restricted track.
/// After running `cargo build --release`, run with
/// ```bash
/// ./target/release/runningtime-cli --track-file runningtime-core/resources/tracks/curve.csv
/// ```
/// With no track given, sections are read interactively until an empty length
/// is entered.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(group(
    ArgGroup::new("track-source")
    .args(&["track", "track-file", "resource"])
))]
struct RunningTimeApi {
    /// Track as json string
    #[clap(long, value_parser)]
    track: Option<String>,
    /// Path to track file (csv, yaml or json)
    #[clap(long, value_parser)]
    track_file: Option<String>,
    /// Name of a bundled track, e.g. `curve.csv`
    #[clap(long, value_parser)]
    resource: Option<String>,
    /// Path to driver parameters file (yaml or json)
    #[clap(long, value_parser)]
    params: Option<String>,
    /// Check the track against the train before running and refuse to run a
    /// track that would derail
    #[clap(long, action)]
    validate: bool,
    /// How to print results: `text`, `json` or `yaml`
    #[clap(long, value_parser, default_value = "text")]
    format: String,
    /// List the bundled tracks and exit
    #[clap(long, action)]
    list_resources: bool,
}

/// Exit status for a run that ended in a derailment
const EXIT_DERAILED: i32 = 2;
/// Exit status for a run that came to rest short of the end of line
const EXIT_STALLED: i32 = 3;

pub fn main() {
    let api = RunningTimeApi::parse();
    match run(api) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:?}");
            std::process::exit(1);
        }
    }
}

fn run(api: RunningTimeApi) -> anyhow::Result<i32> {
    if api.list_resources {
        #[cfg(feature = "resources")]
        for name in list_resources("tracks") {
            println!("{name}");
        }
        return Ok(0);
    }

    let params = match &api.params {
        Some(path) => DriverParams::from_file(path)
            .with_context(|| format!("could not load driver parameters from {path:?}"))?,
        None => DriverParams::default(),
    };

    let track = if let Some(track_json) = &api.track {
        Track::from_json(track_json)?
    } else if let Some(path) = &api.track_file {
        Track::from_file(path).with_context(|| format!("could not load track from {path:?}"))?
    } else if let Some(name) = &api.resource {
        load_resource(name)?
    } else {
        let stdin = io::stdin();
        read_track(stdin.lock(), io::stderr(), params.line_speed_mps)?
    };
    let track = track.clamped(params.line_speed_mps);

    if api.validate {
        track
            .check_preconditions(&params)
            .map_err(anyhow::Error::new)
            .context("track cannot be run safely")?;
    }

    let summary = simulate(&track, &params)?;
    match api.format.to_lowercase().as_str() {
        "text" => print_text(&summary),
        "json" => println!("{}", summary.to_json()?),
        "yaml" | "yml" => print!("{}", summary.to_yaml()?),
        other => anyhow::bail!("Unsupported format {other:?}, must be one of text, json, yaml"),
    }

    Ok(match summary.outcome {
        Outcome::Completed { .. } => 0,
        Outcome::Derailed { .. } => EXIT_DERAILED,
        Outcome::Stalled { .. } => EXIT_STALLED,
    })
}

#[cfg(feature = "resources")]
fn load_resource(name: &str) -> anyhow::Result<Track> {
    Track::from_resource(format!("tracks/{name}"))
}

#[cfg(not(feature = "resources"))]
fn load_resource(name: &str) -> anyhow::Result<Track> {
    anyhow::bail!("cannot load {name:?}, built without bundled tracks")
}

fn print_text(summary: &RunSummary) {
    for event in &summary.events {
        println!("{event}");
    }
    let secs = summary.outcome.time_s().round() as u64;
    println!("Total time: {secs}s ({})", minutes_seconds(secs));
}

/// `m:ss`
fn minutes_seconds(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Prompts for sections until an empty or zero length. An empty or zero speed
/// limit means the default limit.
fn read_track<R: BufRead, W: Write>(
    mut rdr: R,
    mut wtr: W,
    line_speed_mps: f64,
) -> anyhow::Result<Track> {
    let mut pairs = Vec::new();
    while let Some(length_m) = prompt(&mut rdr, &mut wtr, "Enter track length in m: ")? {
        if length_m <= 0.0 {
            break;
        }
        let speed_limit_kmh = prompt(&mut rdr, &mut wtr, "Enter speed limit [400km/h]: ")?
            .filter(|kmh| *kmh > 0.0);
        pairs.push((length_m, speed_limit_kmh));
    }
    Ok(Track::from_kmh(&pairs, line_speed_mps))
}

/// Reads one number, `None` for an empty line or end of input
fn prompt<R: BufRead, W: Write>(rdr: &mut R, wtr: &mut W, msg: &str) -> anyhow::Result<Option<f64>> {
    write!(wtr, "{msg}")?;
    wtr.flush()?;
    let mut line = String::new();
    if rdr.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let value = line
        .parse::<f64>()
        .with_context(|| format!("could not parse {line:?} as a number"))?;
    Ok(Some(value))
}
