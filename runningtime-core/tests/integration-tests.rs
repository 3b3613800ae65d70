use runningtime_core::prelude::*;
use runningtime_core::simdrive::SimState;

/// Accelerate at full power to the limit, run at the limit, brake at full
/// brake to a stop
fn trapezoid_time_s(length_m: f64, speed_mps: f64, accel_mps2: f64) -> f64 {
    2.0 * speed_mps / accel_mps2 + (length_m - speed_mps * speed_mps / accel_mps2) / speed_mps
}

#[test]
fn test_single_section_time_is_close_to_trapezoid() {
    let params = DriverParams::default();
    for (length_m, kmh) in [(800.0, 40.0), (3000.0, 80.0), (10000.0, 120.0)] {
        let track = Track::from_kmh(&[(length_m, Some(kmh))], params.line_speed_mps);
        let summary = simulate(&track, &params).unwrap();
        let lower = trapezoid_time_s(length_m, kmh_to_mps(kmh), params.accel_max_mps2);
        let time_s = summary.outcome.time_s();
        assert!(summary.outcome.is_completed());
        assert!(
            time_s >= lower && time_s <= lower + 4.0,
            "{length_m} m @ {kmh} km/h took {time_s} s, trapezoid {lower} s"
        );
    }
}

#[test]
fn test_unrestricted_section_defaults_to_line_speed() {
    let params = DriverParams::default();
    let track = Track::from_kmh(&[(20000.0, None)], params.line_speed_mps);
    let summary = simulate(
        &track,
        &DriverParams {
            save_interval: Some(1),
            ..params.clone()
        },
    )
    .unwrap();
    assert!(summary.outcome.is_completed());
    let top_speed = summary
        .history
        .iter()
        .map(|s| s.speed_mps)
        .fold(0.0, f64::max);
    // the power curve keeps the train well short of line speed
    assert!(top_speed < params.line_speed_mps);
    assert!(top_speed > params.power_curve_speed_mps);
}

#[test]
fn test_track_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let track = Track::from_kmh(
        &[(2000.0, Some(120.0)), (500.0, Some(40.0))],
        kmh_to_mps(400.0),
    );
    for ext in ["yaml", "json", "csv"] {
        let path = dir.path().join(format!("track.{ext}"));
        track.to_file(&path).unwrap();
        let loaded = Track::from_file(&path).unwrap();
        assert_eq!(loaded.len(), track.len(), "{ext}");
        for (a, b) in loaded.sections().iter().zip(track.sections()) {
            assert!(a.speed_limit_mps.approx_eq(&b.speed_limit_mps, 1e-9), "{ext}");
        }
    }
}

#[test]
fn test_params_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.yaml");
    std::fs::write(&path, "train_length_m: 100.0\nleeway_mps: 0.5\n").unwrap();
    let params = DriverParams::from_file(&path).unwrap();
    assert_eq!(params.train_length_m, 100.0);
    assert_eq!(params.leeway_mps, 0.5);
    assert_eq!(params.accel_max_mps2, 0.85);
}

#[test]
fn test_summary_serializes() {
    let track = Track::from_kmh(&[(3000.0, Some(80.0))], kmh_to_mps(400.0));
    let summary = simulate(&track, &DriverParams::default()).unwrap();
    let json = summary.to_json().unwrap();
    let back = RunSummary::from_json(json).unwrap();
    assert_eq!(back.events.len(), summary.events.len());
    assert!(back
        .outcome
        .time_s()
        .approx_eq(&summary.outcome.time_s(), 1e-9));
    let yaml = summary.to_yaml().unwrap();
    assert!(yaml.contains("Completed"));
}

#[test]
#[cfg(feature = "resources")]
fn test_bundled_tracks() {
    let params = DriverParams {
        save_interval: Some(1),
        ..Default::default()
    };
    let curve = Track::from_resource("tracks/curve.csv").unwrap();
    curve.check_preconditions(&params).unwrap();
    let summary = simulate(&curve, &params).unwrap();
    assert!(summary.outcome.is_completed());
    let crossing: &SimState = summary.history.iter().find(|s| s.cursor.idx() == 1).unwrap();
    assert!(crossing.speed_mps <= kmh_to_mps(40.0));

    let masked = Track::from_resource("tracks/masked_limit.csv").unwrap();
    assert!(masked.check_preconditions(&params).is_err());
    assert!(simulate(&masked, &params).unwrap().outcome.is_derailed());

    let slow_middle = Track::from_resource("tracks/slow_middle.yaml").unwrap();
    slow_middle.check_preconditions(&params).unwrap();
    assert!(simulate(&slow_middle, &params).unwrap().outcome.is_completed());
}

#[test]
fn test_batch_of_tracks() {
    let params = DriverParams::default();
    let tracks = [
        vec![(3000.0, Some(80.0))],
        vec![(2000.0, Some(120.0)), (500.0, Some(40.0))],
        vec![(5000.0, Some(200.0)), (100.0, Some(160.0)), (1000.0, Some(40.0))],
    ];
    let mut sdv = SimDriveVec(
        tracks
            .iter()
            .map(|pairs| SimDrive::new(Track::from_kmh(pairs, params.line_speed_mps), params.clone()))
            .collect(),
    );
    sdv.sim_drive(None).unwrap();
    let derailed: Vec<bool> = sdv
        .summaries()
        .unwrap()
        .iter()
        .map(|s| s.outcome.is_derailed())
        .collect();
    assert_eq!(derailed, [false, false, true]);
}
