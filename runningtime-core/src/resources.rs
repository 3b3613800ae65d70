#![cfg(feature = "resources")]

use include_dir::{include_dir, Dir};
pub const RESOURCES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/resources");

/// Names of the files bundled under `subdir` of the resources directory,
/// sorted. Falls back to the top level when `subdir` does not exist; pass `""`
/// to list the top level on purpose.
pub fn list_resources(subdir: &str) -> Vec<String> {
    let resources_path = RESOURCES_DIR.get_dir(subdir).unwrap_or(&RESOURCES_DIR);
    let mut file_names: Vec<String> = resources_path
        .files()
        .filter_map(|entry| entry.path().file_name()?.to_str().map(String::from))
        .collect();
    file_names.sort();
    file_names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    #[test]
    fn test_list_resources() {
        let result = list_resources("tracks");
        assert_eq!(
            result,
            ["curve.csv", "masked_limit.csv", "single.csv", "slow_middle.yaml"]
        );
    }

    #[test]
    fn test_every_track_loads() {
        for name in list_resources("tracks") {
            let track = Track::from_resource(format!("tracks/{name}")).unwrap();
            assert!(!track.is_empty(), "{name}");
        }
    }
}
