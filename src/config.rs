//! JSON runtime configuration of the demo driver.

use crate::error::{Error, Result};
use crate::params::ReconstructionParams;
use crate::synthetic::SceneConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `<step>_structure.xyz` / `<step>_odometry.xyz`.
    pub export_dir: Option<PathBuf>,
    /// Where the run summary is written as JSON.
    pub report_json: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub scene: SceneConfig,
    pub output: OutputConfig,
    pub params: ReconstructionParams,
}

pub fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let contents = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "scene": { "viewpoints": 4, "measured_range": false },
                "output": { "export_dir": "out" },
                "params": {
                    "window": 3,
                    "refine": { "epsilon": 1e-9 },
                    "filters": { "triangulation": { "min_angle_deg": 1.0, "max_angle_deg": 120.0 } }
                }
            }"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.scene.viewpoints, 4);
        assert!(!config.scene.measured_range);
        assert_eq!(config.output.export_dir, Some(PathBuf::from("out")));
        assert_eq!(config.params.window, 3);
        assert_eq!(config.params.refine.epsilon, 1e-9);
        assert_eq!(config.params.refine.max_iterations, 500);
        assert_eq!(config.params.bootstrap_viewpoints, 5);
        assert_eq!(config.params.filters.radius_multiplier, 3.0);
        assert!(config.params.filters.triangulation.is_some());
    }

    #[test]
    fn malformed_json_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        match load_config(&path) {
            Err(Error::Json { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            load_config(&dir.path().join("missing.json")),
            Err(Error::Io { .. })
        ));
    }
}
