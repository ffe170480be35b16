//! Writers for the exported artifacts.
//!
//! - `write_points_xyz`: one `x y z r g b` line per structure (red).
//! - `write_trajectory_xyz`: one `x y z r g b` line per viewpoint (white).
//! - `write_json_file`: pretty-print a serializable value to disk.

use crate::error::{Error, Result};
use crate::types::{PointCloud, Trajectory, Vec3};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const STRUCTURE_RGB: [u8; 3] = [255, 0, 0];
const POSE_RGB: [u8; 3] = [255, 255, 255];

fn xyz_lines<'a>(points: impl Iterator<Item = &'a Vec3>, rgb: [u8; 3]) -> String {
    let mut out = String::new();
    for p in points {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "{} {} {} {} {} {}", p.x, p.y, p.z, rgb[0], rgb[1], rgb[2]);
    }
    out
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_points_xyz(path: &Path, cloud: &PointCloud) -> Result<()> {
    write_text(path, &xyz_lines(cloud.points.iter(), STRUCTURE_RGB))
}

pub fn write_trajectory_xyz(path: &Path, trajectory: &Trajectory) -> Result<()> {
    write_text(
        path,
        &xyz_lines(trajectory.poses.iter().map(|p| &p.position), POSE_RGB),
    )
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_text(path, &json)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| Error::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
