#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use pivot_workbench::data::{Row, Value, row};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The three-row East/West sales table used throughout the pivot tests.
pub fn east_west_rows() -> Vec<Row> {
    vec![
        sale("East", "A", 10.0),
        sale("East", "B", 5.0),
        sale("West", "A", 7.0),
    ]
}

pub fn sale(region: &str, product: &str, sales: f64) -> Row {
    row([
        ("Region", Value::from(region)),
        ("Product", Value::from(product)),
        ("Sales", Value::from(sales)),
    ])
}

/// Scratch directory that is removed when the workspace is dropped.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Copies a `tests/data` fixture into the workspace.
    pub fn fixture(&self, name: &str) -> PathBuf {
        let target = self.temp_dir.path().join(name);
        std::fs::copy(fixture_path(name), &target).expect("copy fixture");
        target
    }
}
