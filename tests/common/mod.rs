#![allow(dead_code)]

#[path = "../../src/test_support.rs"]
mod fixtures;

pub use fixtures::*;

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("reports");
        fs::create_dir_all(&root).expect("create root");
        Self { _tmp: tmp, root }
    }

    pub fn workbook(&self, relative: &str, sheets: &[Vec<Vec<u8>>]) -> PathBuf {
        let path = self.root.join(relative);
        write_workbook(&path, sheets);
        path
    }

    pub fn raw(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.root.join(relative);
        fs::write(&path, bytes).expect("write file");
        path
    }
}

/// Read one entry of a zip package on disk as text
pub fn zip_entry(path: &Path, name: &str) -> String {
    zip_entry_text(&fs::read(path).expect("read package"), name)
}

/// Number of rows in the report sheet
pub fn report_rows(report: &Path) -> usize {
    zip_entry(report, "xl/worksheets/sheet1.xml")
        .matches("<row ")
        .count()
}
