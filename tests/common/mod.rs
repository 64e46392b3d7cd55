//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;

use datacollect_rs::error::Result;
use datacollect_rs::raw::VideoProbe;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Video probe returning the same duration for every file
pub struct FixedDurationProbe(pub i64);

impl VideoProbe for FixedDurationProbe {
    fn duration_ms(&self, _path: &Path) -> Result<i64> {
        Ok(self.0)
    }
}

/// Every file below `root`, keyed by its `/`-separated relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .unwrap()
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                out.insert(relative, fs::read(&path).unwrap());
            }
        }
    }

    let mut out = BTreeMap::new();
    if root.is_dir() {
        walk(root, root, &mut out);
    }
    out
}
