//! Run manifest: what went in, what came out, and what each stage reported.

use equipanel_core::PipelineReport;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Version of the manifest and feature-list layout.
pub const SCHEMA_VERSION: u32 = 1;

/// BLAKE3 digest of one input source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDigest {
    pub name: String,
    pub path: PathBuf,
    pub blake3: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub created_at: chrono::NaiveDateTime,
    /// Hash of the serialized run configuration.
    pub config_hash: String,
    pub inputs: Vec<InputDigest>,
    pub output: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub report: PipelineReport,
}

/// Hash a file, or every file of a directory in name order (names included).
pub fn hash_path(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        for file in files {
            if let Some(name) = file.file_name() {
                hasher.update(name.to_string_lossy().as_bytes());
            }
            hasher.update(&fs::read(&file)?);
        }
    } else {
        hasher.update(&fs::read(path)?);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
