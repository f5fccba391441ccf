// src/artifacts.rs

//! Build artifacts written after a full `build`: the build-id token and a
//! stats blob, next to the output directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compiler::CompilerEvent;
use crate::fs::FileSystem;
use crate::hash::{compute_aggregate_hash, compute_file_hash};
use crate::watch::path_utils::relative_str;
use crate::worker::BuildReport;

pub const BUILD_ID_FILE: &str = "BUILD_ID";
pub const BUILD_STATS_FILE: &str = "build-stats.json";

/// Hex digits kept in the build id.
pub const BUILD_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStats {
    pub build_id: String,
    pub total_compiled_files: usize,
    /// output path (relative to the artifacts dir) -> content hash
    pub outputs: BTreeMap<String, String>,
    pub errors: Vec<String>,
}

/// Directory the artifacts go to: the parent of `out_dir`.
pub fn artifacts_dir(out_dir: &Path) -> PathBuf {
    out_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out_dir.to_path_buf())
}

/// Deterministic id of a set of outputs.
pub fn build_id(outputs: &BTreeMap<String, String>) -> String {
    let entries: Vec<(String, String)> = outputs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut id = compute_aggregate_hash(&entries);
    id.truncate(BUILD_ID_LEN);
    id
}

/// Hash every output the report mentions.
pub fn collect_stats(fs: &dyn FileSystem, out_dir: &Path, report: &BuildReport) -> Result<BuildStats> {
    let root = artifacts_dir(out_dir);
    let mut outputs = BTreeMap::new();

    for event in &report.built {
        if let CompilerEvent::FileBuilt { dest, .. } = event {
            let hash = compute_file_hash(fs, dest)
                .with_context(|| format!("hashing build output {:?}", dest))?;
            let key = relative_str(&root, dest).unwrap_or_else(|| dest.to_string_lossy().into_owned());
            outputs.insert(key, hash);
        }
    }

    let errors = report
        .errors
        .iter()
        .filter_map(|event| match event {
            CompilerEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        })
        .collect();

    Ok(BuildStats {
        build_id: build_id(&outputs),
        total_compiled_files: report.total_compiled_files,
        outputs,
        errors,
    })
}

/// Write `BUILD_ID` and `build-stats.json`; returns the directory used.
pub fn write_artifacts(fs: &dyn FileSystem, out_dir: &Path, stats: &BuildStats) -> Result<PathBuf> {
    let dir = artifacts_dir(out_dir);

    fs.write(&dir.join(BUILD_ID_FILE), stats.build_id.as_bytes())?;
    let json = serde_json::to_vec_pretty(stats).context("serialising build stats")?;
    fs.write(&dir.join(BUILD_STATS_FILE), &json)?;

    info!(build_id = %stats.build_id, dir = %dir.display(), "wrote build artifacts");
    Ok(dir)
}
