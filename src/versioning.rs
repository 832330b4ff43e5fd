// Version numbers for deliverable files
//
// Looks at what's already in a task folder, figures out the next number,
// copies the new file in as <asset>_<task>_<version><ext> and drops a small
// JSON side-car next to it saying who did it.

use crate::error::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

// <prefix><digits>.<ext>, anchored on both ends. Prefix is lazy so the digit
// run right before the dot is the one we get.
const VERSION_PATTERN: &str = r"^(?P<prefix>.*?)(?P<version>\d+)\.(?P<ext>[^.]+)$";

// Versions are printed at least this wide: 1 -> "001"
const VERSION_WIDTH: usize = 3;

/// Extension of the metadata side-car written next to a deliverable
pub const METADATA_EXTENSION: &str = "meta.json";

// Files starting with this are published masters, not working versions
const MASTER_PREFIX: &str = "_master";

/// Who produced a version and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>, // original file name
}

/// Result of ingesting one file into a task
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedVersion {
    pub version: String,
    pub path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Compiled filename version pattern
pub struct VersionPattern {
    regex: Regex,
}

impl Default for VersionPattern {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionPattern {
    pub fn new() -> Self {
        // Constant pattern, compiled once per matcher
        let regex = Regex::new(VERSION_PATTERN).expect("version pattern should always compile");
        Self { regex }
    }

    /// Version number encoded in a file name, if it has one
    ///
    /// Digit runs too big for a u64 count as no match.
    pub fn parse(&self, file_name: &str) -> Option<u64> {
        self.regex
            .captures(file_name)
            .and_then(|caps| caps.name("version"))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Highest version among the direct files of `dir`
    pub fn max_version<P: AsRef<Path>>(&self, dir: P) -> Result<Option<u64>> {
        let mut max = None;

        for entry in fs::read_dir(dir.as_ref())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            if let Some(version) = self.parse(&name.to_string_lossy()) {
                max = Some(max.map_or(version, |m: u64| m.max(version)));
            }
        }

        Ok(max)
    }

    /// Next version string for `dir`: "001" when nothing matches yet
    pub fn next_version<P: AsRef<Path>>(&self, dir: P) -> Result<String> {
        let next = match self.max_version(dir)? {
            Some(max) => max.saturating_add(1),
            None => 1,
        };
        Ok(format_version(next))
    }
}

/// Zero-pad to at least three digits. Wider numbers are kept whole.
pub fn format_version(version: u64) -> String {
    format!("{:0width$}", version, width = VERSION_WIDTH)
}

/// `<asset>_<task>_<version><ext>` where `<ext>` comes from `source`
pub fn destination_name(asset: &str, task: &str, version: &str, source: &Path) -> String {
    let ext = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    format!("{}_{}_{}{}", asset, task, version, ext)
}

/// Side-car path for a deliverable: same stem, metadata extension
pub fn metadata_path<P: AsRef<Path>>(deliverable: P) -> PathBuf {
    deliverable.as_ref().with_extension(METADATA_EXTENSION)
}

fn is_metadata_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(&format!(".{}", METADATA_EXTENSION)))
        .unwrap_or(false)
}

/// Read the side-car of a deliverable, if one exists
pub fn read_metadata<P: AsRef<Path>>(deliverable: P) -> Result<Option<VersionMetadata>> {
    let path = metadata_path(deliverable);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Deliverable files of a task, sorted by name
///
/// Skips published masters and metadata side-cars.
pub fn list_deliverables<P: AsRef<Path>>(task_dir: P) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(task_dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with(MASTER_PREFIX) || is_metadata_file(&path) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}

/// Everything needed to file one deliverable into a task
pub struct IngestRequest<'a> {
    pub source: &'a Path,
    pub asset_name: &'a str,
    pub task_name: &'a str,
    pub task_dir: &'a Path,
    pub user: &'a str,
    pub comment: Option<&'a str>,
}

/// Copy `source` into the task as the next version and write its side-car
///
/// The destination is created exclusively, so an existing file with the same
/// name is never overwritten and the call fails with `AlreadyExists` instead.
/// The copy and the side-car write are separate steps. If the side-car fails
/// the copied file stays where it is and the error is returned.
pub fn ingest(pattern: &VersionPattern, request: &IngestRequest<'_>) -> Result<IngestedVersion> {
    let version = pattern.next_version(request.task_dir)?;
    let file_name = destination_name(request.asset_name, request.task_name, &version, request.source);
    let destination = request.task_dir.join(file_name);

    let mut reader = File::open(request.source)?;
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&destination)?;
    io::copy(&mut reader, &mut writer)?;

    let metadata = VersionMetadata {
        user: request.user.to_string(),
        comment: request.comment.map(str::to_string),
        created_at: Utc::now(),
        source: request
            .source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    };
    let metadata_path = metadata_path(&destination);
    fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    tracing::info!(
        file = %destination.display(),
        version = %version,
        user = %request.user,
        "ingested new version"
    );

    Ok(IngestedVersion {
        version,
        path: destination,
        metadata_path,
    })
}
