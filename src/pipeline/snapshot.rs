//! Snapshot layout and all-or-nothing JSON persistence.
//!
//! A stage serializes every output file in memory first. Only when all of
//! them serialized cleanly are they written into a sibling `<stage>.tmp/`
//! directory, which then replaces the stage directory by rename. A failing
//! stage therefore leaves the previous snapshot of that stage intact, never
//! a mix of old and new files, and never touches earlier stages.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DigestError, Result};
use crate::model::stats::Stage;

pub const PARSED_EMAILS: &str = "parsed_emails.json";
pub const FLAGGED_FOR_REVIEW: &str = "flagged_for_review.json";
pub const PARSE_STATS: &str = "parse_stats.json";

pub const CLEANED_EMAILS: &str = "cleaned_emails.json";
pub const REMOVED_ARTIFACTS: &str = "removed_artifacts.json";
pub const REMAINING_FLAGS: &str = "remaining_flags.json";
pub const CLEANUP_STATS: &str = "cleanup_stats.json";

pub const EMAILS_NO_SPAM: &str = "emails_no_spam.json";
pub const SPAM_DETECTED: &str = "spam_detected.json";
pub const FILTER_STATS: &str = "filter_stats.json";

/// Where each stage writes under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one stage's snapshot.
    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(match stage {
            Stage::Parse => "parsed",
            Stage::Clean => "cleaned",
            Stage::Filter => "filtered",
        })
    }

    /// Main collection written by `stage`.
    pub fn main_collection(&self, stage: Stage) -> PathBuf {
        self.stage_dir(stage).join(match stage {
            Stage::Parse => PARSED_EMAILS,
            Stage::Clean => CLEANED_EMAILS,
            Stage::Filter => EMAILS_NO_SPAM,
        })
    }

    /// Statistics file written by `stage`.
    pub fn stats_file(&self, stage: Stage) -> PathBuf {
        self.stage_dir(stage).join(match stage {
            Stage::Parse => PARSE_STATS,
            Stage::Clean => CLEANUP_STATS,
            Stage::Filter => FILTER_STATS,
        })
    }
}

/// Files of one stage directory, serialized but not yet on disk.
#[derive(Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
    files: Vec<(String, Vec<u8>)>,
}

impl SnapshotWriter {
    /// Start a snapshot that will replace `dir` as a whole.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// Serialize `value` as pretty JSON with a trailing newline.
    pub fn add<T: Serialize + ?Sized>(&mut self, file_name: &str, value: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value).map_err(|source| DigestError::Snapshot {
            path: self.dir.join(file_name),
            source,
        })?;
        bytes.push(b'\n');
        self.files.push((file_name.to_string(), bytes));
        Ok(())
    }

    /// Write every file into the staging directory, then swap it in.
    ///
    /// Returns the final paths written.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let staging = sibling(&self.dir, "tmp");
        let backup = sibling(&self.dir, "old");

        remove_dir_if_present(&staging)?;
        if let Err(e) = self.stage_into(&staging) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        remove_dir_if_present(&backup)?;
        let had_previous = self.dir.exists();
        if had_previous {
            std::fs::rename(&self.dir, &backup).map_err(|e| {
                let _ = std::fs::remove_dir_all(&staging);
                DigestError::io(&self.dir, e)
            })?;
        }
        if let Err(e) = std::fs::rename(&staging, &self.dir) {
            if had_previous {
                let _ = std::fs::rename(&backup, &self.dir);
            }
            let _ = std::fs::remove_dir_all(&staging);
            return Err(DigestError::io(&self.dir, e));
        }
        if had_previous {
            std::fs::remove_dir_all(&backup).map_err(|e| DigestError::io(&backup, e))?;
        }

        let written: Vec<PathBuf> = self.files.iter().map(|(name, _)| self.dir.join(name)).collect();
        info!(dir = %self.dir.display(), files = written.len(), "Snapshot committed");
        Ok(written)
    }

    fn stage_into(&self, staging: &Path) -> Result<()> {
        std::fs::create_dir_all(staging).map_err(|e| DigestError::io(staging, e))?;
        for (name, bytes) in &self.files {
            let path = staging.join(name);
            std::fs::write(&path, bytes).map_err(|e| DigestError::io(&path, e))?;
            debug!(path = %path.display(), bytes = bytes.len(), "Staged snapshot file");
        }
        Ok(())
    }
}

/// `parsed` → `parsed.tmp`, next to the original.
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    dir.with_file_name(name)
}

/// Remove a leftover directory from an interrupted run.
fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(DigestError::io(dir, e)),
        _ => Ok(()),
    }
}

/// Read a JSON snapshot file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read(path).map_err(|e| DigestError::io(path, e))?;
    serde_json::from_slice(&contents).map_err(|source| DigestError::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}
