//! Artifact denylist: exact-id removal of known non-message records.
//!
//! Ids are only meaningful under the identifier scheme that produced them,
//! so the file names its scheme and every listed id must still exist in the
//! input. Either check failing stops the run before anything is written.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};
use crate::model::email::Email;
use crate::parser::record::ID_SCHEME;

/// Denylist shipped with the binary.
pub const EMBEDDED_DENYLIST: &str = include_str!("../../data/denylist.toml");

const EMBEDDED_NAME: &str = "<embedded denylist.toml>";

/// One denylisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenylistEntry {
    pub id: String,
    pub reason: String,
}

/// Versioned list of record ids to remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDenylist {
    pub scheme: String,
    #[serde(default, rename = "artifact")]
    pub entries: Vec<DenylistEntry>,
}

/// A record removed by the denylist, with the reason it was listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedArtifact {
    pub reason: String,
    pub email: Email,
}

impl ArtifactDenylist {
    /// An empty list for the current scheme.
    pub fn empty() -> Self {
        Self {
            scheme: ID_SCHEME.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_DENYLIST, EMBEDDED_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Parse a denylist and check its scheme and id syntax.
    ///
    /// Ids are lower-cased on load; record ids are always lower-case hex.
    pub fn from_toml_str(contents: &str, source_name: &str) -> Result<Self> {
        let mut list: Self =
            toml::from_str(contents).map_err(|e| DigestError::config(source_name, e.to_string()))?;

        if list.scheme != ID_SCHEME {
            return Err(DigestError::SchemeMismatch {
                expected: ID_SCHEME.to_string(),
                found: list.scheme,
            });
        }

        for entry in &mut list.entries {
            entry.id.make_ascii_lowercase();
        }

        let mut seen = HashSet::new();
        for entry in &list.entries {
            if entry.id.len() != 16 || !entry.id.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(DigestError::config(
                    source_name,
                    format!("'{}' is not a 16-digit hex record id", entry.id),
                ));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(DigestError::config(
                    source_name,
                    format!("record id '{}' is listed twice", entry.id),
                ));
            }
        }
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail with [`DigestError::StaleDenylist`] if any listed id is absent
    /// from `records`.
    pub fn validate_against(&self, records: &[Email]) -> Result<()> {
        let present: HashSet<&str> = records.iter().map(|e| e.id.as_str()).collect();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !present.contains(entry.id.as_str()))
            .map(|entry| entry.id.clone())
            .collect();
        if stale.is_empty() {
            Ok(())
        } else {
            Err(DigestError::StaleDenylist(stale))
        }
    }

    /// Split records into kept and removed, preserving input order.
    pub fn partition(&self, records: Vec<Email>) -> (Vec<Email>, Vec<RemovedArtifact>) {
        let reasons: HashMap<&str, &str> = self
            .entries
            .iter()
            .map(|entry| (entry.id.as_str(), entry.reason.as_str()))
            .collect();

        let mut kept = Vec::with_capacity(records.len());
        let mut removed = Vec::new();
        for email in records {
            match reasons.get(email.id.as_str()) {
                Some(reason) => {
                    tracing::debug!(id = %email.id, reason, "Removing artifact");
                    removed.push(RemovedArtifact {
                        reason: reason.to_string(),
                        email,
                    });
                }
                None => kept.push(email),
            }
        }
        (kept, removed)
    }
}
