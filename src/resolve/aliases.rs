//! Entity alias table: maps unqualified senders onto canonical identities.

use std::collections::BTreeMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::{DigestError, Result};

/// Alias table shipped with the binary.
pub const EMBEDDED_ALIASES: &str = include_str!("../../data/aliases.toml");

/// Name used in errors for the embedded table.
const EMBEDDED_NAME: &str = "<embedded aliases.toml>";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasFile {
    #[serde(default)]
    alias: Vec<AliasEntry>,
    #[serde(default)]
    anonymous: AnonymousSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasEntry {
    alias: String,
    name: String,
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnonymousSection {
    #[serde(default)]
    patterns: Vec<String>,
}

/// Canonical identity an alias resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSender {
    pub name: String,
    pub email: String,
}

/// Read-only alias table plus anonymous-sender patterns.
#[derive(Debug, Clone)]
pub struct EntityAliasTable {
    entries: BTreeMap<String, CanonicalSender>,
    anonymous: Vec<Regex>,
}

/// Normalize an alias key: trimmed, lower-cased, inner whitespace collapsed.
pub fn normalize_key(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl EntityAliasTable {
    /// The table embedded in the binary.
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_ALIASES, EMBEDDED_NAME)
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Parse and validate a table. Any defect is a configuration error.
    pub fn from_toml_str(contents: &str, source_name: &str) -> Result<Self> {
        let file: AliasFile =
            toml::from_str(contents).map_err(|e| DigestError::config(source_name, e.to_string()))?;

        let mut entries = BTreeMap::new();
        for entry in file.alias {
            let key = normalize_key(&entry.alias);
            if key.is_empty() {
                return Err(DigestError::config(source_name, "alias with empty key"));
            }
            let email = entry.email.trim().to_lowercase();
            if !email.contains('@') {
                return Err(DigestError::config(
                    source_name,
                    format!("alias '{key}' maps to '{email}', which is not an address"),
                ));
            }
            let canonical = CanonicalSender {
                name: entry.name.trim().to_string(),
                email,
            };
            if let Some(previous) = entries.get(&key) {
                if previous != &canonical {
                    return Err(DigestError::config(
                        source_name,
                        format!("alias '{key}' is defined twice with different targets"),
                    ));
                }
            }
            entries.insert(key, canonical);
        }

        let anonymous = file
            .anonymous
            .patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| DigestError::InvalidPattern {
                        context: format!("{source_name} [anonymous]"),
                        pattern: p.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            source = source_name,
            aliases = entries.len(),
            anonymous_patterns = anonymous.len(),
            "Loaded alias table"
        );
        Ok(Self { entries, anonymous })
    }

    /// Build a table in code, mainly for tests.
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
        anonymous: Vec<Regex>,
    ) -> Self {
        let entries = entries
            .into_iter()
            .map(|(alias, name, email)| {
                (
                    normalize_key(alias),
                    CanonicalSender {
                        name: name.to_string(),
                        email: email.to_lowercase(),
                    },
                )
            })
            .collect();
        Self { entries, anonymous }
    }

    /// Look up a raw key; it is normalized first.
    pub fn lookup(&self, key: &str) -> Option<&CanonicalSender> {
        let key = normalize_key(key);
        if key.is_empty() {
            return None;
        }
        self.entries.get(&key)
    }

    /// `true` if the raw sender matches an anonymous/remailer pattern.
    pub fn is_anonymous(&self, from_raw: &str) -> bool {
        let lower = from_raw.trim().to_lowercase();
        self.anonymous.iter().any(|re| re.is_match(&lower))
    }

    /// Every canonical address in the table, deduplicated and sorted.
    pub fn canonical_emails(&self) -> Vec<&str> {
        let mut emails: Vec<&str> = self.entries.values().map(|c| c.email.as_str()).collect();
        emails.sort_unstable();
        emails.dedup();
        emails
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
