//! Spam signal set: content rules loaded from TOML, compiled once.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

/// Signal set shipped with the binary.
pub const EMBEDDED_SIGNALS: &str = include_str!("../../data/spam_signals.toml");

const EMBEDDED_NAME: &str = "<embedded spam_signals.toml>";

/// Categories a content rule may belong to.
pub const CONTENT_CATEGORIES: [&str; 6] = [
    "money-scheme",
    "list-sales",
    "pump-and-dump",
    "mlm",
    "adult",
    "commercial-pitch",
];

/// Category of the built-in structural signals.
pub const STRUCTURAL_CATEGORY: &str = "structural";

/// How much a single firing rule counts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// Needs corroboration from another signal.
    Weak,
    /// Enough on its own.
    Strong,
}

/// Record field a rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Subject,
    Body,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalFile {
    #[serde(default = "default_min_signals")]
    min_signals: usize,
    #[serde(default)]
    legit_numeric_domains: Vec<String>,
    #[serde(default)]
    trusted_senders: Vec<String>,
    #[serde(default)]
    rule: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleEntry {
    name: String,
    category: String,
    strength: Strength,
    fields: Vec<Field>,
    pattern: String,
}

fn default_min_signals() -> usize {
    2
}

/// A compiled content rule.
#[derive(Debug, Clone)]
pub struct SignalRule {
    pub name: String,
    pub category: String,
    pub strength: Strength,
    pub fields: Vec<Field>,
    regex: Regex,
}

impl SignalRule {
    /// Check the rule against already lower-cased subject and body.
    pub fn matches(&self, subject: &str, body: &str) -> bool {
        self.fields.iter().any(|field| match field {
            Field::Subject => self.regex.is_match(subject),
            Field::Body => self.regex.is_match(body),
        })
    }
}

/// Rules and parameters for the spam classifier.
#[derive(Debug, Clone)]
pub struct SpamSignalSet {
    /// Independent categories needed for a verdict when no strong rule fired.
    pub min_signals: usize,
    /// Domains where numeric local parts are normal (CompuServe and friends).
    pub legit_numeric_domains: Vec<String>,
    /// Lower-cased senders that are never classified as spam.
    pub trusted_senders: BTreeSet<String>,
    /// Content rules in evaluation order.
    pub rules: Vec<SignalRule>,
}

impl SpamSignalSet {
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_SIGNALS, EMBEDDED_NAME)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| DigestError::io(path, e))?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Parse, validate and compile a signal set.
    pub fn from_toml_str(contents: &str, source_name: &str) -> Result<Self> {
        let file: SignalFile =
            toml::from_str(contents).map_err(|e| DigestError::config(source_name, e.to_string()))?;

        if file.min_signals < 2 {
            return Err(DigestError::config(
                source_name,
                format!("min_signals must be at least 2, got {}", file.min_signals),
            ));
        }

        let mut names = HashSet::new();
        let mut rules = Vec::with_capacity(file.rule.len());
        for entry in file.rule {
            if !CONTENT_CATEGORIES.contains(&entry.category.as_str()) {
                return Err(DigestError::config(
                    source_name,
                    format!(
                        "rule '{}' has unknown category '{}'",
                        entry.name, entry.category
                    ),
                ));
            }
            if entry.fields.is_empty() {
                return Err(DigestError::config(
                    source_name,
                    format!("rule '{}' matches no fields", entry.name),
                ));
            }
            if !names.insert(entry.name.clone()) {
                return Err(DigestError::config(
                    source_name,
                    format!("rule '{}' is defined twice", entry.name),
                ));
            }
            let regex = RegexBuilder::new(&entry.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| DigestError::InvalidPattern {
                    context: format!("{source_name} rule '{}'", entry.name),
                    pattern: entry.pattern.clone(),
                    reason: e.to_string(),
                })?;
            rules.push(SignalRule {
                name: entry.name,
                category: entry.category,
                strength: entry.strength,
                fields: entry.fields,
                regex,
            });
        }

        tracing::debug!(source = source_name, rules = rules.len(), "Loaded spam signal set");
        Ok(Self {
            min_signals: file.min_signals,
            legit_numeric_domains: file
                .legit_numeric_domains
                .iter()
                .map(|d| d.trim().to_lowercase())
                .collect(),
            trusted_senders: file
                .trusted_senders
                .iter()
                .map(|s| s.trim().to_lowercase())
                .collect(),
            rules,
        })
    }

    /// `true` if `email` belongs to a domain where numeric local parts are normal.
    pub fn is_legit_numeric(&self, email: &str) -> bool {
        self.legit_numeric_domains
            .iter()
            .any(|domain| email.ends_with(&format!("@{domain}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_set_loads() {
        let set = SpamSignalSet::embedded().unwrap();
        assert_eq!(set.min_signals, 2);
        assert!(set.rules.iter().any(|r| r.name == "make-money" && r.strength == Strength::Strong));
        assert!(set.rules.iter().any(|r| r.strength == Strength::Weak));
        assert!(set.is_legit_numeric("12345678@compuserve.com"));
        assert!(!set.is_legit_numeric("12345678@spam.biz"));
    }

    #[test]
    fn test_rule_matches_only_its_fields() {
        let set = SpamSignalSet::embedded().unwrap();
        let make_money = set.rules.iter().find(|r| r.name == "make-money").unwrap();
        assert!(make_money.matches("make money fast", ""));
        assert!(!make_money.matches("", "make money fast"));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let toml = "[[rule]]\nname = \"x\"\ncategory = \"structural\"\nstrength = \"weak\"\nfields = [\"body\"]\npattern = \"x\"\n";
        let err = SpamSignalSet::from_toml_str(toml, "test").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_min_signals_below_two_rejected() {
        assert!(SpamSignalSet::from_toml_str("min_signals = 1\n", "test").is_err());
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let toml = "[[rule]]\nname = \"x\"\ncategory = \"mlm\"\nstrength = \"weak\"\nfields = [\"body\"]\npattern = \"(oops\"\n";
        let err = SpamSignalSet::from_toml_str(toml, "test").unwrap_err();
        assert!(matches!(err, DigestError::InvalidPattern { .. }));
    }
}
