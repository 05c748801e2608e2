//! Per-stage statistics written next to each snapshot.
//!
//! All maps are ordered so that repeated runs serialize byte-identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::email::Email;

/// Which pipeline stage produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Clean,
    Filter,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Clean => "clean",
            Self::Filter => "filter",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts reported by one stage.
///
/// For the clean and filter stages `output_count + removed_count == input_count`.
/// For the parse stage `input_count` is the number of delimiter-bounded chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: Stage,
    pub input_count: usize,
    /// Records in the main collection.
    pub output_count: usize,
    /// Records removed from the main collection (denylist or spam).
    pub removed_count: usize,
    /// Main-collection records carrying at least one flag.
    pub flagged_count: usize,
    /// Main-collection records per archive year.
    pub by_year: BTreeMap<i32, usize>,
    /// Flag name → number of main-collection records carrying it.
    pub flag_frequency: BTreeMap<String, usize>,
    /// Spam category → number of spam verdicts it contributed to (filter stage only).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub spam_categories: Option<BTreeMap<String, usize>>,
}

impl StageStats {
    /// Compute counts over the main collection of a stage.
    pub fn summarize(stage: Stage, input_count: usize, main: &[Email], removed_count: usize) -> Self {
        let mut by_year = BTreeMap::new();
        let mut flag_frequency = BTreeMap::new();
        let mut flagged_count = 0;

        for email in main {
            *by_year.entry(email.year).or_insert(0) += 1;
            if !email.flags.is_empty() {
                flagged_count += 1;
            }
            for flag in &email.flags {
                *flag_frequency.entry(flag.as_str().to_string()).or_insert(0) += 1;
            }
        }

        Self {
            stage,
            input_count,
            output_count: main.len(),
            removed_count,
            flagged_count,
            by_year,
            flag_frequency,
            spam_categories: None,
        }
    }

    /// `true` if no record went missing between input and output.
    pub fn is_conserved(&self) -> bool {
        self.output_count + self.removed_count == self.input_count
    }
}
