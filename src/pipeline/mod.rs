//! Stage orchestration.
//!
//! Each stage reads the previous stage's full main collection from disk,
//! runs a pure per-record transformation and commits a complete new
//! snapshot into its own directory. Stages can be run one at a time or all
//! together; re-running a stage on the same input rewrites byte-identical
//! files.

pub mod clean;
pub mod filter;
pub mod parse;
pub mod snapshot;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{Config, TablesConfig};
use crate::error::Result;
use crate::model::email::Email;
use crate::model::stats::{Stage, StageStats};
use crate::resolve::{ArtifactDenylist, EntityAliasTable};
use crate::spam::SpamSignalSet;

use self::parse::{ParseOptions, ParseOutput};
use self::snapshot::{
    read_json, OutputLayout, SnapshotWriter, CLEANED_EMAILS, CLEANUP_STATS, EMAILS_NO_SPAM,
    FILTER_STATS, FLAGGED_FOR_REVIEW, PARSED_EMAILS, PARSE_STATS, REMAINING_FLAGS,
    REMOVED_ARTIFACTS, SPAM_DETECTED,
};

/// The three static tables, loaded and validated once per run.
#[derive(Debug, Clone)]
pub struct Tables {
    pub aliases: EntityAliasTable,
    pub denylist: ArtifactDenylist,
    pub signals: SpamSignalSet,
}

impl Tables {
    /// Load each table from its configured path, or the embedded copy.
    ///
    /// Any defect in any table is fatal.
    pub fn load(config: &TablesConfig) -> Result<Self> {
        let aliases = match &config.aliases {
            Some(path) => EntityAliasTable::load(path)?,
            None => EntityAliasTable::embedded()?,
        };
        let denylist = match &config.denylist {
            Some(path) => ArtifactDenylist::load(path)?,
            None => ArtifactDenylist::embedded()?,
        };
        let signals = match &config.spam_signals {
            Some(path) => SpamSignalSet::load(path)?,
            None => SpamSignalSet::embedded()?,
        };
        info!(
            aliases = aliases.len(),
            denylisted = denylist.len(),
            spam_rules = signals.rules.len(),
            "Loaded static tables"
        );
        Ok(Self {
            aliases,
            denylist,
            signals,
        })
    }

    /// The tables embedded in the binary.
    pub fn embedded() -> Result<Self> {
        Self::load(&TablesConfig::default())
    }
}

/// Runs stages against one output directory.
#[derive(Debug)]
pub struct Pipeline<'a> {
    tables: &'a Tables,
    options: ParseOptions,
    layout: OutputLayout,
}

impl<'a> Pipeline<'a> {
    /// Compile parse settings and fix the output layout.
    pub fn new(config: &Config, tables: &'a Tables) -> Result<Self> {
        Ok(Self {
            tables,
            options: ParseOptions::from_config(&config.pipeline)?,
            layout: OutputLayout::new(&config.pipeline.output_dir),
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Stage 1: parse `inputs` and write `parsed/`.
    pub fn run_parse(
        &self,
        inputs: &[PathBuf],
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<ParseOutput> {
        let out = parse::parse_files(inputs, &self.options, progress)?;

        let mut writer = SnapshotWriter::new(self.layout.stage_dir(Stage::Parse));
        writer.add(PARSED_EMAILS, &out.emails)?;
        writer.add(FLAGGED_FOR_REVIEW, &out.flagged)?;
        writer.add(PARSE_STATS, &out.stats)?;
        writer.commit()?;
        Ok(out)
    }

    /// Stage 2: read `parsed/`, write `cleaned/`.
    pub fn run_clean(&self) -> Result<StageStats> {
        let records = self.read_main(Stage::Parse)?;
        let out = clean::clean(records, &self.tables.aliases, &self.tables.denylist)?;

        let mut writer = SnapshotWriter::new(self.layout.stage_dir(Stage::Clean));
        writer.add(CLEANED_EMAILS, &out.emails)?;
        writer.add(REMOVED_ARTIFACTS, &out.removed)?;
        writer.add(REMAINING_FLAGS, &out.remaining_flags)?;
        writer.add(CLEANUP_STATS, &out.stats)?;
        writer.commit()?;
        Ok(out.stats)
    }

    /// Stage 3: read `cleaned/`, write `filtered/`.
    pub fn run_filter(&self) -> Result<StageStats> {
        let records = self.read_main(Stage::Clean)?;
        let out = filter::filter(records, &self.tables.signals, &self.tables.aliases);

        let mut writer = SnapshotWriter::new(self.layout.stage_dir(Stage::Filter));
        writer.add(EMAILS_NO_SPAM, &out.emails)?;
        writer.add(SPAM_DETECTED, &out.spam)?;
        writer.add(FILTER_STATS, &out.stats)?;
        writer.commit()?;
        Ok(out.stats)
    }

    /// All three stages in order.
    pub fn run_all(
        &self,
        inputs: &[PathBuf],
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<Vec<StageStats>> {
        let parsed = self.run_parse(inputs, progress)?;
        let cleaned = self.run_clean()?;
        let filtered = self.run_filter()?;
        Ok(vec![parsed.stats, cleaned, filtered])
    }

    /// Main collection previously written by `stage`.
    pub fn read_main(&self, stage: Stage) -> Result<Vec<Email>> {
        read_json(&self.layout.main_collection(stage))
    }

    /// Statistics previously written by `stage`.
    pub fn read_stats(&self, stage: Stage) -> Result<StageStats> {
        read_stats(&self.layout, stage)
    }
}

/// Read a stage's statistics file from a layout.
pub fn read_stats(layout: &OutputLayout, stage: Stage) -> Result<StageStats> {
    read_json(&layout.stats_file(stage))
}

/// `true` if the main collection of `stage` exists under `root`.
pub fn snapshot_exists(root: &Path, stage: Stage) -> bool {
    OutputLayout::new(root).main_collection(stage).is_file()
}
