//! Stage 1: raw year files to normalized records.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{DigestError, Result};
use crate::model::email::{Email, FlaggedForReview};
use crate::model::stats::{Stage, StageStats};
use crate::parser::record::build_email;
use crate::parser::segment::{resolve_encoding, ArchiveFile, Delimiter};

/// Compiled parse-stage settings.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub delimiter: Delimiter,
    pub fallback_encoding: &'static Encoding,
    pub empty_body_threshold: usize,
}

impl ParseOptions {
    /// Compile the delimiter and resolve the fallback encoding.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            delimiter: Delimiter::new(&config.delimiter)?,
            fallback_encoding: resolve_encoding(&config.fallback_encoding)?,
            empty_body_threshold: config.empty_body_threshold,
        })
    }
}

/// Everything stage 1 produces.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub emails: Vec<Email>,
    pub flagged: Vec<FlaggedForReview>,
    pub stats: StageStats,
    /// Total bytes read across all input files.
    pub input_bytes: u64,
}

/// Archive files under `config.input_dir` named `<prefix>*.<extension>`,
/// sorted by file name.
pub fn discover_inputs(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let dir = &config.input_dir;
    if !dir.is_dir() {
        return Err(DigestError::NoInputFiles(dir.clone()));
    }
    let suffix = format!(".{}", config.file_extension.trim_start_matches('.'));

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| DigestError::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| name.starts_with(&config.file_prefix) && name.ends_with(&suffix))
        })
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        return Err(DigestError::NoInputFiles(dir.clone()));
    }
    Ok(files)
}

/// Parse one decoded file into records, in file order.
pub fn parse_file(file: &ArchiveFile, options: &ParseOptions) -> Result<Vec<Email>> {
    let chunks = file.split(&options.delimiter)?;
    if file.year == 0 {
        warn!(file = %file.name, "No year in file name; records get year 0");
    }
    Ok(chunks
        .iter()
        .map(|chunk| build_email(chunk, file.year, options.empty_body_threshold))
        .collect())
}

/// Run stage 1 over `paths` in the given order.
///
/// `progress` is called with `(files_done, files_total)` after each file.
pub fn parse_files(
    paths: &[impl AsRef<Path>],
    options: &ParseOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<ParseOutput> {
    let total = paths.len() as u64;
    let mut emails = Vec::new();
    let mut input_bytes = 0u64;

    for (i, path) in paths.iter().enumerate() {
        let file = ArchiveFile::read(path, options.fallback_encoding)?;
        input_bytes += file.byte_len as u64;
        let records = parse_file(&file, options)?;
        info!(file = %file.name, records = records.len(), "Parsed archive file");
        emails.extend(records);
        if let Some(cb) = progress {
            cb(i as u64 + 1, total);
        }
    }

    let flagged: Vec<FlaggedForReview> = emails.iter().filter_map(FlaggedForReview::from_email).collect();
    let stats = StageStats::summarize(Stage::Parse, emails.len(), &emails, 0);
    info!(
        records = stats.output_count,
        flagged = stats.flagged_count,
        "Parse stage complete"
    );

    Ok(ParseOutput {
        emails,
        flagged,
        stats,
        input_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DELIMITER;
    use crate::model::flag::Flag;

    const DELIM: &str = "From cypherpunks@MHonArc.venona  Wed Dec 17 23:17:14 2003";

    fn options() -> ParseOptions {
        ParseOptions::from_config(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_options_reject_bad_delimiter() {
        let cfg = PipelineConfig {
            delimiter: "(".into(),
            ..PipelineConfig::default()
        };
        let err = ParseOptions::from_config(&cfg).unwrap_err();
        assert!(err.is_configuration());
        assert!(Delimiter::new(DEFAULT_DELIMITER).is_ok());
    }

    #[test]
    fn test_discover_inputs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cyp-1995.txt", "cyp-1993.txt", "notes.txt", "cyp-1994.bak"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let cfg = PipelineConfig {
            input_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let files = discover_inputs(&cfg).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cyp-1993.txt", "cyp-1995.txt"]);
    }

    #[test]
    fn test_discover_inputs_missing_dir() {
        let cfg = PipelineConfig {
            input_dir: PathBuf::from("/no/such/archive"),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            discover_inputs(&cfg).unwrap_err(),
            DigestError::NoInputFiles(_)
        ));
    }

    #[test]
    fn test_parse_files_counts_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyp-1994.txt");
        std::fs::write(
            &path,
            format!("{DELIM}\nFrom: hughes\nSubject: a\n\nfirst body text\n{DELIM}\n{DELIM}\nFrom: x@y.com\nDate: 5 Mar 94 12:00:00 GMT\nSubject: b\n\nsecond body text\n"),
        )
        .unwrap();

        let calls = std::cell::Cell::new(0);
        let out = parse_files(&[&path], &options(), Some(&|done, total| {
            assert_eq!((done, total), (1, 1));
            calls.set(calls.get() + 1);
        }))
        .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(out.emails.len(), 3);
        assert_eq!(out.stats.input_count, 3);
        assert!(out.emails[1].flags.contains(Flag::NoHeadersFound));
        assert_eq!(out.emails[2].year, 1994);
        assert_eq!(out.flagged.len(), 3);
        assert!(out.input_bytes > 0);
    }

    #[test]
    fn test_file_without_delimiter_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cyp-1996.txt");
        std::fs::write(&path, "From: a@b.com\n\nno banner here\n").unwrap();
        let err = parse_files(&[&path], &options(), None).unwrap_err();
        assert!(matches!(err, DigestError::NoChunks { .. }));
    }
}
