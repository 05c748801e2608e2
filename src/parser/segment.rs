//! Digest segmentation.
//!
//! A year file is a concatenation of messages, each opened by the same
//! fixed banner line written by the archiving software. The segmenter cuts
//! the decoded text on that line and yields one [`RawChunk`] per message,
//! lazily, in file order. Tolerant of:
//!
//! - Mixed `\n` and `\r\n` line endings
//! - A UTF-8 BOM at the start of the file
//! - Bytes that are not valid UTF-8 (the whole file is re-decoded with the
//!   fallback encoding, which accepts every byte)
//! - Preamble text before the first delimiter (skipped with a warning)

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use encoding_rs::Encoding;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{DigestError, Result};
use crate::model::email::RawChunk;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(19|20)\d{2}").expect("valid year regex"));

/// Compiled delimiter-line matcher.
#[derive(Debug, Clone)]
pub struct Delimiter(Regex);

impl Delimiter {
    /// Compile a delimiter pattern. The pattern must match a whole line.
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| DigestError::InvalidPattern {
                context: "pipeline.delimiter".to_string(),
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// Check whether a single line (without its terminator) is a delimiter.
    pub fn is_match(&self, line: &str) -> bool {
        self.0.is_match(line)
    }
}

/// One decoded archive file, held in memory for the duration of the stage.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub path: PathBuf,
    /// File name used as record provenance.
    pub name: String,
    /// Year taken from the file name, `0` if none.
    pub year: i32,
    /// Size of the file on disk in bytes.
    pub byte_len: usize,
    pub text: String,
}

impl ArchiveFile {
    /// Read and decode an archive file. Bad bytes never fail the read.
    pub fn read(path: impl AsRef<Path>, fallback: &'static Encoding) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| DigestError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            year: year_from_file_name(&name),
            byte_len: bytes.len(),
            text: decode_archive(&bytes, fallback),
            name,
        })
    }

    /// Iterate over the chunks of this file.
    pub fn chunks<'a>(&'a self, delimiter: &'a Delimiter) -> Segmenter<'a> {
        Segmenter::new(&self.text, &self.name, delimiter)
    }

    /// Collect all chunks, failing if a non-empty file has none.
    pub fn split(&self, delimiter: &Delimiter) -> Result<Vec<RawChunk>> {
        let chunks: Vec<RawChunk> = self.chunks(delimiter).collect();
        if chunks.is_empty() && !self.text.trim().is_empty() {
            return Err(DigestError::NoChunks {
                path: self.path.clone(),
                bytes: self.byte_len,
            });
        }
        debug!(file = %self.name, chunks = chunks.len(), "Segmented archive");
        Ok(chunks)
    }
}

/// Resolve an encoding label (e.g. `"windows-1252"`, `"latin1"`).
pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        DigestError::config(
            "pipeline.fallback_encoding",
            format!("unknown encoding label '{label}'"),
        )
    })
}

/// Decode raw file bytes.
///
/// Tries UTF-8 first, then decodes the whole file with `fallback`.
pub fn decode_archive(bytes: &[u8], fallback: &'static Encoding) -> String {
    let bytes = bytes
        .strip_prefix(&[0xEF, 0xBB, 0xBF][..])
        .unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, had_errors) = fallback.decode(bytes);
            if had_errors {
                warn!(
                    encoding = fallback.name(),
                    "Undecodable bytes replaced with U+FFFD"
                );
            }
            decoded.into_owned()
        }
    }
}

/// Four-digit year embedded in an archive file name (`cyp-1994.txt` → 1994).
pub fn year_from_file_name(name: &str) -> i32 {
    YEAR_RE
        .find(name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Lazy chunk iterator over one decoded file.
///
/// Re-running over the same text always yields the same boundaries.
pub struct Segmenter<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    delimiter: &'a Delimiter,
    source_file: &'a str,
    /// Opening line number and body lines of the chunk being collected.
    current: Option<(usize, Vec<&'a str>)>,
    preamble_lines: usize,
}

impl<'a> Segmenter<'a> {
    pub fn new(text: &'a str, source_file: &'a str, delimiter: &'a Delimiter) -> Self {
        Self {
            lines: text.lines().enumerate(),
            delimiter,
            source_file,
            current: None,
            preamble_lines: 0,
        }
    }
}

fn make_chunk(source_file: &str, line_number: usize, lines: Vec<&str>) -> RawChunk {
    RawChunk {
        source_file: source_file.to_string(),
        line_number,
        raw_text: lines.join("\n"),
    }
}

impl Iterator for Segmenter<'_> {
    type Item = RawChunk;

    fn next(&mut self) -> Option<RawChunk> {
        let source_file = self.source_file;
        for (idx, line) in self.lines.by_ref() {
            let line_number = idx + 1;

            if self.delimiter.is_match(line) {
                match self.current.replace((line_number, Vec::new())) {
                    Some((start, lines)) => return Some(make_chunk(source_file, start, lines)),
                    None => {
                        if self.preamble_lines > 0 {
                            warn!(
                                file = source_file,
                                lines = self.preamble_lines,
                                "Skipping text before the first delimiter"
                            );
                        }
                        continue;
                    }
                }
            }

            match self.current.as_mut() {
                Some((_, lines)) => lines.push(line),
                None if !line.trim().is_empty() => self.preamble_lines += 1,
                None => {}
            }
        }

        // Trailing chunk: kept only if it has content.
        let (start, lines) = self.current.take()?;
        if lines.iter().all(|l| l.trim().is_empty()) {
            return None;
        }
        Some(make_chunk(source_file, start, lines))
    }
}
