//! The canonical email record and its transient and review views.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::flag::Flags;

/// A message-sized slice of a year file, as cut by the segmenter.
///
/// Transient: consumed by the record builder and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    /// File name (not path) of the archive the chunk came from.
    pub source_file: String,
    /// 1-based line number of the delimiter that opens the chunk.
    pub line_number: usize,
    /// Text between this delimiter and the next (or end of file).
    pub raw_text: String,
}

/// One normalized message. Persisted at every stage boundary.
///
/// Provenance, header and body fields are write-once. Only the identity
/// resolver touches `from_name`/`from_email`, and flags only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Stable content-derived identifier (see [`crate::parser::record::ID_SCHEME`]).
    pub id: String,
    pub year: i32,
    pub source_file: String,
    pub line_number: usize,

    pub from_raw: String,
    pub from_name: String,
    /// Lower-cased address; empty when none could be recovered.
    pub from_email: String,

    pub date_raw: String,
    /// Serialized as RFC 3339 with an explicit offset, or `null`.
    pub date_parsed: Option<DateTime<FixedOffset>>,

    pub subject: String,
    /// Angle brackets stripped; empty when absent.
    pub message_id: String,
    pub in_reply_to: Option<String>,
    /// Source order, repeats kept.
    pub references: Vec<String>,
    pub to: String,

    pub body: String,
    /// Always `body.chars().count()`.
    pub body_length: usize,
    pub has_pgp: bool,

    pub flags: Flags,
}

impl Email {
    /// `true` if `body_length` still agrees with `body`.
    pub fn body_length_consistent(&self) -> bool {
        self.body_length == self.body.chars().count()
    }

    /// Sender as shown in summaries: address if known, otherwise the raw header.
    pub fn sender_display(&self) -> &str {
        if self.from_email.is_empty() {
            &self.from_raw
        } else {
            &self.from_email
        }
    }
}

/// Audit entry for a record that carries at least one flag.
///
/// A view over the record: operators can review these without scanning
/// the whole corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedForReview {
    pub id: String,
    pub year: i32,
    pub source_file: String,
    pub line_number: usize,
    pub subject: String,
    pub from_raw: String,
    pub from_email: String,
    pub flags: Flags,
}

impl FlaggedForReview {
    /// Build the review entry for `email`, or `None` if it has no flags.
    pub fn from_email(email: &Email) -> Option<Self> {
        if email.flags.is_empty() {
            return None;
        }
        Some(Self {
            id: email.id.clone(),
            year: email.year,
            source_file: email.source_file.clone(),
            line_number: email.line_number,
            subject: email.subject.clone(),
            from_raw: email.from_raw.clone(),
            from_email: email.from_email.clone(),
            flags: email.flags.clone(),
        })
    }
}
