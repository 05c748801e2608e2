//! Record assembly: one [`RawChunk`] in, one [`Email`] out.
//!
//! Never fails. Every problem found along the way becomes a flag on the
//! record instead of an error.

use sha2::{Digest, Sha256};

use super::{date, header};
use crate::model::address::{Sender, SenderQuality};
use crate::model::email::{Email, RawChunk};
use crate::model::flag::{Flag, Flags};

/// Name of the identifier scheme implemented by [`compute_id`].
///
/// Artifact denylists record the scheme their ids were computed with, so a
/// change here must come with a new name.
pub const ID_SCHEME: &str = "sha256-16/v1";

/// Separator between hashed fields (ASCII unit separator).
const FIELD_SEPARATOR: u8 = 0x1F;

/// Body substrings that indicate OpenPGP-armored content.
pub const PGP_MARKERS: [&str; 4] = [
    "-----BEGIN PGP SIGNED MESSAGE-----",
    "-----BEGIN PGP SIGNATURE-----",
    "-----BEGIN PGP MESSAGE-----",
    "-----BEGIN PGP PUBLIC KEY BLOCK-----",
];

/// Stable record id: first 16 hex chars of SHA-256 over the provenance and
/// identifying header fields.
pub fn compute_id(
    source_file: &str,
    line_number: usize,
    from_raw: &str,
    date_raw: &str,
    subject: &str,
) -> String {
    let line = line_number.to_string();
    let mut hasher = Sha256::new();
    for (i, part) in [source_file, line.as_str(), from_raw, date_raw, subject]
        .iter()
        .enumerate()
    {
        if i > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}

/// `true` if the body carries any PGP armor marker.
pub fn has_pgp(body: &str) -> bool {
    PGP_MARKERS.iter().any(|marker| body.contains(marker))
}

/// Build the normalized record for one chunk.
pub fn build_email(chunk: &RawChunk, year: i32, empty_body_threshold: usize) -> Email {
    let msg = header::extract(&chunk.raw_text);
    let sender = Sender::parse(&msg.from);
    let date = date::normalize(&msg.date);

    let mut flags = Flags::new();
    if !msg.found_headers {
        flags.insert(Flag::NoHeadersFound);
    }
    if msg.from.trim().is_empty() {
        flags.insert(Flag::MissingFrom);
    }
    if msg.date.trim().is_empty() {
        flags.insert(Flag::MissingDate);
    }
    if msg.subject.trim().is_empty() {
        flags.insert(Flag::MissingSubject);
    }
    if msg.message_id.is_empty() {
        flags.insert(Flag::MissingMessageId);
    }
    if date.corrupted {
        flags.insert(Flag::CorruptedDate);
    }
    if date.parsed.is_none() {
        flags.insert(Flag::UnparsedDate);
    }
    match sender.quality {
        SenderQuality::Deobfuscated => {
            flags.insert(Flag::ObfuscatedEmail);
        }
        SenderQuality::Missing | SenderQuality::NameOnly => {
            flags.insert(Flag::NoEmailFound);
        }
        SenderQuality::Address => {}
    }

    let body_length = msg.body.chars().count();
    if body_length < empty_body_threshold {
        flags.insert(Flag::EmptyBody);
    }

    Email {
        id: compute_id(
            &chunk.source_file,
            chunk.line_number,
            &msg.from,
            &msg.date,
            &msg.subject,
        ),
        year,
        source_file: chunk.source_file.clone(),
        line_number: chunk.line_number,
        from_raw: msg.from,
        from_name: sender.name,
        from_email: sender.email,
        date_raw: msg.date,
        date_parsed: date.parsed,
        subject: msg.subject,
        message_id: msg.message_id,
        in_reply_to: msg.in_reply_to,
        references: msg.references,
        to: msg.to,
        has_pgp: has_pgp(&msg.body),
        body: msg.body,
        body_length,
        flags,
    }
}
