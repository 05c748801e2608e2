//! Sender decomposition for archive `From` headers.
//!
//! Digest-era headers come in many shapes. Examples:
//! - `"Eric Hughes" <hughes@ah.com>` → name `Eric Hughes`, address `hughes@ah.com`
//! - `tcmay@netcom.com (Timothy C. May)` → name `Timothy C. May`
//! - `hughesNsoda.berkeley.edu` → address `hughes@soda.berkeley.edu` (de-obfuscated)
//! - `gnu` → name `gnu`, no address

use std::sync::LazyLock;

use regex::Regex;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});

static NAME_ANGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"?([^"<]*?)"?\s*<([^>]*)>$"#).expect("valid angle regex"));

static ADDR_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s*\(([^)]*)\)$").expect("valid paren regex"));

/// Ordered rewrites that undo common address mangling. All are applied.
static DEOBFUSCATION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\s*\[at\]\s*", "@"),
        (r"(?i)\s*\[dot\]\s*", "."),
        (r"(?i)\s+at\s+", "@"),
        (r"(?i)\s+dot\s+", "."),
        // `N` standing in for `@`: hughesNsoda.berkeley.edu
        (r"([a-zA-Z0-9._-]+)N([a-zA-Z0-9.-]+\.[a-zA-Z]{2,})", "${1}@${2}"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("valid de-obfuscation regex"),
            replacement,
        )
    })
    .collect()
});

/// How the address of a [`Sender`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderQuality {
    /// The header was empty.
    Missing,
    /// A well-formed address was present.
    Address,
    /// An address was recovered by undoing obfuscation.
    Deobfuscated,
    /// Only a name or bare alias; no address.
    NameOnly,
}

/// A decomposed `From` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Display name (may be empty).
    pub name: String,
    /// Lower-cased `local@domain` address (may be empty).
    pub email: String,
    pub quality: SenderQuality,
}

impl Sender {
    /// Decompose a raw `From` value. Never fails.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self {
                name: String::new(),
                email: String::new(),
                quality: SenderQuality::Missing,
            };
        }

        if let Some(m) = EMAIL_RE.find(trimmed) {
            return Self {
                name: display_name(trimmed),
                email: m.as_str().to_lowercase(),
                quality: SenderQuality::Address,
            };
        }

        let mut rewritten = trimmed.to_string();
        for (re, replacement) in DEOBFUSCATION_RULES.iter() {
            rewritten = re.replace_all(&rewritten, *replacement).into_owned();
        }
        if let Some(m) = EMAIL_RE.find(&rewritten) {
            return Self {
                name: String::new(),
                email: m.as_str().to_lowercase(),
                quality: SenderQuality::Deobfuscated,
            };
        }

        let name = match display_name(trimmed) {
            n if n.is_empty() => angle_content(trimmed).unwrap_or(trimmed).to_string(),
            n => n,
        };
        Self {
            name,
            email: String::new(),
            quality: SenderQuality::NameOnly,
        }
    }
}

/// Content between the last `<` and `>`, trimmed, if any.
pub fn angle_content(raw: &str) -> Option<&str> {
    let start = raw.rfind('<')?;
    let end = raw.rfind('>')?;
    (end > start).then(|| raw[start + 1..end].trim())
}

/// Name part of `"Name" <addr>` or `addr (Name)`, else empty.
fn display_name(raw: &str) -> String {
    if let Some(caps) = NAME_ANGLE_RE.captures(raw) {
        return strip_quotes(caps.get(1).map_or("", |m| m.as_str()));
    }
    if let Some(caps) = ADDR_PAREN_RE.captures(raw) {
        return caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
    }
    String::new()
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}
