//! Header block extraction for digest chunks.
//!
//! The header block is the leading run of `Field: value` lines, with
//! continuation lines (leading space or tab) folded into the previous field.
//! The first line that is neither ends the block. Each line is classified by
//! an ordered rule list; the first rule that claims a line decides it.

use std::sync::LazyLock;

use regex::Regex;

/// Field name of printable non-space ASCII other than `:`, then a colon.
static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([!-9;-~]+):(.*)$").expect("valid field regex"));

static REFERENCE_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("valid split regex"));

/// Header fields mapped onto the record. Everything else is discarded.
const RECOGNIZED_FIELDS: [&str; 7] = [
    "from",
    "date",
    "subject",
    "message-id",
    "in-reply-to",
    "references",
    "to",
];

/// Classification of one line while scanning the header block.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HeaderLine<'a> {
    /// Folded into the previous field.
    Continuation(&'a str),
    /// A new field: lower-cased name and trimmed value.
    Field(String, &'a str),
    /// First line that is not part of the header block.
    Boundary,
}

type LineRule = for<'a> fn(&'a str, bool) -> Option<HeaderLine<'a>>;

/// Ordered line rules; first match wins.
const LINE_RULES: [LineRule; 3] = [continuation_rule, field_rule, boundary_rule];

fn continuation_rule(line: &str, has_field: bool) -> Option<HeaderLine<'_>> {
    (has_field && (line.starts_with(' ') || line.starts_with('\t')) && !line.trim().is_empty())
        .then(|| HeaderLine::Continuation(line.trim()))
}

fn field_rule(line: &str, _has_field: bool) -> Option<HeaderLine<'_>> {
    let caps = FIELD_RE.captures(line)?;
    let name = caps.get(1)?.as_str().to_lowercase();
    let value = caps.get(2)?.as_str().trim();
    Some(HeaderLine::Field(name, value))
}

fn boundary_rule(_line: &str, _has_field: bool) -> Option<HeaderLine<'_>> {
    Some(HeaderLine::Boundary)
}

fn classify(line: &str, has_field: bool) -> HeaderLine<'_> {
    LINE_RULES
        .iter()
        .find_map(|rule| rule(line, has_field))
        .unwrap_or(HeaderLine::Boundary)
}

/// Header fields and body of one chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMessage {
    pub from: String,
    pub date: String,
    pub subject: String,
    /// Angle brackets stripped.
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
    pub to: String,
    /// Text after the header block, trimmed.
    pub body: String,
    /// `false` when the chunk had no header lines at all.
    pub found_headers: bool,
}

/// Split a chunk into its recognized header fields and body.
///
/// Never fails: a chunk without headers comes back with empty fields, the
/// whole text as body and `found_headers == false`.
pub fn extract(raw_text: &str) -> ExtractedMessage {
    let lines: Vec<&str> = raw_text.lines().collect();
    let start = lines
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(lines.len());

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut body_start = lines.len();

    for (offset, line) in lines[start..].iter().enumerate() {
        let idx = start + offset;
        match classify(line, !fields.is_empty()) {
            HeaderLine::Continuation(more) => {
                if let Some(last) = fields.last_mut() {
                    if !last.1.is_empty() {
                        last.1.push(' ');
                    }
                    last.1.push_str(more);
                }
            }
            HeaderLine::Field(name, value) => fields.push((name, value.to_string())),
            HeaderLine::Boundary => {
                // A blank separator line is consumed; anything else is body.
                body_start = if line.trim().is_empty() { idx + 1 } else { idx };
                break;
            }
        }
    }

    if fields.is_empty() {
        return ExtractedMessage {
            body: raw_text.trim().to_string(),
            ..Default::default()
        };
    }

    let body = lines
        .get(body_start..)
        .map(|rest| rest.join("\n"))
        .unwrap_or_default()
        .trim()
        .to_string();

    fields.retain(|(name, _)| RECOGNIZED_FIELDS.contains(&name.as_str()));
    let get = |name: &str| get_header(&fields, name).unwrap_or_default();

    ExtractedMessage {
        from: get("from"),
        date: get("date"),
        subject: get("subject"),
        message_id: strip_id(&get("message-id")),
        in_reply_to: get_header(&fields, "in-reply-to")
            .map(|v| strip_id(&v))
            .filter(|v| !v.is_empty()),
        references: split_references(&get("references")),
        to: get("to"),
        body,
        found_headers: true,
    }
}

/// Get the first value for a header name (already lower-cased).
fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// First `<...>` token without its brackets, or the bare value.
fn strip_id(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start + 1..start + end].trim().to_string();
        }
    }
    trimmed.trim_matches(|c| c == '<' || c == '>').to_string()
}

/// Split a `References` value on whitespace and commas, keeping order and repeats.
fn split_references(value: &str) -> Vec<String> {
    REFERENCE_SPLIT_RE
        .split(value)
        .map(|token| token.trim_matches(|c| c == '<' || c == '>'))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
