//! Quality and processing annotations attached to records.

use serde::{Deserialize, Serialize};

/// A single annotation describing a quality or processing event.
///
/// Serialized as its kebab-case name (e.g. `"unparsed-date"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flag {
    // Parse stage
    NoHeadersFound,
    MissingFrom,
    MissingDate,
    MissingSubject,
    MissingMessageId,
    UnparsedDate,
    CorruptedDate,
    ObfuscatedEmail,
    NoEmailFound,
    EmptyBody,

    // Clean stage
    ResolvedEntity,
    UnknownSender,
    AnonymousSender,

    // Filter stage
    SpamSuspect,
    Spam,
}

impl Flag {
    /// The serialized name of the flag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoHeadersFound => "no-headers-found",
            Self::MissingFrom => "missing-from",
            Self::MissingDate => "missing-date",
            Self::MissingSubject => "missing-subject",
            Self::MissingMessageId => "missing-message-id",
            Self::UnparsedDate => "unparsed-date",
            Self::CorruptedDate => "corrupted-date",
            Self::ObfuscatedEmail => "obfuscated-email",
            Self::NoEmailFound => "no-email-found",
            Self::EmptyBody => "empty-body",
            Self::ResolvedEntity => "resolved-entity",
            Self::UnknownSender => "unknown-sender",
            Self::AnonymousSender => "anonymous-sender",
            Self::SpamSuspect => "spam-suspect",
            Self::Spam => "spam",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free, append-only set of flags.
///
/// There is deliberately no way to remove a flag once added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(Vec<Flag>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a flag. Returns `false` if it was already present.
    pub fn insert(&mut self, flag: Flag) -> bool {
        if self.0.contains(&flag) {
            return false;
        }
        self.0.push(flag);
        true
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }

    /// `true` if every flag in `other` is also present here.
    pub fn is_superset_of(&self, other: &Flags) -> bool {
        other.iter().all(|f| self.contains(f))
    }
}

impl<'a> IntoIterator for &'a Flags {
    type Item = Flag;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Flag>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut flags = Flags::new();
        for f in iter {
            flags.insert(f);
        }
        flags
    }
}
