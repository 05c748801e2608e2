//! Conservative spam classification.
//!
//! A record is only called spam when the evidence is unambiguous: a strong
//! rule, or signals from several independent categories with at least one
//! content rule among them. Everything else is retained, at most with `spam-suspect`.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::signals::{SpamSignalSet, Strength, STRUCTURAL_CATEGORY};
use crate::model::email::Email;
use crate::model::flag::Flag;
use crate::resolve::EntityAliasTable;

/// Bodies at or above this many characters are never `html-commercial`.
const HTML_COMMERCIAL_MAX_CHARS: usize = 5000;

/// Subjects must be longer than this to count as shouting.
const SHOUTING_MIN_CHARS: usize = 20;

static NUMERIC_SENDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{7,}@").expect("valid numeric sender regex"));

static NUMERIC_DOMAIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\d+\.(com|net|org)$").expect("valid numeric domain regex"));

static SHOUTING_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[!$]{2,}").expect("valid punctuation regex"));

static HTML_PITCH_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [r"click\s*here", r"<a\s*href", r"bgcolor", r"font\s*color"]
        .map(|p| Regex::new(p).expect("valid html signal regex"))
});

/// One signal that fired on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalHit {
    pub name: String,
    pub category: String,
    pub strength: Strength,
}

impl SignalHit {
    fn structural(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: STRUCTURAL_CATEGORY.to_string(),
            strength: Strength::Weak,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.category == STRUCTURAL_CATEGORY
    }
}

/// Classification of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub is_spam: bool,
    /// The sender is on the trusted list; `is_spam` is always `false`.
    pub trusted: bool,
    /// Signals in evaluation order: content rules, then structural.
    pub hits: Vec<SignalHit>,
}

impl Verdict {
    /// Distinct categories of all hits, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.hits
            .iter()
            .map(|h| h.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn signal_names(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.name.clone()).collect()
    }
}

/// Side-collection entry for a record classified as spam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamEntry {
    pub email: Email,
    pub categories: Vec<String>,
    pub signals: Vec<String>,
}

/// Where a record goes after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Retained(Email),
    Spam(SpamEntry),
}

/// Stateless per-record classifier over an injected signal set.
#[derive(Debug, Clone)]
pub struct SpamClassifier<'a> {
    signals: &'a SpamSignalSet,
    trusted: BTreeSet<String>,
}

impl<'a> SpamClassifier<'a> {
    /// Build a classifier. Every canonical alias address is trusted.
    pub fn new(signals: &'a SpamSignalSet, aliases: &EntityAliasTable) -> Self {
        let mut trusted = signals.trusted_senders.clone();
        trusted.extend(aliases.canonical_emails().into_iter().map(str::to_string));
        Self { signals, trusted }
    }

    /// Evaluate every signal against a record.
    pub fn detect(&self, email: &Email) -> Vec<SignalHit> {
        let subject = email.subject.to_lowercase();
        let body = email.body.to_lowercase();
        let sender = email.from_email.to_lowercase();

        let mut hits: Vec<SignalHit> = self
            .signals
            .rules
            .iter()
            .filter(|rule| rule.matches(&subject, &body))
            .map(|rule| SignalHit {
                name: rule.name.clone(),
                category: rule.category.clone(),
                strength: rule.strength,
            })
            .collect();

        if !sender.is_empty() && !self.signals.is_legit_numeric(&sender) {
            if NUMERIC_SENDER_RE.is_match(&sender) {
                hits.push(SignalHit::structural("numeric-sender"));
            }
            if NUMERIC_DOMAIN_RE.is_match(&sender) {
                hits.push(SignalHit::structural("numeric-domain"));
            }
        }

        if is_html_commercial(&body) {
            hits.push(SignalHit::structural("html-commercial"));
        }
        if is_shouting(&email.subject) {
            hits.push(SignalHit::structural("shouting-subject"));
        }
        hits
    }

    /// Classify a record without changing it.
    pub fn classify(&self, email: &Email) -> Verdict {
        let hits = self.detect(email);
        let trusted = !email.from_email.is_empty()
            && self.trusted.contains(&email.from_email.to_lowercase());

        let strong = hits.iter().any(|h| h.strength == Strength::Strong);
        let content: BTreeSet<&str> = hits
            .iter()
            .filter(|h| !h.is_structural())
            .map(|h| h.category.as_str())
            .collect();
        let structural = usize::from(hits.iter().any(SignalHit::is_structural));
        let corroborated =
            !content.is_empty() && content.len() + structural >= self.signals.min_signals;

        Verdict {
            is_spam: !trusted && (strong || corroborated),
            trusted,
            hits,
        }
    }

    /// Classify and route a record, appending the matching flag.
    pub fn apply(&self, mut email: Email) -> Disposition {
        let verdict = self.classify(&email);
        if verdict.is_spam {
            email.flags.insert(Flag::Spam);
            tracing::debug!(
                id = %email.id,
                sender = email.sender_display(),
                signals = ?verdict.signal_names(),
                "Classified as spam"
            );
            return Disposition::Spam(SpamEntry {
                categories: verdict.categories(),
                signals: verdict.signal_names(),
                email,
            });
        }
        if !verdict.hits.is_empty() {
            email.flags.insert(Flag::SpamSuspect);
        }
        Disposition::Retained(email)
    }
}

/// Short HTML body carrying at least two commercial markup cues.
fn is_html_commercial(body_lower: &str) -> bool {
    if !(body_lower.contains("<html") || body_lower.contains("<body")) {
        return false;
    }
    if body_lower.chars().count() >= HTML_COMMERCIAL_MAX_CHARS {
        return false;
    }
    HTML_PITCH_RES
        .iter()
        .filter(|re| re.is_match(body_lower))
        .count()
        >= 2
}

/// All-caps subject over the length limit with doubled `!`/`$`.
fn is_shouting(subject: &str) -> bool {
    subject.chars().count() > SHOUTING_MIN_CHARS
        && subject.chars().any(char::is_alphabetic)
        && !subject.chars().any(char::is_lowercase)
        && SHOUTING_PUNCT_RE.is_match(subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::email::RawChunk;
    use crate::parser::record::build_email;

    fn email(from: &str, subject: &str, body: &str) -> Email {
        let chunk = RawChunk {
            source_file: "cyp-1997.txt".into(),
            line_number: 7,
            raw_text: format!("From: {from}\nSubject: {subject}\nMessage-ID: <x@y>\n\n{body}"),
        };
        build_email(&chunk, 1997, 10)
    }

    fn tables() -> (SpamSignalSet, EntityAliasTable) {
        (
            SpamSignalSet::embedded().unwrap(),
            EntityAliasTable::embedded().unwrap(),
        )
    }

    #[test]
    fn test_single_weak_signal_is_retained() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email("x@example.com", "remailer costs", "Order yours, it is risk-free to try.");
        let verdict = classifier.classify(&e);
        assert_eq!(verdict.hits.len(), 1);
        assert!(!verdict.is_spam);
        match classifier.apply(e) {
            Disposition::Retained(e) => assert!(e.flags.contains(Flag::SpamSuspect)),
            Disposition::Spam(_) => panic!("single weak signal must not be spam"),
        }
    }

    #[test]
    fn test_weak_signals_from_two_categories_are_spam() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email(
            "x@example.com",
            "hello",
            "Act now! You are receiving this because you signed up.",
        );
        match classifier.apply(e) {
            Disposition::Spam(entry) => {
                assert_eq!(entry.signals, vec!["receiving-disclaimer", "act-now"]);
                assert_eq!(entry.categories, vec!["commercial-pitch", "list-sales"]);
                assert!(entry.email.flags.contains(Flag::Spam));
            }
            Disposition::Retained(_) => panic!("two independent categories must be spam"),
        }
    }

    #[test]
    fn test_weak_signals_from_one_category_are_retained() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email(
            "activist@eff.org",
            "Clipper hearing",
            "Act now: write your representative about Clipper. Using PGP is risk-free and legal.",
        );
        let verdict = classifier.classify(&e);
        assert_eq!(verdict.signal_names(), vec!["act-now", "risk-free"]);
        assert_eq!(verdict.categories(), vec!["commercial-pitch"]);
        assert!(!verdict.is_spam);
        match classifier.apply(e) {
            Disposition::Retained(e) => assert!(e.flags.contains(Flag::SpamSuspect)),
            Disposition::Spam(_) => panic!("one category must not be spam"),
        }
    }

    #[test]
    fn test_structural_signal_counts_as_one_category() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email(
            "x@example.com",
            "FREE SOFTWARE FOR EVERYONE!!",
            "It is risk-free to install.",
        );
        let verdict = classifier.classify(&e);
        assert_eq!(verdict.signal_names(), vec!["risk-free", "shouting-subject"]);
        assert!(verdict.is_spam);
    }

    #[test]
    fn test_strong_phrase_alone_is_spam() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email("x@example.com", "MAKE MONEY from your desk", "details inside the message");
        assert!(classifier.classify(&e).is_spam);
    }

    #[test]
    fn test_structural_signals_only_corroborate() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email(
            "12345678@991.com",
            "hello there",
            "a perfectly ordinary body of text",
        );
        let verdict = classifier.classify(&e);
        assert_eq!(verdict.signal_names(), vec!["numeric-sender", "numeric-domain"]);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_legit_numeric_domain_is_exempt() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email("76543210@compuserve.com", "crypto export", "a perfectly ordinary body");
        assert!(classifier.detect(&e).is_empty());
    }

    #[test]
    fn test_trusted_sender_never_spam() {
        let (signals, aliases) = tables();
        let classifier = SpamClassifier::new(&signals, &aliases);
        let e = email(
            "Timothy C. May <tcmay@got.net>",
            "How to make money with digital cash",
            "Act now, the list is risk-free.",
        );
        let verdict = classifier.classify(&e);
        assert!(verdict.trusted);
        assert!(!verdict.is_spam);
    }

    #[test]
    fn test_html_commercial_and_shouting() {
        assert!(is_html_commercial(
            "<html><body bgcolor=white><a href=x>click here</a></body></html>"
        ));
        assert!(!is_html_commercial("click here and <a href=x>"));
        assert!(is_shouting("FREE SOFTWARE FOR EVERYONE!!"));
        assert!(!is_shouting("Free software for everyone!!"));
        assert!(!is_shouting("SHORT!!"));
    }
}
