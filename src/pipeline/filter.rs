//! Stage 3: spam removal.

use std::collections::BTreeMap;

use tracing::info;

use crate::model::email::Email;
use crate::model::stats::{Stage, StageStats};
use crate::resolve::EntityAliasTable;
use crate::spam::{Disposition, SpamClassifier, SpamEntry, SpamSignalSet};

/// Everything stage 3 produces.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub emails: Vec<Email>,
    pub spam: Vec<SpamEntry>,
    pub stats: StageStats,
}

/// Run stage 3 over the cleaned collection. Never fails.
pub fn filter(
    records: Vec<Email>,
    signals: &SpamSignalSet,
    aliases: &EntityAliasTable,
) -> FilterOutput {
    let input_count = records.len();
    let classifier = SpamClassifier::new(signals, aliases);

    let mut emails = Vec::with_capacity(records.len());
    let mut spam = Vec::new();
    for record in records {
        match classifier.apply(record) {
            Disposition::Retained(email) => emails.push(email),
            Disposition::Spam(entry) => spam.push(entry),
        }
    }

    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    for entry in &spam {
        for category in &entry.categories {
            *categories.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let mut stats = StageStats::summarize(Stage::Filter, input_count, &emails, spam.len());
    stats.spam_categories = Some(categories);
    info!(
        kept = stats.output_count,
        spam = stats.removed_count,
        suspects = stats.flag_frequency.get("spam-suspect").copied().unwrap_or(0),
        "Filter stage complete"
    );

    FilterOutput { emails, spam, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::email::RawChunk;
    use crate::parser::record::build_email;

    fn record(line: usize, subject: &str, body: &str) -> Email {
        build_email(
            &RawChunk {
                source_file: "cyp-1997.txt".into(),
                line_number: line,
                raw_text: format!("From: x{line}@example.com\nSubject: {subject}\n\n{body}"),
            },
            1997,
            10,
        )
    }

    #[test]
    fn test_filter_routes_and_counts() {
        let signals = SpamSignalSet::embedded().unwrap();
        let aliases = EntityAliasTable::embedded().unwrap();
        let input = vec![
            record(1, "Re: remailer chaining", "Chaining adds latency but helps."),
            record(2, "EARN BIG MONEY", "Send $5 to the first name on the list."),
            record(3, "PGP 2.6 released", "It is risk-free to upgrade."),
        ];
        let out = filter(input, &signals, &aliases);

        assert_eq!(out.emails.len(), 2);
        assert_eq!(out.spam.len(), 1);
        assert_eq!(out.spam[0].email.line_number, 2);
        assert!(out.stats.is_conserved());
        assert_eq!(out.stats.flag_frequency.get("spam-suspect"), Some(&1));
        assert_eq!(
            out.stats.spam_categories.as_ref().unwrap().get("money-scheme"),
            Some(&1)
        );
    }
}
