//! Stage 2: artifact removal and sender resolution.

use tracing::info;

use crate::error::Result;
use crate::model::email::{Email, FlaggedForReview};
use crate::model::stats::{Stage, StageStats};
use crate::resolve::{ArtifactDenylist, EntityAliasTable, IdentityResolver, RemovedArtifact, Resolution};

/// Everything stage 2 produces.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    pub emails: Vec<Email>,
    pub removed: Vec<RemovedArtifact>,
    pub remaining_flags: Vec<FlaggedForReview>,
    pub stats: StageStats,
}

/// Run stage 2 over the parsed collection.
///
/// Fails before touching any record if the denylist does not fit the input.
pub fn clean(
    records: Vec<Email>,
    aliases: &EntityAliasTable,
    denylist: &ArtifactDenylist,
) -> Result<CleanOutput> {
    let input_count = records.len();
    denylist.validate_against(&records)?;

    let (mut emails, removed) = denylist.partition(records);
    let resolver = IdentityResolver::new(aliases);

    let (mut resolved, mut anonymous, mut unknown) = (0usize, 0usize, 0usize);
    for email in &mut emails {
        match resolver.resolve(email) {
            Resolution::Resolved => resolved += 1,
            Resolution::Anonymous => anonymous += 1,
            Resolution::Unknown => unknown += 1,
            Resolution::Qualified => {}
        }
    }

    let remaining_flags: Vec<FlaggedForReview> =
        emails.iter().filter_map(FlaggedForReview::from_email).collect();
    let stats = StageStats::summarize(Stage::Clean, input_count, &emails, removed.len());
    info!(
        kept = stats.output_count,
        removed = stats.removed_count,
        resolved,
        anonymous,
        unknown,
        "Clean stage complete"
    );

    Ok(CleanOutput {
        emails,
        removed,
        remaining_flags,
        stats,
    })
}
