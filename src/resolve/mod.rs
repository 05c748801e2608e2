//! Stage 2: identity resolution and artifact removal.

pub mod aliases;
pub mod denylist;

use crate::model::address::angle_content;
use crate::model::email::Email;
use crate::model::flag::Flag;

pub use aliases::{CanonicalSender, EntityAliasTable};
pub use denylist::{ArtifactDenylist, DenylistEntry, RemovedArtifact};

/// What the resolver did to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The sender already had an address.
    Qualified,
    /// Rewritten from the alias table.
    Resolved,
    /// No alias; the sender is an intentional anonymous identity.
    Anonymous,
    /// No alias and nothing else known.
    Unknown,
}

/// Rewrites unqualified senders using an injected alias table.
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver<'a> {
    aliases: &'a EntityAliasTable,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(aliases: &'a EntityAliasTable) -> Self {
        Self { aliases }
    }

    /// Candidate lookup keys, most specific first.
    fn candidates(email: &Email) -> [Option<&str>; 3] {
        [
            Some(email.from_raw.as_str()),
            Some(email.from_name.as_str()),
            angle_content(&email.from_raw),
        ]
    }

    /// Resolve one record in place. Only the sender fields and flags change.
    pub fn resolve(&self, email: &mut Email) -> Resolution {
        if !email.from_email.is_empty() {
            return Resolution::Qualified;
        }

        let hit = Self::candidates(email)
            .into_iter()
            .flatten()
            .find_map(|key| self.aliases.lookup(key))
            .cloned();

        match hit {
            Some(canonical) => {
                tracing::trace!(id = %email.id, from = %email.from_raw, to = %canonical.email, "Resolved sender");
                email.from_name = canonical.name;
                email.from_email = canonical.email;
                email.flags.insert(Flag::ResolvedEntity);
                Resolution::Resolved
            }
            None => {
                email.flags.insert(Flag::UnknownSender);
                if self.aliases.is_anonymous(&email.from_raw) {
                    email.flags.insert(Flag::AnonymousSender);
                    Resolution::Anonymous
                } else {
                    Resolution::Unknown
                }
            }
        }
    }
}
