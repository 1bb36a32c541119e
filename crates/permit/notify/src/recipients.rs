//! Recipients and identity-based deduplication

use permit_types::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a recipient relates to the permit. Informational only: it never
/// decides whether someone is notified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    Creator,
    Issuer,
    #[serde(rename = "HOD")]
    Hod,
    Approver,
    Receiver,
    Submitter,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Creator => "Creator",
            Relationship::Issuer => "Issuer",
            Relationship::Hod => "HOD",
            Relationship::Approver => "Approver",
            Relationship::Receiver => "Receiver",
            Relationship::Submitter => "Submitter",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub identity: Identity,
    pub relationship: Relationship,
}

/// Ordered recipient list, unique by identity key (email address)
#[derive(Clone, Debug, Default)]
pub struct RecipientSet {
    recipients: Vec<Recipient>,
    seen: HashSet<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a recipient. If the identity is already present the existing
    /// entry and its relationship are kept. Returns whether it was added.
    pub fn insert(&mut self, identity: Identity, relationship: Relationship) -> bool {
        let key = identity.identity_key();
        if key.is_empty() {
            tracing::debug!(user = %identity.id, "Skipping recipient without an email address");
            return false;
        }
        if !self.seen.insert(key) {
            return false;
        }
        self.recipients.push(Recipient {
            identity,
            relationship,
        });
        true
    }

    pub fn extend(&mut self, identities: impl IntoIterator<Item = Identity>, relationship: Relationship) {
        for identity in identities {
            self.insert(identity, relationship);
        }
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn into_vec(self) -> Vec<Recipient> {
        self.recipients
    }
}
