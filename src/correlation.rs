use std::fmt;
use uuid::Uuid;

use crate::domain::Address;

/// Prefix shared by every reply inbox subject.
pub const INBOX_PREFIX: &str = "_INBOX";

/// Unique per-call reply identifier.
///
/// Each invocation gets a fresh inbox subject built from one of these, so the
/// reply subject alone correlates a response with its call. Nothing else is
/// carried in-band.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InboxId(String);

impl InboxId {
    /// Generate a new random inbox id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reply subject for this id, scoped to one transport instance.
    pub fn subject(&self, transport_id: &str) -> Address {
        Address::from(format!("{INBOX_PREFIX}.{transport_id}.{}", self.0))
    }
}

impl fmt::Display for InboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_generate_unique() {
        // ---
        let id1 = InboxId::generate();
        let id2 = InboxId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_subject_format() {
        // ---
        let id = InboxId::generate();
        assert_eq!(id.as_str().len(), 32);

        let subject = id.subject("node-a");
        assert_eq!(subject.as_str(), format!("_INBOX.node-a.{id}"));
    }
}
