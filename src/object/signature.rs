//! Author/committer identity stamped on a [`crate::object::commit::Commit`].

use serde::{Deserialize, Serialize};

/// Name, email, and timestamp of a commit's author or committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Unix timestamp, seconds.
    pub timestamp: i64,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64) -> Signature {
        Signature {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.timestamp)
    }
}
