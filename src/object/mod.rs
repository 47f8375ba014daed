//! Object model: the four immutable, content-addressed kinds exchanged by
//! the synchronizer — [`commit::Commit`], [`tree::Tree`], [`blob::Blob`],
//! and raw [`block`] bytes.
//!
//! Commits, trees, and blobs are JSON-serialized structured objects;
//! blocks are opaque byte ranges with no structure of their own. Object
//! identity is the BLAKE3 hash of the serialized form prefixed with the
//! object kind, so a tree and a blob that happen to serialize to the same
//! bytes still hash differently.

pub mod blob;
pub mod block;
pub mod commit;
pub mod signature;
pub mod tree;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::CofError;
use crate::hash::Hash;

/// Discriminates the three structured object kinds. Blocks are not an
/// `ObjectKind`: they are addressed directly by the hash of their raw
/// bytes, with no kind prefix (see [`block::block_hash`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
        }
    }
}

/// Common interface for the three structured object kinds.
///
/// Default `to_bytes`/`from_bytes` serialize via `serde_json`; a type only
/// needs to say what kind it is. Override either method if an object ever
/// needs a non-JSON wire form.
pub trait Object: Serialize + DeserializeOwned + Sized {
    fn kind() -> ObjectKind;

    fn to_bytes(&self) -> Result<Vec<u8>, CofError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn from_bytes(data: &[u8]) -> Result<Self, CofError> {
        serde_json::from_slice(data)
            .map_err(|e| CofError::Custom(format!("failed to parse {}: {e}", Self::kind().as_str())))
    }

    /// Content hash: BLAKE3 of `"<kind> <len>\0<payload>"`, mirroring the
    /// type-tagged hashing scheme used for Git objects so that two
    /// different kinds never collide even if their payload bytes match.
    fn hash(&self) -> Result<Hash, CofError> {
        let payload = self.to_bytes()?;
        Ok(hash_with_kind(Self::kind(), &payload))
    }
}

fn hash_with_kind(kind: ObjectKind, payload: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(payload.len() + kind.as_str().len() + 16);
    buf.extend_from_slice(kind.as_str().as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(payload.len().to_string().as_bytes());
    buf.push(0);
    buf.extend_from_slice(payload);
    Hash::of(&buf)
}
