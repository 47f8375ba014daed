//! The store contract consumed by this crate.
//!
//! The real on-disk object store, block store, and working-tree
//! materialization all live outside this crate (see spec §1's
//! non-goals); `Store` is the narrow put/get surface the synchronizer
//! and session server need. [`InMemoryStore`] is a minimal
//! implementation used by this crate's own tests and available to
//! downstream crates that want to exercise the protocol without a real
//! repository on disk.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::errors::CofError;
use crate::hash::Hash;
use crate::object::block::block_hash;

/// Storage operations the synchronizer and session server rely on.
///
/// `put_object`/`put_block` are idempotent: storing the same hash twice
/// is a no-op from the caller's perspective. `commit_sequence_hint`
/// affects physical layout only, never object identity.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put_object(&self, hash: Hash, bytes: Bytes) -> Result<(), CofError>;
    async fn get_object(&self, hash: Hash) -> Result<Option<Bytes>, CofError>;
    async fn put_block(&self, bytes: Bytes, commit_sequence_hint: u64) -> Result<Hash, CofError>;
    async fn get_block(&self, hash: Hash) -> Result<Option<Bytes>, CofError>;
    async fn list_refs(&self) -> Result<HashMap<String, Hash>, CofError>;
    async fn set_ref(&self, branch: &str, commit: Hash) -> Result<(), CofError>;
    async fn head_commit(&self) -> Result<Option<Hash>, CofError>;
}

/// A plain in-memory `Store`, for tests and quick prototyping.
#[derive(Default)]
pub struct InMemoryStore {
    objects: RwLock<HashMap<Hash, Bytes>>,
    /// Block bytes plus the `commit_sequence_hint` they were stored under,
    /// retained only so tests can assert on it; it plays no role in
    /// lookups or identity.
    blocks: RwLock<HashMap<Hash, (Bytes, u64)>>,
    refs: RwLock<HashMap<String, Hash>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }

    /// Number of distinct objects currently stored (test helper).
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// The `commit_sequence_hint` a given block was last stored under
    /// (test helper for the fetch supplemental behavior, see SPEC_FULL §4.5).
    pub async fn block_sequence_hint(&self, hash: Hash) -> Option<u64> {
        self.blocks.read().await.get(&hash).map(|(_, seq)| *seq)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_object(&self, hash: Hash, bytes: Bytes) -> Result<(), CofError> {
        self.objects.write().await.insert(hash, bytes);
        Ok(())
    }

    async fn get_object(&self, hash: Hash) -> Result<Option<Bytes>, CofError> {
        Ok(self.objects.read().await.get(&hash).cloned())
    }

    async fn put_block(&self, bytes: Bytes, commit_sequence_hint: u64) -> Result<Hash, CofError> {
        let hash = block_hash(&bytes);
        self.blocks
            .write()
            .await
            .insert(hash, (bytes, commit_sequence_hint));
        Ok(hash)
    }

    async fn get_block(&self, hash: Hash) -> Result<Option<Bytes>, CofError> {
        Ok(self.blocks.read().await.get(&hash).map(|(b, _)| b.clone()))
    }

    async fn list_refs(&self) -> Result<HashMap<String, Hash>, CofError> {
        Ok(self.refs.read().await.clone())
    }

    async fn set_ref(&self, branch: &str, commit: Hash) -> Result<(), CofError> {
        self.refs.write().await.insert(branch.to_string(), commit);
        Ok(())
    }

    async fn head_commit(&self) -> Result<Option<Hash>, CofError> {
        Ok(self.refs.read().await.get("main").copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_object_is_idempotent() {
        let store = InMemoryStore::new();
        let hash = Hash::of(b"object bytes");
        store.put_object(hash, Bytes::from_static(b"object bytes")).await.unwrap();
        store.put_object(hash, Bytes::from_static(b"object bytes")).await.unwrap();
        assert_eq!(store.object_count().await, 1);
    }

    #[tokio::test]
    async fn put_block_returns_the_hash_it_assigned() {
        let store = InMemoryStore::new();
        let stored = store.put_block(Bytes::from_static(b"block data"), 7).await.unwrap();
        assert_eq!(stored, block_hash(b"block data"));
        assert_eq!(store.block_sequence_hint(stored).await, Some(7));
    }

    #[tokio::test]
    async fn refs_round_trip() {
        let store = InMemoryStore::new();
        assert!(store.head_commit().await.unwrap().is_none());
        let commit = Hash::of(b"commit");
        store.set_ref("main", commit).await.unwrap();
        assert_eq!(store.head_commit().await.unwrap(), Some(commit));
        assert_eq!(store.list_refs().await.unwrap().get("main"), Some(&commit));
    }
}
