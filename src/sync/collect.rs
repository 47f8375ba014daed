//! Collect flow: the push-side mirror of [`crate::sync::fetch`]. Walks a
//! commit's transitive closure against the *local* store and accumulates
//! every object and block into the flat list [`Client::push_objects`]
//! expects, instead of writing anywhere.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::errors::CofError;
use crate::hash::Hash;
use crate::object::tree::EntryKind;
use crate::object::{blob::Blob, commit::Commit, tree::Tree, Object};
use crate::store::Store;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// One accumulated push item: `(hash, is_block, commit_sequence_hint, bytes)`,
/// the shape [`crate::protocol::client::Client::push_objects`] takes
/// directly.
pub type PushItem = (Hash, bool, u64, Bytes);

/// Collect the full transitive closure of `commit_hash` from `store`, with
/// no depth bound and no path filter (push always ships everything the
/// local history needs to stay self-contained).
pub async fn collect(store: &dyn Store, commit_hash: Hash) -> Result<Vec<PushItem>, CofError> {
    let mut ctx = CollectCtx {
        store,
        visited: HashSet::new(),
        out: Vec::new(),
    };
    ctx.collect_commit(commit_hash).await?;
    Ok(ctx.out)
}

struct CollectCtx<'a> {
    store: &'a dyn Store,
    visited: HashSet<Hash>,
    out: Vec<PushItem>,
}

impl<'a> CollectCtx<'a> {
    async fn get_object(&self, hash: Hash) -> Result<Bytes, CofError> {
        self.store
            .get_object(hash)
            .await?
            .ok_or_else(|| CofError::NotFound(hash.to_hex()))
    }

    fn collect_commit(&mut self, hash: Hash) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.get_object(hash).await?;
            let commit = Commit::from_bytes(&bytes)?;
            self.out.push((hash, false, 0, bytes));

            if let Some(parent) = commit.parent {
                self.collect_commit(parent).await?;
            }
            self.collect_tree(commit.tree_root, commit.sequence).await
        })
    }

    fn collect_tree(&mut self, hash: Hash, sequence_hint: u64) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.get_object(hash).await?;
            let tree = Tree::from_bytes(&bytes)?;
            self.out.push((hash, false, 0, bytes));

            for entry in tree.entries.values() {
                match entry.kind {
                    EntryKind::Dir => self.collect_tree(entry.hash, sequence_hint).await?,
                    EntryKind::File => self.collect_blob(entry.hash, sequence_hint).await?,
                }
            }
            Ok(())
        })
    }

    fn collect_blob(&mut self, hash: Hash, sequence_hint: u64) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.get_object(hash).await?;
            let blob = Blob::from_bytes(&bytes)?;
            self.out.push((hash, false, 0, bytes));

            for block_hash in &blob.block_hashes {
                if self.visited.contains(block_hash) {
                    continue;
                }
                self.visited.insert(*block_hash);

                let data = self
                    .store
                    .get_block(*block_hash)
                    .await?
                    .ok_or_else(|| CofError::NotFound(block_hash.to_hex()))?;
                self.out.push((*block_hash, true, sequence_hint, data));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::block::block_hash;
    use crate::object::signature::Signature;
    use crate::object::tree::TreeEntry;
    use crate::store::InMemoryStore;

    async fn seed_single_commit_repo(store: &InMemoryStore) -> Hash {
        let block = Bytes::from_static(b"hello world");
        let block_h = block_hash(&block);
        store.put_block(block.clone(), 0).await.unwrap();

        let blob = Blob::new(vec![block_h], block.len() as u64, 0o100644);
        let blob_h = blob.hash().unwrap();
        store.put_object(blob_h, Bytes::from(blob.to_bytes().unwrap())).await.unwrap();

        let mut tree = Tree::new();
        tree.entries.insert("hello.txt".to_string(), TreeEntry { kind: EntryKind::File, hash: blob_h });
        let tree_h = tree.hash().unwrap();
        store.put_object(tree_h, Bytes::from(tree.to_bytes().unwrap())).await.unwrap();

        let commit = Commit::new(None, tree_h, Signature::new("t", "t@example.com", 0), "c", 0);
        let commit_h = commit.hash().unwrap();
        store.put_object(commit_h, Bytes::from(commit.to_bytes().unwrap())).await.unwrap();

        commit_h
    }

    #[tokio::test]
    async fn collects_commit_tree_blob_and_block() {
        let store = InMemoryStore::new();
        let commit_h = seed_single_commit_repo(&store).await;

        let items = collect(&store, commit_h).await.unwrap();
        assert_eq!(items.len(), 4);
        assert!(items.iter().any(|(h, is_block, _, _)| *h == commit_h && !is_block));
        assert!(items.iter().any(|(_, is_block, _, _)| *is_block));
    }

    #[tokio::test]
    async fn missing_local_object_errors() {
        let store = InMemoryStore::new();
        let result = collect(&store, Hash::of(b"never stored")).await;
        assert!(matches!(result, Err(CofError::NotFound(_))));
    }
}
