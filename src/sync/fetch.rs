//! Fetch flow: recursive commit -> tree -> blob -> block traversal that
//! pulls the transitive closure of a commit from a remote into the local
//! store, honoring an optional commit-depth bound and tree-path filter.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::errors::CofError;
use crate::hash::Hash;
use crate::object::block::verify_block;
use crate::object::tree::EntryKind;
use crate::object::{Object, blob::Blob, commit::Commit, tree::Tree};
use crate::protocol::client::Client;
use crate::remote::RemoteRepository;
use crate::store::Store;
use crate::sync::pathfilter;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Pull the transitive closure of `commit_hash` from `remote` into `store`.
///
/// `depth` bounds how far back along the commit chain to walk (`None` is
/// unbounded, `Some(1)` fetches only the tip). `path_filter`, when set,
/// restricts which tree entries are descended into — the tree object
/// itself is always fetched in full so its stored hash matches the
/// remote's exactly; only the walk into filtered-out sub-trees/blobs is
/// skipped.
pub async fn fetch(
    client: &mut dyn Client,
    remote: &RemoteRepository,
    store: &dyn Store,
    commit_hash: Hash,
    depth: Option<u32>,
    path_filter: Option<&str>,
) -> Result<(), CofError> {
    let mut ctx = FetchCtx {
        client,
        remote,
        store,
        depth,
        path_filter,
        visited: HashSet::new(),
    };
    ctx.fetch_commit(commit_hash, 0).await
}

struct FetchCtx<'a> {
    client: &'a mut dyn Client,
    remote: &'a RemoteRepository,
    store: &'a dyn Store,
    depth: Option<u32>,
    path_filter: Option<&'a str>,
    visited: HashSet<Hash>,
}

impl<'a> FetchCtx<'a> {
    /// Fetch one structured object's serialized bytes, preferring an
    /// already-persisted local copy over a network round trip. This is
    /// what makes re-running `fetch` over an already-synced commit issue
    /// no additional requests: the local store, not the per-call
    /// `visited` set, is what survives across invocations.
    async fn fetch_object_bytes(&mut self, hash: Hash) -> Result<bytes::Bytes, CofError> {
        if let Some(bytes) = self.store.get_object(hash).await? {
            return Ok(bytes);
        }
        let bytes = self
            .client
            .request_object(self.remote, hash)
            .await
            .ok_or_else(|| CofError::NotFound(hash.to_hex()))?;
        self.store.put_object(hash, bytes.clone()).await?;
        Ok(bytes)
    }

    fn fetch_commit(&mut self, hash: Hash, current_depth: u32) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.fetch_object_bytes(hash).await?;
            let commit = Commit::from_bytes(&bytes)?;

            if let Some(parent) = commit.parent {
                let should_recurse = match self.depth {
                    None => true,
                    Some(depth) => current_depth < depth.saturating_sub(1),
                };
                if should_recurse {
                    self.fetch_commit(parent, current_depth + 1).await?;
                }
            }

            self.fetch_tree(commit.tree_root, String::new(), commit.sequence).await
        })
    }

    fn fetch_tree(&mut self, hash: Hash, path: String, sequence_hint: u64) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.fetch_object_bytes(hash).await?;
            let tree = Tree::from_bytes(&bytes)?;

            for (name, entry) in &tree.entries {
                let child_path = pathfilter::join(&path, name);
                if let Some(filter) = self.path_filter {
                    if !pathfilter::matches(&child_path, filter) {
                        continue;
                    }
                }
                match entry.kind {
                    EntryKind::Dir => self.fetch_tree(entry.hash, child_path, sequence_hint).await?,
                    EntryKind::File => self.fetch_blob(entry.hash, sequence_hint).await?,
                }
            }
            Ok(())
        })
    }

    fn fetch_blob(&mut self, hash: Hash, sequence_hint: u64) -> BoxFuture<'_, Result<(), CofError>> {
        Box::pin(async move {
            if self.visited.contains(&hash) {
                return Ok(());
            }
            self.visited.insert(hash);

            let bytes = self.fetch_object_bytes(hash).await?;
            let blob = Blob::from_bytes(&bytes)?;

            for block_hash in &blob.block_hashes {
                if self.visited.contains(block_hash) {
                    continue;
                }
                self.visited.insert(*block_hash);

                if self.store.get_block(*block_hash).await?.is_some() {
                    continue;
                }

                let data = self
                    .client
                    .request_block(self.remote, *block_hash)
                    .await
                    .ok_or_else(|| CofError::NotFound(block_hash.to_hex()))?;
                if !verify_block(&data, *block_hash) {
                    return Err(CofError::IntegrityViolation {
                        expected: block_hash.to_hex(),
                        actual: crate::object::block::block_hash(&data).to_hex(),
                    });
                }
                self.store.put_block(data, sequence_hint).await?;
            }
            Ok(())
        })
    }
}
