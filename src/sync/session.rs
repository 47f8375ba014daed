//! High-level clone/pull/push orchestration, tying the Session Client, the
//! Graph Synchronizer's `fetch`/`collect`, and the local `Store` together
//! the way SPEC_FULL §2's "Data flow on clone/pull" and "Data flow on
//! push" paragraphs describe. `fetch`/`collect` themselves know nothing
//! about refs; this module is the thin layer that picks a branch, walks
//! the graph, and — only after that walk fully succeeds — mutates the
//! local ref.

use crate::errors::CofError;
use crate::hash::Hash;
use crate::protocol::client::Client;
use crate::remote::RemoteRepository;
use crate::store::Store;
use crate::sync::{collect, fetch};

/// Clone or pull `branch` from `remote` into `store`.
///
/// Requests the remote's ref list, resolves `branch` to a commit hash,
/// walks the transitive closure via [`fetch`] (honoring `depth` and
/// `path_filter`), and only on a fully successful walk advances the local
/// ref to that commit. A failed or partial walk never touches the local
/// ref, so a crash or abort mid-clone leaves the previous ref (if any)
/// intact — SPEC_FULL §5's "no refs are updated on a cancelled fetch".
///
/// Returns the commit hash the ref now points at.
pub async fn clone_or_pull(
    client: &mut dyn Client,
    remote: &RemoteRepository,
    store: &dyn Store,
    branch: &str,
    depth: Option<u32>,
    path_filter: Option<&str>,
) -> Result<Hash, CofError> {
    let refs = client.request_refs(remote).await;
    let commit_hash = *refs
        .get(branch)
        .ok_or_else(|| CofError::NotFound(format!("branch {branch} not found on remote")))?;

    fetch(client, remote, store, commit_hash, depth, path_filter).await?;

    store.set_ref(branch, commit_hash).await?;
    Ok(commit_hash)
}

/// Push `branch`'s local history to `remote`.
///
/// Resolves `branch` to a commit hash in the local store, walks its
/// transitive closure via [`collect`], and ships every accumulated object
/// and block through [`Client::push_objects`] in one batch. Returns
/// whether the remote accepted the whole push; per SPEC_FULL §4.3, a
/// single rejected object aborts the batch, so a `false` here means
/// nothing (or only a server-observable partial prefix) landed.
pub async fn push(
    client: &mut dyn Client,
    remote: &RemoteRepository,
    store: &dyn Store,
    branch: &str,
) -> Result<bool, CofError> {
    let refs = store.list_refs().await?;
    let commit_hash = *refs
        .get(branch)
        .ok_or_else(|| CofError::NotFound(format!("branch {branch} not found locally")))?;

    let items = collect(store, commit_hash).await?;
    Ok(client.push_objects(remote, &items).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::block::block_hash;
    use crate::object::signature::Signature;
    use crate::object::tree::{EntryKind, Tree, TreeEntry};
    use crate::object::{Object, blob::Blob, commit::Commit};
    use crate::protocol::server::SessionServer;
    use crate::protocol::client::SessionClient;
    use crate::config::NetworkConfig;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    async fn put_object<O: Object>(store: &InMemoryStore, obj: &O) -> Hash {
        let hash = obj.hash().unwrap();
        store.put_object(hash, bytes::Bytes::from(obj.to_bytes().unwrap())).await.unwrap();
        hash
    }

    async fn spawn_remote(store: Arc<InMemoryStore>) -> RemoteRepository {
        let server = SessionServer::bind("127.0.0.1:0", "repo", store, NetworkConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.serve().await;
        });
        RemoteRepository {
            name: "origin".into(),
            host: addr.ip().to_string(),
            port: addr.port(),
            repo_path: "repo".into(),
            protocol: crate::remote::RemoteProtocol::Udp,
        }
    }

    #[tokio::test]
    async fn clone_updates_the_local_ref_on_success() {
        let remote_store = Arc::new(InMemoryStore::new());
        let block = bytes::Bytes::from_static(b"hi");
        remote_store.put_block(block.clone(), 0).await.unwrap();
        let blob = Blob::new(vec![block_hash(&block)], block.len() as u64, 0o100644);
        let blob_h = put_object(&remote_store, &blob).await;
        let mut tree = Tree::new();
        tree.entries.insert("f".to_string(), TreeEntry { kind: EntryKind::File, hash: blob_h });
        let tree_h = put_object(&remote_store, &tree).await;
        let commit = Commit::new(None, tree_h, Signature::new("t", "t@example.com", 0), "c", 0);
        let commit_h = put_object(&remote_store, &commit).await;
        remote_store.set_ref("main", commit_h).await.unwrap();

        let remote = spawn_remote(Arc::clone(&remote_store)).await;
        let mut client = SessionClient::new(NetworkConfig { timeout_ms: 300, max_retries: 2, ..NetworkConfig::default() });
        client.open().await.unwrap();
        let local_store = InMemoryStore::new();

        let resolved = clone_or_pull(&mut client, &remote, &local_store, "main", None, None).await.unwrap();
        assert_eq!(resolved, commit_h);
        assert_eq!(local_store.head_commit().await.unwrap(), Some(commit_h));
    }

    #[tokio::test]
    async fn clone_of_unknown_branch_errors_without_touching_refs() {
        let remote_store = Arc::new(InMemoryStore::new());
        let remote = spawn_remote(Arc::clone(&remote_store)).await;
        let mut client = SessionClient::new(NetworkConfig { timeout_ms: 300, max_retries: 2, ..NetworkConfig::default() });
        client.open().await.unwrap();
        let local_store = InMemoryStore::new();

        let result = clone_or_pull(&mut client, &remote, &local_store, "main", None, None).await;
        assert!(matches!(result, Err(CofError::NotFound(_))));
        assert!(local_store.head_commit().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_ships_every_collected_object() {
        let local_store = InMemoryStore::new();
        let block = bytes::Bytes::from_static(b"pushed");
        local_store.put_block(block.clone(), 0).await.unwrap();
        let blob = Blob::new(vec![block_hash(&block)], block.len() as u64, 0o100644);
        let blob_h = put_object(&local_store, &blob).await;
        let mut tree = Tree::new();
        tree.entries.insert("f".to_string(), TreeEntry { kind: EntryKind::File, hash: blob_h });
        let tree_h = put_object(&local_store, &tree).await;
        let commit = Commit::new(None, tree_h, Signature::new("t", "t@example.com", 0), "c", 0);
        let commit_h = put_object(&local_store, &commit).await;
        local_store.set_ref("main", commit_h).await.unwrap();

        let remote_store = Arc::new(InMemoryStore::new());
        let remote = spawn_remote(Arc::clone(&remote_store)).await;
        let mut client = SessionClient::new(NetworkConfig { timeout_ms: 300, max_retries: 2, ..NetworkConfig::default() });
        client.open().await.unwrap();

        let ok = push(&mut client, &remote, &local_store, "main").await.unwrap();
        assert!(ok);
        assert!(remote_store.get_object(commit_h).await.unwrap().is_some());
        assert!(remote_store.get_object(tree_h).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn push_of_unknown_branch_errors() {
        let local_store = InMemoryStore::new();
        let remote_store = Arc::new(InMemoryStore::new());
        let remote = spawn_remote(remote_store).await;
        let mut client = SessionClient::new(NetworkConfig::default());
        client.open().await.unwrap();

        let result = push(&mut client, &remote, &local_store, "main").await;
        assert!(matches!(result, Err(CofError::NotFound(_))));
    }
}
