//! The tree object: an ordered directory listing mapping entry name to
//! child kind and hash.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::object::{Object, ObjectKind};

/// Whether a tree entry points at a file (blob) or a sub-directory (tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub hash: Hash,
}

/// An ordered mapping from entry name to child reference.
///
/// `BTreeMap` gives deterministic, name-sorted JSON serialization so that
/// two trees with the same entries hash identically regardless of the
/// order entries were inserted in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tree {
    pub entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    pub fn new() -> Tree {
        Tree::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, kind: EntryKind, hash: Hash) {
        self.entries.insert(name.into(), TreeEntry { kind, hash });
    }
}

impl Object for Tree {
    fn kind() -> ObjectKind {
        ObjectKind::Tree
    }
}
