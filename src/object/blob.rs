//! The blob object: a file's metadata plus the ordered list of block
//! hashes that make up its content.

use serde::{Deserialize, Serialize};

use crate::hash::Hash;
use crate::object::{Object, ObjectKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub block_hashes: Vec<Hash>,
    pub size: u64,
    pub mode: u32,
}

impl Blob {
    pub fn new(block_hashes: Vec<Hash>, size: u64, mode: u32) -> Blob {
        Blob {
            block_hashes,
            size,
            mode,
        }
    }
}

impl Object for Blob {
    fn kind() -> ObjectKind {
        ObjectKind::Blob
    }
}
