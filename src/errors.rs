//! Error types for the object/store layer.
//!
//! Wire and transport failures live in [`crate::protocol::types::ProtocolError`];
//! this enum covers object parsing, hash validation, and store-contract
//! violations raised above the protocol boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CofError {
    /// Malformed commit object (missing tree, bad parent hash, ...).
    #[error("not a valid commit object: {0}")]
    InvalidCommit(String),

    /// Malformed tree object.
    #[error("not a valid tree object: {0}")]
    InvalidTree(String),

    /// Malformed blob object.
    #[error("not a valid blob object: {0}")]
    InvalidBlob(String),

    /// Hash string failed to parse as hex or had the wrong length.
    #[error("invalid hash value: {0}")]
    InvalidHash(String),

    /// A fetched block's recomputed hash did not match the advertised hash.
    #[error("integrity violation: block hash mismatch, expected {expected}, got {actual}")]
    IntegrityViolation { expected: String, actual: String },

    /// The requested hash is absent from the peer or local store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// JSON (de)serialization of an object or payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for store-contract violations not covered above.
    #[error("{0}")]
    Custom(String),
}
