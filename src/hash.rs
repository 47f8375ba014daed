//! Content hashes for objects and blocks.
//!
//! Every object (commit, tree, blob) and every block is addressed by the
//! BLAKE3 hash of its canonical bytes. `Hash` is a thin, `Copy`able wrapper
//! around the 32-byte digest with hex encode/decode and stream helpers.

use std::fmt::Display;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hex length of a `Hash`'s string form (32 bytes -> 64 hex chars).
pub const HASH_HEX_LEN: usize = 64;

/// A BLAKE3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Hash of the empty byte string, useful as a sentinel "no parent" value.
    pub fn zero() -> Hash {
        Hash([0u8; 32])
    }

    /// Compute the BLAKE3 hash of `data`.
    pub fn of(data: &[u8]) -> Hash {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Build a `Hash` from raw bytes, failing if the length is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Result<Hash, String> {
        if bytes.len() != 32 {
            return Err(format!(
                "invalid hash length: got {}, expected 32",
                bytes.len()
            ));
        }
        let mut h = [0u8; 32];
        h.copy_from_slice(bytes);
        Ok(Hash(h))
    }

    /// Read a 32-byte hash off a stream (used by the packet header framing).
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<Hash> {
        let mut h = [0u8; 32];
        data.read_exact(&mut h)?;
        Ok(Hash(h))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(format!(
                "invalid hash hex length: got {}, expected {HASH_HEX_LEN}",
                s.len()
            ));
        }
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        Hash::from_bytes(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_is_deterministic() {
        let a = Hash::of(b"hello world");
        let b = Hash::of(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn hex_round_trip() {
        let h = Hash::of(b"round trip me");
        let hex = h.to_hex();
        assert_eq!(hex.len(), HASH_HEX_LEN);
        let back = Hash::from_str(&hex).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Hash::from_str("deadbeef").is_err());
        assert!(Hash::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn zero_is_distinct_from_hash_of_empty() {
        assert_ne!(Hash::zero(), Hash::of(b""));
    }
}
