//! Packet Codec: frames a typed message with session/repo/sequence
//! metadata and a BLAKE3 checksum into a flat byte string, and parses it
//! back.
//!
//! Wire layout (see SPEC_FULL §6):
//!
//! ```text
//! bytes 0..15   checksum = first 16 hex chars of BLAKE3(bytes 16..)
//! byte  16      packet_type
//! bytes 17..N   header: len-prefixed session_id, len-prefixed repo_path,
//!               big-endian sequence, big-endian total_packets
//! bytes N..end  payload
//! ```

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use crate::protocol::types::{PacketType, ProtocolError};

const CHECKSUM_LEN: usize = 16;
/// Checksum + type byte + two empty length-prefixed strings (4 bytes each)
/// + sequence + total_packets: the smallest a well-formed packet can be.
const MIN_HEADER_LEN: usize = CHECKSUM_LEN + 1 + 4 + 4 + 4 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub session_id: String,
    pub repo_path: String,
    pub sequence: u32,
    pub total_packets: u32,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(
        packet_type: PacketType,
        session_id: impl Into<String>,
        repo_path: impl Into<String>,
        sequence: u32,
        total_packets: u32,
        payload: impl Into<Bytes>,
    ) -> Packet {
        Packet {
            packet_type,
            session_id: session_id.into(),
            repo_path: repo_path.into(),
            sequence,
            total_packets,
            payload: payload.into(),
        }
    }

    /// A single-packet ERROR reply carrying a human-readable reason,
    /// echoing the request's session/repo/sequence.
    pub fn error(session_id: impl Into<String>, repo_path: impl Into<String>, reason: impl Into<String>) -> Packet {
        Packet::new(
            PacketType::Error,
            session_id,
            repo_path,
            0,
            1,
            Bytes::from(reason.into().into_bytes()),
        )
    }

    /// Serialize this packet to its wire form, computing the leading
    /// checksum over everything that follows it.
    pub fn pack(&self) -> Bytes {
        let mut rest = Vec::with_capacity(1 + self.session_id.len() + self.repo_path.len() + self.payload.len() + 16);
        rest.push(self.packet_type.to_byte());
        write_len_prefixed(&mut rest, self.session_id.as_bytes());
        write_len_prefixed(&mut rest, self.repo_path.as_bytes());
        rest.write_u32::<BigEndian>(self.sequence).expect("writing to a Vec cannot fail");
        rest.write_u32::<BigEndian>(self.total_packets).expect("writing to a Vec cannot fail");
        rest.extend_from_slice(&self.payload);

        let checksum = checksum_hex(&rest);
        let mut out = Vec::with_capacity(CHECKSUM_LEN + rest.len());
        out.extend_from_slice(checksum.as_bytes());
        out.extend_from_slice(&rest);
        Bytes::from(out)
    }

    /// Parse a packet off the wire, rejecting anything too short or with
    /// a recomputed checksum that disagrees with the declared one.
    pub fn unpack(data: &[u8]) -> Result<Packet, ProtocolError> {
        if data.len() < MIN_HEADER_LEN {
            return Err(ProtocolError::PacketTooSmall);
        }

        let declared_checksum = std::str::from_utf8(&data[..CHECKSUM_LEN])
            .map_err(|_| ProtocolError::ChecksumMismatch)?;
        let rest = &data[CHECKSUM_LEN..];
        if checksum_hex(rest) != declared_checksum {
            return Err(ProtocolError::ChecksumMismatch);
        }

        let mut cursor = Cursor::new(rest);
        let packet_type = PacketType::from_byte(read_u8(&mut cursor)?);
        let session_id = read_len_prefixed_string(&mut cursor)?;
        let repo_path = read_len_prefixed_string(&mut cursor)?;
        let sequence = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| ProtocolError::Protocol(format!("truncated header: {e}")))?;
        let total_packets = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| ProtocolError::Protocol(format!("truncated header: {e}")))?;

        let payload_start = cursor.position() as usize;
        let payload = Bytes::copy_from_slice(&rest[payload_start..]);

        Ok(Packet {
            packet_type,
            session_id,
            repo_path,
            sequence,
            total_packets,
            payload,
        })
    }
}

fn checksum_hex(rest: &[u8]) -> String {
    blake3::hash(rest).to_hex()[..CHECKSUM_LEN].to_string()
}

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.write_u32::<BigEndian>(bytes.len() as u32)
        .expect("writing to a Vec cannot fail");
    buf.extend_from_slice(bytes);
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, ProtocolError> {
    let mut byte = [0u8; 1];
    cursor
        .read_exact(&mut byte)
        .map_err(|e| ProtocolError::Protocol(format!("truncated header: {e}")))?;
    Ok(byte[0])
}

fn read_len_prefixed_string(cursor: &mut Cursor<&[u8]>) -> Result<String, ProtocolError> {
    let len = cursor
        .read_u32::<BigEndian>()
        .map_err(|e| ProtocolError::Protocol(format!("truncated header: {e}")))? as usize;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|e| ProtocolError::Protocol(format!("truncated header: {e}")))?;
    String::from_utf8(buf).map_err(|e| ProtocolError::Protocol(format!("non-utf8 header field: {e}")))
}

/// Payload framing for `PUSH_REQUEST`, resolving an ambiguity the spec
/// leaves to the implementer: the push path needs to tell the server
/// which store tier (`put_object` vs `put_block`) a given hash belongs
/// to, and for blocks, the `commit_sequence_hint` to lay them out under.
/// Laid out the same way the outer packet header is: fixed-width fields
/// first, then opaque content.
///
/// ```text
/// byte   0       1 = block, 0 = structured object
/// bytes  1..8    commit_sequence_hint, big-endian (0 for objects)
/// bytes  9..72   hash, as 64 ascii hex chars
/// bytes  73..end content bytes
/// ```
pub struct PushEnvelope {
    pub is_block: bool,
    pub commit_sequence_hint: u64,
    pub hash: crate::hash::Hash,
    pub content: Bytes,
}

impl PushEnvelope {
    pub fn for_object(hash: crate::hash::Hash, content: impl Into<Bytes>) -> PushEnvelope {
        PushEnvelope {
            is_block: false,
            commit_sequence_hint: 0,
            hash,
            content: content.into(),
        }
    }

    pub fn for_block(hash: crate::hash::Hash, commit_sequence_hint: u64, content: impl Into<Bytes>) -> PushEnvelope {
        PushEnvelope {
            is_block: true,
            commit_sequence_hint,
            hash,
            content: content.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(1 + 8 + 64 + self.content.len());
        out.push(self.is_block as u8);
        out.write_u64::<BigEndian>(self.commit_sequence_hint)
            .expect("writing to a Vec cannot fail");
        out.extend_from_slice(self.hash.to_hex().as_bytes());
        out.extend_from_slice(&self.content);
        Bytes::from(out)
    }

    pub fn decode(payload: &[u8]) -> Result<PushEnvelope, ProtocolError> {
        const FIXED_LEN: usize = 1 + 8 + 64;
        if payload.len() < FIXED_LEN {
            return Err(ProtocolError::Protocol("push envelope too small".to_string()));
        }
        let is_block = payload[0] != 0;
        let mut seq_bytes = &payload[1..9];
        let commit_sequence_hint = seq_bytes
            .read_u64::<BigEndian>()
            .map_err(|e| ProtocolError::Protocol(format!("bad push envelope: {e}")))?;
        let hash_hex = std::str::from_utf8(&payload[9..73])
            .map_err(|e| ProtocolError::Protocol(format!("bad push envelope hash: {e}")))?;
        let hash = hash_hex
            .parse()
            .map_err(|e| ProtocolError::Protocol(format!("bad push envelope hash: {e}")))?;
        Ok(PushEnvelope {
            is_block,
            commit_sequence_hint,
            hash,
            content: Bytes::copy_from_slice(&payload[73..]),
        })
    }
}

/// Payload framing for `FRAGMENT_REQUEST`: asks the peer to resend only
/// the named missing sequence indices of a fragmented response, rather
/// than re-running the whole original exchange. The server is stateless
/// per packet (SPEC_FULL §4.2/§4.4), so the request must carry enough of
/// the original exchange for the server to recompute its response and
/// re-slice it identically: the original request's `packet_type` and
/// payload, plus the list of sequence numbers still missing.
///
/// ```text
/// byte   0        original_packet_type
/// bytes  1..5      missing-sequence count, big-endian u32
/// bytes  5..5+4n   missing sequence numbers, each big-endian u32
/// bytes  5+4n..end original request payload
/// ```
pub struct FragmentRequestEnvelope {
    pub original_packet_type: PacketType,
    pub missing_sequences: Vec<u32>,
    pub original_payload: Bytes,
}

impl FragmentRequestEnvelope {
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(1 + 4 + self.missing_sequences.len() * 4 + self.original_payload.len());
        out.push(self.original_packet_type.to_byte());
        out.write_u32::<BigEndian>(self.missing_sequences.len() as u32)
            .expect("writing to a Vec cannot fail");
        for seq in &self.missing_sequences {
            out.write_u32::<BigEndian>(*seq).expect("writing to a Vec cannot fail");
        }
        out.extend_from_slice(&self.original_payload);
        Bytes::from(out)
    }

    pub fn decode(payload: &[u8]) -> Result<FragmentRequestEnvelope, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::Protocol("fragment request envelope too small".to_string()));
        }
        let original_packet_type = PacketType::from_byte(payload[0]);
        let mut cursor = Cursor::new(&payload[1..]);
        let count = cursor
            .read_u32::<BigEndian>()
            .map_err(|e| ProtocolError::Protocol(format!("bad fragment request envelope: {e}")))? as usize;
        let mut missing_sequences = Vec::with_capacity(count);
        for _ in 0..count {
            let seq = cursor
                .read_u32::<BigEndian>()
                .map_err(|e| ProtocolError::Protocol(format!("bad fragment request envelope: {e}")))?;
            missing_sequences.push(seq);
        }
        let tail_start = 1 + cursor.position() as usize;
        let original_payload = Bytes::copy_from_slice(&payload[tail_start..]);
        Ok(FragmentRequestEnvelope {
            original_packet_type,
            missing_sequences,
            original_payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Packet {
        Packet::new(
            PacketType::Handshake,
            "s1",
            "r",
            0,
            1,
            Bytes::from_static(br#"{"version":"1.0"}"#),
        )
    }

    #[test]
    fn round_trip_packet() {
        let original = sample();
        let packed = original.pack();
        let unpacked = Packet::unpack(&packed).unwrap();
        assert_eq!(unpacked, original);
    }

    #[test]
    fn checksum_is_sixteen_hex_chars() {
        let packed = sample().pack();
        let checksum = std::str::from_utf8(&packed[..CHECKSUM_LEN]).unwrap();
        assert_eq!(checksum.len(), 16);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn corruption_detection() {
        let packed = sample().pack();
        let mut corrupted = packed.to_vec();
        corrupted[..16].copy_from_slice(b"0000000000000000");
        assert!(matches!(
            Packet::unpack(&corrupted),
            Err(ProtocolError::ChecksumMismatch)
        ));
    }

    #[test]
    fn packet_too_small() {
        assert!(matches!(
            Packet::unpack(b"too short"),
            Err(ProtocolError::PacketTooSmall)
        ));
    }

    #[test]
    fn unknown_packet_type_byte_decodes_as_error() {
        let mut packed = sample().pack().to_vec();
        packed[16] = 200; // overwrite packet_type byte with an unknown value
        // recompute checksum since we mutated the checksummed region
        let rest = packed[16..].to_vec();
        let checksum = checksum_hex(&rest);
        packed[..16].copy_from_slice(checksum.as_bytes());

        let unpacked = Packet::unpack(&packed).unwrap();
        assert_eq!(unpacked.packet_type, PacketType::Error);
    }

    #[test]
    fn large_payload_round_trips() {
        let payload = vec![b'x'; 10_000];
        let original = Packet::new(PacketType::Data, "large", "repo", 0, 1, payload.clone());
        let packed = original.pack();
        let unpacked = Packet::unpack(&packed).unwrap();
        assert_eq!(unpacked.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn empty_payload_round_trips() {
        let original = Packet::new(PacketType::RefRequest, "s", "r", 0, 1, Bytes::new());
        let packed = original.pack();
        let unpacked = Packet::unpack(&packed).unwrap();
        assert_eq!(unpacked.payload.len(), 0);
    }

    #[test]
    fn push_envelope_round_trips_for_objects_and_blocks() {
        let hash = crate::hash::Hash::of(b"content");
        let object_env = PushEnvelope::for_object(hash, Bytes::from_static(b"{}"));
        let decoded = PushEnvelope::decode(&object_env.encode()).unwrap();
        assert!(!decoded.is_block);
        assert_eq!(decoded.hash, hash);
        assert_eq!(decoded.content.as_ref(), b"{}");

        let block_env = PushEnvelope::for_block(hash, 42, Bytes::from_static(b"raw bytes"));
        let decoded = PushEnvelope::decode(&block_env.encode()).unwrap();
        assert!(decoded.is_block);
        assert_eq!(decoded.commit_sequence_hint, 42);
        assert_eq!(decoded.content.as_ref(), b"raw bytes");
    }

    #[test]
    fn fragment_request_envelope_round_trips() {
        let envelope = FragmentRequestEnvelope {
            original_packet_type: PacketType::ObjectRequest,
            missing_sequences: vec![2, 5, 7],
            original_payload: Bytes::from_static(b"deadbeef"),
        };
        let decoded = FragmentRequestEnvelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded.original_packet_type, PacketType::ObjectRequest);
        assert_eq!(decoded.missing_sequences, vec![2, 5, 7]);
        assert_eq!(decoded.original_payload.as_ref(), b"deadbeef");
    }

    #[test]
    fn fragment_request_envelope_with_no_missing_sequences() {
        let envelope = FragmentRequestEnvelope {
            original_packet_type: PacketType::BlockRequest,
            missing_sequences: vec![],
            original_payload: Bytes::new(),
        };
        let decoded = FragmentRequestEnvelope::decode(&envelope.encode()).unwrap();
        assert!(decoded.missing_sequences.is_empty());
        assert_eq!(decoded.original_payload.len(), 0);
    }
}
