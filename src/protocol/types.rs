//! Wire/transport/session-layer error type and the packet type tag.

use thiserror::Error;

/// Errors raised by the packet codec, datagram transport, session
/// client, and session server. Object/store-layer failures are
/// [`crate::errors::CofError`]; this enum is the wire-facing counterpart.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Declared checksum does not match the recomputed one. Non-recoverable;
    /// the exchange is aborted, never retried on the same bytes.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Input shorter than the minimum packet header.
    #[error("packet too small")]
    PacketTooSmall,

    /// No response within `max_retries * timeout_ms`.
    #[error("timeout exceeded after {0} attempts")]
    TimeoutExceeded(u32),

    /// The peer reports the requested hash is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// A fetched block's hash did not match its advertised hash.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The client was used before `open()`.
    #[error("socket used before it was opened")]
    SocketUninitialized,

    /// Malformed peer response that does not fit a more specific variant.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O failure (socket bind, send, recv).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packet type tag (byte 16 of every datagram).
///
/// Unknown values on the wire decode as [`PacketType::Error`] rather than
/// failing to parse, so a forward-compatible peer can report a
/// protocol-level disagreement instead of silently dropping the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Handshake,
    HandshakeAck,
    ObjectRequest,
    ObjectResponse,
    BlockRequest,
    BlockResponse,
    RefRequest,
    RefResponse,
    PushRequest,
    PushResponse,
    Data,
    Error,
    /// Client-originated request asking the server to resend only the
    /// named missing sequence indices of a fragmented response, instead
    /// of the whole logical message (see `crate::protocol::packet::FragmentRequestEnvelope`).
    FragmentRequest,
}

impl PacketType {
    pub fn to_byte(self) -> u8 {
        match self {
            PacketType::Handshake => 0,
            PacketType::HandshakeAck => 1,
            PacketType::ObjectRequest => 2,
            PacketType::ObjectResponse => 3,
            PacketType::BlockRequest => 4,
            PacketType::BlockResponse => 5,
            PacketType::RefRequest => 6,
            PacketType::RefResponse => 7,
            PacketType::PushRequest => 8,
            PacketType::PushResponse => 9,
            PacketType::Data => 10,
            PacketType::Error => 11,
            PacketType::FragmentRequest => 12,
        }
    }

    /// Never fails: any byte outside the known range maps to `Error`.
    pub fn from_byte(byte: u8) -> PacketType {
        match byte {
            0 => PacketType::Handshake,
            1 => PacketType::HandshakeAck,
            2 => PacketType::ObjectRequest,
            3 => PacketType::ObjectResponse,
            4 => PacketType::BlockRequest,
            5 => PacketType::BlockResponse,
            6 => PacketType::RefRequest,
            7 => PacketType::RefResponse,
            8 => PacketType::PushRequest,
            9 => PacketType::PushResponse,
            10 => PacketType::Data,
            11 => PacketType::Error,
            12 => PacketType::FragmentRequest,
            _ => PacketType::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_byte_decodes_as_error_not_a_failure() {
        assert_eq!(PacketType::from_byte(255), PacketType::Error);
    }

    #[test]
    fn every_known_type_round_trips_its_byte() {
        let known = [
            PacketType::Handshake,
            PacketType::HandshakeAck,
            PacketType::ObjectRequest,
            PacketType::ObjectResponse,
            PacketType::BlockRequest,
            PacketType::BlockResponse,
            PacketType::RefRequest,
            PacketType::RefResponse,
            PacketType::PushRequest,
            PacketType::PushResponse,
            PacketType::Data,
            PacketType::Error,
            PacketType::FragmentRequest,
        ];
        for kind in known {
            assert_eq!(PacketType::from_byte(kind.to_byte()), kind);
        }
    }
}
