//! Session Client: issues typed requests against a remote endpoint using
//! the Datagram Transport and Packet Codec.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::hash::Hash;
use crate::protocol::packet::{FragmentRequestEnvelope, Packet, PushEnvelope};
use crate::protocol::transport::DatagramTransport;
use crate::protocol::types::{PacketType, ProtocolError};
use crate::remote::RemoteRepository;

const PROTOCOL_VERSION: &str = "1.0";
const CLIENT_AGENT: &str = concat!("cof-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct HandshakePayload<'a> {
    version: &'a str,
    client: &'a str,
}

#[derive(Deserialize)]
struct HandshakeAck {
    status: String,
}

#[derive(Deserialize)]
struct PushStatus {
    #[allow(dead_code)]
    status: String,
}

/// The operations the Graph Synchronizer drives a remote through.
/// Abstracted as a trait so tests can substitute a counting mock (see
/// SPEC_FULL §8's idempotence property) without a real socket.
#[async_trait]
pub trait Client: Send + Sync {
    async fn handshake(&mut self, remote: &RemoteRepository) -> bool;
    async fn request_refs(&mut self, remote: &RemoteRepository) -> HashMap<String, Hash>;
    async fn request_object(&mut self, remote: &RemoteRepository, hash: Hash) -> Option<Bytes>;
    async fn request_block(&mut self, remote: &RemoteRepository, hash: Hash) -> Option<Bytes>;
    async fn push_objects(&mut self, remote: &RemoteRepository, objects: &[(Hash, bool, u64, Bytes)]) -> bool;
}

/// A client bound to one UDP socket for its whole lifetime, identified
/// on the wire by a freshly generated `session_id`.
pub struct SessionClient {
    transport: Option<DatagramTransport>,
    session_id: String,
    config: NetworkConfig,
}

impl SessionClient {
    pub fn new(config: NetworkConfig) -> SessionClient {
        SessionClient {
            transport: None,
            session_id: uuid::Uuid::new_v4().to_string(),
            config,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Acquire the socket. Must be called before any request.
    pub async fn open(&mut self) -> Result<(), ProtocolError> {
        self.transport = Some(DatagramTransport::bind("0.0.0.0:0").await?);
        Ok(())
    }

    /// Release the socket. Safe to call even if never opened, and
    /// guaranteed to run on every exit path since `Option::take` plus
    /// the socket's own `Drop` close it regardless of how this client is
    /// discarded.
    pub fn close(&mut self) {
        self.transport.take();
    }

    fn transport(&self) -> &DatagramTransport {
        self.transport
            .as_ref()
            .expect("SessionClient used before open()")
    }

    /// Send one request and return its fully reassembled response
    /// payload, transparently handling the multi-packet case.
    async fn exchange(&self, endpoint: std::net::SocketAddr, request: Packet) -> Result<Bytes, ProtocolError> {
        let first = self
            .transport()
            .request(endpoint, &request, self.config.timeout(), self.config.max_retries)
            .await?;

        if first.packet_type == PacketType::Error {
            let reason = String::from_utf8_lossy(&first.payload).into_owned();
            return Err(ProtocolError::Protocol(reason));
        }

        if first.total_packets <= 1 {
            return Ok(first.payload);
        }

        self.reassemble(endpoint, &request, first).await
    }

    /// Collect the remaining DATA frames of a fragmented response. On a
    /// timeout waiting for outstanding fragments, sends a `FRAGMENT_REQUEST`
    /// naming exactly the sequence indices still missing (see
    /// `crate::protocol::packet::FragmentRequestEnvelope`) rather than
    /// resending the whole original exchange, per SPEC_FULL §4.3's
    /// "selective re-request by sequence index". Already-received
    /// fragments are kept across retries — only the gaps are ever
    /// re-requested, within the same overall retry budget.
    async fn reassemble(
        &self,
        endpoint: std::net::SocketAddr,
        original_request: &Packet,
        first_frame: Packet,
    ) -> Result<Bytes, ProtocolError> {
        let total = first_frame.total_packets;
        let mut frames: HashMap<u32, Bytes> = HashMap::with_capacity(total as usize);
        frames.insert(first_frame.sequence, first_frame.payload);

        let mut attempt = 0u32;
        while (frames.len() as u32) < total {
            match self.transport().receive(self.config.timeout()).await {
                Ok(frame) if frame.packet_type == PacketType::Data => {
                    frames.insert(frame.sequence, frame.payload);
                }
                Ok(_) => continue,
                Err(ProtocolError::TimeoutExceeded(_)) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries {
                        return Err(ProtocolError::TimeoutExceeded(attempt));
                    }
                    let missing: Vec<u32> = (0..total).filter(|seq| !frames.contains_key(seq)).collect();
                    debug!(attempt, total, missing = missing.len(), "selectively re-requesting missing fragments");
                    let envelope = FragmentRequestEnvelope {
                        original_packet_type: original_request.packet_type,
                        missing_sequences: missing,
                        original_payload: original_request.payload.clone(),
                    };
                    let resend = Packet::new(
                        PacketType::FragmentRequest,
                        self.session_id.clone(),
                        original_request.repo_path.clone(),
                        0,
                        1,
                        envelope.encode(),
                    );
                    self.transport().send(endpoint, &resend).await?;
                }
                Err(e) => return Err(e),
            }
        }

        let mut assembled = Vec::new();
        for seq in 0..total {
            let chunk = frames
                .get(&seq)
                .ok_or_else(|| ProtocolError::Protocol(format!("missing fragment {seq}")))?;
            assembled.extend_from_slice(chunk);
        }
        Ok(Bytes::from(assembled))
    }
}

#[async_trait]
impl Client for SessionClient {
    async fn handshake(&mut self, remote: &RemoteRepository) -> bool {
        let Ok(endpoint) = remote.socket_addr().await else {
            return false;
        };
        let payload = match serde_json::to_vec(&HandshakePayload {
            version: PROTOCOL_VERSION,
            client: CLIENT_AGENT,
        }) {
            Ok(p) => p,
            Err(_) => return false,
        };
        let request = Packet::new(
            PacketType::Handshake,
            self.session_id.clone(),
            remote.repo_path.clone(),
            0,
            1,
            payload,
        );

        match self.exchange(endpoint, request).await {
            Ok(body) => match serde_json::from_slice::<HandshakeAck>(&body) {
                Ok(ack) => ack.status == "ok",
                Err(_) => false,
            },
            Err(e) => {
                warn!(error = %e, "handshake failed");
                false
            }
        }
    }

    async fn request_refs(&mut self, remote: &RemoteRepository) -> HashMap<String, Hash> {
        let Ok(endpoint) = remote.socket_addr().await else {
            return HashMap::new();
        };
        let request = Packet::new(
            PacketType::RefRequest,
            self.session_id.clone(),
            remote.repo_path.clone(),
            0,
            1,
            Bytes::new(),
        );

        match self.exchange(endpoint, request).await {
            Ok(body) => {
                let raw: HashMap<String, String> = match serde_json::from_slice(&body) {
                    Ok(r) => r,
                    Err(_) => return HashMap::new(),
                };
                raw.into_iter()
                    .filter_map(|(name, hex)| hex.parse::<Hash>().ok().map(|h| (name, h)))
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "request_refs failed");
                HashMap::new()
            }
        }
    }

    async fn request_object(&mut self, remote: &RemoteRepository, hash: Hash) -> Option<Bytes> {
        let endpoint = remote.socket_addr().await.ok()?;
        let request = Packet::new(
            PacketType::ObjectRequest,
            self.session_id.clone(),
            remote.repo_path.clone(),
            0,
            1,
            Bytes::from(hash.to_hex().into_bytes()),
        );
        match self.exchange(endpoint, request).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(error = %e, %hash, "request_object failed");
                None
            }
        }
    }

    async fn request_block(&mut self, remote: &RemoteRepository, hash: Hash) -> Option<Bytes> {
        let endpoint = remote.socket_addr().await.ok()?;
        let request = Packet::new(
            PacketType::BlockRequest,
            self.session_id.clone(),
            remote.repo_path.clone(),
            0,
            1,
            Bytes::from(hash.to_hex().into_bytes()),
        );
        match self.exchange(endpoint, request).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(error = %e, %hash, "request_block failed");
                None
            }
        }
    }

    async fn push_objects(&mut self, remote: &RemoteRepository, objects: &[(Hash, bool, u64, Bytes)]) -> bool {
        let Ok(endpoint) = remote.socket_addr().await else {
            return false;
        };

        for (sequence, (hash, is_block, seq_hint, content)) in objects.iter().enumerate() {
            let envelope = if *is_block {
                PushEnvelope::for_block(*hash, *seq_hint, content.clone())
            } else {
                PushEnvelope::for_object(*hash, content.clone())
            };
            let request = Packet::new(
                PacketType::PushRequest,
                self.session_id.clone(),
                remote.repo_path.clone(),
                sequence as u32,
                1,
                envelope.encode(),
            );
            match self.exchange(endpoint, request).await {
                Ok(body) => {
                    if serde_json::from_slice::<PushStatus>(&body).is_err() {
                        return false;
                    }
                }
                Err(e) => {
                    warn!(error = %e, %hash, "push_objects aborted");
                    return false;
                }
            }
        }
        true
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.close();
    }
}
