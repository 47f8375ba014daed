//! Session Server: the peer-facing half of the protocol. Listens on one
//! UDP socket, dispatches each inbound packet by `packet_type`, and
//! answers from a [`Store`] implementation generic over the caller.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::net::ToSocketAddrs;
use tracing::{debug, error, info, warn};

use crate::config::NetworkConfig;
use crate::errors::CofError;
use crate::hash::Hash;
use crate::protocol::packet::{FragmentRequestEnvelope, Packet, PushEnvelope};
use crate::protocol::transport::DatagramTransport;
use crate::protocol::types::{PacketType, ProtocolError};
use crate::store::Store;

#[derive(Serialize)]
struct HandshakeAck<'a> {
    status: &'a str,
}

#[derive(Serialize)]
struct PushAck<'a> {
    status: &'a str,
}

pub struct SessionServer<S: Store + 'static> {
    transport: Arc<DatagramTransport>,
    store: Arc<S>,
    config: NetworkConfig,
    repo_path: String,
}

impl<S: Store + 'static> SessionServer<S> {
    /// Bind a listening socket serving a single repository at `repo_path`.
    /// Requests naming a different `repo_path` are answered with an
    /// `ERROR("Repository not found at <repo_path>")` packet, per
    /// SPEC_FULL §4.4 and `original_source/src/cof/server.py`'s
    /// `_process_packet` repository-resolution step.
    pub async fn bind(
        local_addr: impl ToSocketAddrs,
        repo_path: impl Into<String>,
        store: Arc<S>,
        config: NetworkConfig,
    ) -> Result<SessionServer<S>, ProtocolError> {
        let transport = DatagramTransport::bind(local_addr).await?;
        Ok(SessionServer {
            transport: Arc::new(transport),
            store,
            config,
            repo_path: repo_path.into(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        self.transport.local_addr()
    }

    /// Run forever, spawning one task per inbound packet so a slow fetch
    /// for one peer never blocks another's handshake.
    pub async fn serve(&self) -> Result<(), ProtocolError> {
        loop {
            let (packet, from) = match self.transport.receive_from(self.config.timeout()).await {
                Ok(pair) => pair,
                Err(ProtocolError::TimeoutExceeded(_)) => continue,
                Err(e) => {
                    warn!(error = %e, "dropping malformed inbound packet");
                    continue;
                }
            };

            let transport = Arc::clone(&self.transport);
            let store = Arc::clone(&self.store);
            let config = self.config;
            let repo_path = self.repo_path.clone();
            tokio::spawn(async move {
                dispatch(transport, store, from, packet, config, &repo_path).await;
            });
        }
    }
}

async fn dispatch<S: Store + 'static>(
    transport: Arc<DatagramTransport>,
    store: Arc<S>,
    from: SocketAddr,
    request: Packet,
    config: NetworkConfig,
    repo_path: &str,
) {
    debug!(?request.packet_type, session = %request.session_id, "handling request");

    if request.repo_path != repo_path {
        let reply = Packet::error(
            request.session_id.clone(),
            request.repo_path.clone(),
            format!("Repository not found at {}", request.repo_path),
        );
        if let Err(e) = send_fragmented(&transport, from, reply, &config).await {
            warn!(error = %e, %from, "failed to send response");
        }
        return;
    }

    if request.packet_type == PacketType::FragmentRequest {
        match fragment_reply(&*store, &request, &config).await {
            Ok(frames) => {
                for frame in frames {
                    if let Err(e) = transport.send(from, &frame).await {
                        warn!(error = %e, %from, "failed to send fragment");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "fragment request handling failed");
                let reply = Packet::error(request.session_id.clone(), request.repo_path.clone(), e.to_string());
                if let Err(e) = transport.send(from, &reply).await {
                    warn!(error = %e, %from, "failed to send response");
                }
            }
        }
        return;
    }

    let reply = match request.packet_type {
        PacketType::Handshake => Ok(handshake_reply(&request)),
        PacketType::RefRequest => ref_reply(&*store, &request).await,
        PacketType::ObjectRequest => object_reply(&*store, &request).await,
        PacketType::BlockRequest => block_reply(&*store, &request).await,
        PacketType::PushRequest => push_reply(&*store, &request).await,
        _ => Ok(Packet::error(
            request.session_id.clone(),
            request.repo_path.clone(),
            "unknown or unsupported packet type",
        )),
    };

    let reply = reply.unwrap_or_else(|e| {
        error!(error = %e, "request handling failed");
        Packet::error(request.session_id.clone(), request.repo_path.clone(), e.to_string())
    });

    if let Err(e) = send_fragmented(&transport, from, reply, &config).await {
        warn!(error = %e, %from, "failed to send response");
    }
}

/// Rebuild the original request this `FRAGMENT_REQUEST` refers to, recompute
/// its full response from current repository state, re-slice it the same
/// way [`send_fragmented`] would have, and return only the frames whose
/// sequence index was named as missing. The server keeps no per-session
/// state between packets (SPEC_FULL §4.2), so recomputing from scratch is
/// the only way to answer a selective re-request.
async fn fragment_reply<S: Store>(
    store: &S,
    request: &Packet,
    config: &NetworkConfig,
) -> Result<Vec<Packet>, CofError> {
    let envelope = FragmentRequestEnvelope::decode(&request.payload)
        .map_err(|e| CofError::Custom(format!("malformed fragment request: {e}")))?;

    let virtual_request = Packet::new(
        envelope.original_packet_type,
        request.session_id.clone(),
        request.repo_path.clone(),
        0,
        1,
        envelope.original_payload,
    );

    let reply = match virtual_request.packet_type {
        PacketType::Handshake => handshake_reply(&virtual_request),
        PacketType::RefRequest => ref_reply(store, &virtual_request).await?,
        PacketType::ObjectRequest => object_reply(store, &virtual_request).await?,
        PacketType::BlockRequest => block_reply(store, &virtual_request).await?,
        PacketType::PushRequest => push_reply(store, &virtual_request).await?,
        _ => Packet::error(request.session_id.clone(), request.repo_path.clone(), "unknown or unsupported packet type"),
    };

    let missing: HashSet<u32> = envelope.missing_sequences.into_iter().collect();
    let frames = build_frames(&reply, chunk_size(config));
    Ok(frames.into_iter().filter(|frame| missing.contains(&frame.sequence)).collect())
}

fn handshake_reply(request: &Packet) -> Packet {
    let body = serde_json::to_vec(&HandshakeAck { status: "ok" }).unwrap_or_default();
    Packet::new(
        PacketType::HandshakeAck,
        request.session_id.clone(),
        request.repo_path.clone(),
        0,
        1,
        Bytes::from(body),
    )
}

async fn ref_reply<S: Store>(store: &S, request: &Packet) -> Result<Packet, CofError> {
    let refs = store.list_refs().await?;
    let as_hex: std::collections::HashMap<String, String> =
        refs.into_iter().map(|(name, hash)| (name, hash.to_hex())).collect();
    let body = serde_json::to_vec(&as_hex)?;
    Ok(Packet::new(
        PacketType::RefResponse,
        request.session_id.clone(),
        request.repo_path.clone(),
        0,
        1,
        Bytes::from(body),
    ))
}

fn parse_requested_hash(payload: &[u8]) -> Result<Hash, CofError> {
    std::str::from_utf8(payload)
        .map_err(|e| CofError::Custom(format!("hash request is not utf8: {e}")))?
        .parse()
        .map_err(CofError::InvalidHash)
}

async fn object_reply<S: Store>(store: &S, request: &Packet) -> Result<Packet, CofError> {
    let hash = parse_requested_hash(&request.payload)?;
    match store.get_object(hash).await? {
        Some(bytes) => Ok(Packet::new(
            PacketType::ObjectResponse,
            request.session_id.clone(),
            request.repo_path.clone(),
            0,
            1,
            bytes,
        )),
        None => Err(CofError::NotFound(hash.to_hex())),
    }
}

async fn block_reply<S: Store>(store: &S, request: &Packet) -> Result<Packet, CofError> {
    let hash = parse_requested_hash(&request.payload)?;
    match store.get_block(hash).await? {
        Some(bytes) => Ok(Packet::new(
            PacketType::BlockResponse,
            request.session_id.clone(),
            request.repo_path.clone(),
            0,
            1,
            bytes,
        )),
        None => Err(CofError::NotFound(hash.to_hex())),
    }
}

async fn push_reply<S: Store>(store: &S, request: &Packet) -> Result<Packet, CofError> {
    let envelope = PushEnvelope::decode(&request.payload)
        .map_err(|e| CofError::Custom(format!("malformed push envelope: {e}")))?;

    if envelope.is_block {
        let stored = store.put_block(envelope.content, envelope.commit_sequence_hint).await?;
        if stored != envelope.hash {
            return Err(CofError::IntegrityViolation {
                expected: envelope.hash.to_hex(),
                actual: stored.to_hex(),
            });
        }
    } else {
        store.put_object(envelope.hash, envelope.content).await?;
    }

    let body = serde_json::to_vec(&PushAck { status: "ok" })?;
    Ok(Packet::new(
        PacketType::PushResponse,
        request.session_id.clone(),
        request.repo_path.clone(),
        0,
        1,
        Bytes::from(body),
    ))
}

/// Bytes of frame payload to pack per datagram, leaving headroom under
/// `config.packet_size` (spec.md §6: "transport MTU in bytes; messages
/// exceeding it are fragmented") for the fixed header fields (checksum,
/// type byte, two length-prefixed strings, sequence, total_packets).
/// `HEADER_RESERVE` is a generous over-estimate of that overhead so a
/// `session_id`/`repo_path` of ordinary length never pushes the packed
/// datagram back over the configured MTU.
fn chunk_size(config: &NetworkConfig) -> usize {
    const HEADER_RESERVE: usize = 96;
    const MIN_CHUNK: usize = 64;
    config.packet_size.saturating_sub(HEADER_RESERVE).max(MIN_CHUNK)
}

/// Split `reply` into the ordered frames it would be sent as: a single
/// frame carrying `reply` unchanged if it already fits under `chunk_size`,
/// otherwise `PacketType::Data` frames sharing `reply`'s session/repo and
/// a shared `total_packets`, with the first frame keeping `reply`'s own
/// packet type so the client can still distinguish an ERROR from a
/// successful multi-frame body.
fn build_frames(reply: &Packet, chunk_size: usize) -> Vec<Packet> {
    if reply.payload.len() <= chunk_size {
        return vec![reply.clone()];
    }

    let chunks: Vec<Bytes> = reply.payload.chunks(chunk_size).map(Bytes::copy_from_slice).collect();
    let total = chunks.len() as u32;

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let packet_type = if i == 0 { reply.packet_type } else { PacketType::Data };
            Packet::new(packet_type, reply.session_id.clone(), reply.repo_path.clone(), i as u32, total, chunk)
        })
        .collect()
}

/// Send `reply`, splitting its payload into ordered DATA frames when it
/// would not fit in one datagram under `config.packet_size`.
async fn send_fragmented(
    transport: &DatagramTransport,
    to: SocketAddr,
    reply: Packet,
    config: &NetworkConfig,
) -> Result<(), ProtocolError> {
    let frames = build_frames(&reply, chunk_size(config));
    if frames.len() > 1 {
        info!(total = frames.len(), %to, "fragmenting response");
    }
    for frame in frames {
        transport.send(to, &frame).await?;
    }
    Ok(())
}
