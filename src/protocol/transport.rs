//! Datagram Transport: a thin wrapper around a connectionless UDP socket
//! providing send-and-wait-for-response with timeout and bounded retries.
//!
//! Retry is stateless at this layer (see SPEC_FULL §4.2): the session
//! client's `session_id`/`sequence` are what let the server treat
//! retransmissions as idempotent, not anything tracked here.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::protocol::packet::Packet;
use crate::protocol::types::ProtocolError;

/// Largest datagram this transport will attempt to receive. Generously
/// above any configured `packet_size`, since a misbehaving peer's
/// oversized reply should surface as a decode error, not a truncated read.
const RECV_BUF_LEN: usize = 64 * 1024;

pub struct DatagramTransport {
    socket: UdpSocket,
}

impl DatagramTransport {
    /// Bind a fresh UDP socket for this transport. Calling this is the
    /// client/server's "open"; there is no separate connect step since
    /// UDP is connectionless.
    pub async fn bind(local_addr: impl ToSocketAddrs) -> Result<DatagramTransport, ProtocolError> {
        let socket = UdpSocket::bind(local_addr).await?;
        Ok(DatagramTransport { socket })
    }

    /// Fire-and-forget write.
    pub async fn send(&self, endpoint: SocketAddr, packet: &Packet) -> Result<(), ProtocolError> {
        self.socket.send_to(&packet.pack(), endpoint).await?;
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProtocolError> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for one packet and return it along with the address it came from.
    /// Used by the session server, which must reply to whichever peer sent
    /// the packet rather than to a fixed endpoint.
    pub async fn receive_from(&self, timeout: Duration) -> Result<(Packet, SocketAddr), ProtocolError> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        let (n, addr) = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| ProtocolError::TimeoutExceeded(1))??;
        Ok((Packet::unpack(&buf[..n])?, addr))
    }

    /// Wait up to `timeout` for one packet.
    pub async fn receive(&self, timeout: Duration) -> Result<Packet, ProtocolError> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        let (n, _addr) = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| ProtocolError::TimeoutExceeded(1))??;
        Packet::unpack(&buf[..n])
    }

    /// Send then receive, retransmitting the same packet on timeout up to
    /// `max_retries` total attempts. Only `timeout_exceeded` is retried;
    /// every other failure (checksum mismatch, truncated header, ...)
    /// bubbles immediately without consuming the retry budget — retrying
    /// a deterministically-corrupt response would never succeed.
    pub async fn request(
        &self,
        endpoint: SocketAddr,
        packet: &Packet,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Packet, ProtocolError> {
        let max_retries = max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.send(endpoint, packet).await?;
            match self.receive(timeout).await {
                Ok(response) => return Ok(response),
                Err(ProtocolError::TimeoutExceeded(_)) if attempt < max_retries => continue,
                Err(ProtocolError::TimeoutExceeded(_)) => {
                    return Err(ProtocolError::TimeoutExceeded(attempt));
                }
                Err(other) => return Err(other),
            }
        }
    }
}
