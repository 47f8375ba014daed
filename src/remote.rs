//! Remote endpoint addressing: `cof://<host>:<port>/<repo_path>` URLs and
//! the resolved [`RemoteRepository`] they parse into.
//!
//! The remotes *registry* (name -> URL persistence) is external to this
//! crate per spec §1; this module only owns the URL grammar and the
//! value a `RemoteRepository` resolves to.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::errors::CofError;

/// Default port a `cof://` URL resolves to when none is given.
pub const DEFAULT_PORT: u16 = 7357;

/// Transport the remote is reached over. The wire protocol in this crate
/// is UDP-only; the field is retained because the on-disk remotes file
/// format (external to this crate) carries it for forward compatibility
/// with future transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProtocol {
    Udp,
}

impl Default for RemoteProtocol {
    fn default() -> Self {
        RemoteProtocol::Udp
    }
}

/// A resolved remote endpoint: host, port, and the repository path on
/// that host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub repo_path: String,
    #[serde(default)]
    pub protocol: RemoteProtocol,
}

impl RemoteRepository {
    /// Parse `cof://<host>:<port>/<repo_path>`, defaulting the port to
    /// [`DEFAULT_PORT`] when omitted.
    pub fn from_url(name: &str, url: &str) -> Result<RemoteRepository, CofError> {
        let rest = url
            .strip_prefix("cof://")
            .ok_or_else(|| CofError::Custom(format!("not a cof:// URL: {url}")))?;

        let (authority, repo_path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx + 1..]),
            None => (rest, ""),
        };
        if authority.is_empty() || repo_path.is_empty() {
            return Err(CofError::Custom(format!(
                "cof:// URL is missing a host or repository path: {url}"
            )));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|e| CofError::Custom(format!("invalid port in {url}: {e}")))?;
                (host.to_string(), port)
            }
            None => (authority.to_string(), DEFAULT_PORT),
        };

        Ok(RemoteRepository {
            name: name.to_string(),
            host,
            port,
            repo_path: repo_path.to_string(),
            protocol: RemoteProtocol::Udp,
        })
    }

    /// Resolve `host:port` into a socket address for the datagram
    /// transport to connect to. `host` may be an IP literal or a DNS
    /// hostname — resolution goes through `tokio::net::lookup_host` so
    /// hostnames the `cof://` URL grammar accepts (see `from_url`) do not
    /// silently fail a plain `str::parse::<SocketAddr>()`.
    pub async fn socket_addr(&self) -> Result<SocketAddr, CofError> {
        let addr = format!("{}:{}", self.host, self.port);
        tokio::net::lookup_host(&addr)
            .await
            .map_err(|e| CofError::Custom(format!("cannot resolve {addr}: {e}")))?
            .next()
            .ok_or_else(|| CofError::Custom(format!("no addresses found for {addr}")))
    }
}
