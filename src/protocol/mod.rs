//! Wire protocol: packet framing, UDP transport, and the session
//! client/server built on top of them.

pub mod client;
pub mod packet;
pub mod server;
pub mod transport;
pub mod types;
