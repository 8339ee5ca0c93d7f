//! SockSSL: a SOCKS5-over-mutual-TLS tunneling proxy
//!
//! Two binaries share this crate:
//! - `sockssl-client` listens on a local interface, speaks the SOCKS5
//!   connect subset to local applications, and forwards each accepted
//!   connection through a mutually authenticated TLS tunnel.
//! - `sockssl-server` terminates the tunnel, decodes the destination
//!   address, dials it over plain TCP, and relays bytes both ways.
//!
//! Module layout:
//! - `protocol`: address codec and the client-facing SOCKS handshake
//! - `relay`: bidirectional copy with traffic accounting
//! - `handler`: per-connection agents for both processes
//! - `tls`: tunnel credentials (connector and acceptor)
//! - `runner`: listener setup and accept loops

pub mod config;
pub mod error;
pub mod handler;
pub mod logger;
pub mod protocol;
pub mod relay;
pub mod runner;
pub mod tls;

pub use error::{Result, SocksslError};
pub use protocol::{decode_address, handshake, Address};
pub use relay::{relay, RelayResult};
