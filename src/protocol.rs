//! SOCKS5 connect-subset protocol parsing
//!
//! Implements the shared address record format:
//! - Type (1 byte: IPv4=1, domain=3, IPv6=4)
//! - Address (4 / 16 / length-prefixed bytes per type)
//! - Port (2 bytes, big-endian)
//!
//! plus the client-facing handshake: method negotiation, connect request,
//! address decode with raw capture, and the fixed success reply. The same
//! record, captured verbatim during the handshake, is the only payload the
//! client replays into the tunnel before relay data.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::lookup_host;

use crate::error::{Result, SocksslError};

/// Address type constants
const ATYP_IPV4: u8 = 1;
const ATYP_DOMAIN: u8 = 3;
const ATYP_IPV6: u8 = 4;

/// SOCKS protocol version
const SOCKS_VERSION: u8 = 5;
/// The only authentication method accepted
const METHOD_NO_AUTH: u8 = 0;
/// The only command accepted
const CMD_CONNECT: u8 = 1;

/// Fixed success reply. The zero address is a literal wire contract:
/// clients never inspect it, and the remote side never learns the
/// actual bound address.
pub const SUCCESS_REPLY: [u8; 10] = [5, 0, 0, 1, 0, 0, 0, 0, 0, 0];

/// Destination address carried in an address record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// IPv4 address
    IPv4([u8; 4], u16),
    /// IPv6 address
    IPv6([u8; 16], u16),
    /// Domain name
    Domain(String, u16),
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::IPv4(ip, port) => write!(f, "{}:{}", Ipv4Addr::from(*ip), port),
            Address::IPv6(ip, port) => write!(f, "[{}]:{}", Ipv6Addr::from(*ip), port),
            Address::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl Address {
    /// Resolve to a socket address, taking the first DNS result for domains
    pub async fn to_socket_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            Address::IPv4(ip, port) => Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(*ip)), *port)),
            Address::IPv6(ip, port) => Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(*ip)), *port)),
            Address::Domain(domain, port) => {
                let mut addrs = lookup_host(format!("{}:{}", domain, port)).await?;
                addrs.next().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no addresses found for {}", domain),
                    )
                })
            }
        }
    }
}

/// Decode one address record from the stream.
///
/// Reads exactly one type byte, for domains exactly one length byte, then
/// the address and port in a single fixed-size read. When `capture` is
/// supplied, every byte consumed is appended to it in read order so the
/// caller can replay the record byte-for-byte.
pub async fn decode_address<R>(stream: &mut R, mut capture: Option<&mut Vec<u8>>) -> Result<Address>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 1];
    read_record_bytes(stream, &mut tag).await?;
    if let Some(raw) = capture.as_deref_mut() {
        raw.extend_from_slice(&tag);
    }

    let addr_len = match tag[0] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            read_record_bytes(stream, &mut len).await?;
            if let Some(raw) = capture.as_deref_mut() {
                raw.extend_from_slice(&len);
            }
            len[0] as usize
        }
        other => return Err(SocksslError::MalformedAddress(other)),
    };

    // address bytes plus the 2-byte port
    let mut buf = vec![0u8; addr_len + 2];
    read_record_bytes(stream, &mut buf).await?;
    if let Some(raw) = capture.as_deref_mut() {
        raw.extend_from_slice(&buf);
    }

    let port = u16::from_be_bytes([buf[addr_len], buf[addr_len + 1]]);
    let addr = match tag[0] {
        ATYP_IPV4 => {
            let mut ip = [0u8; 4];
            ip.copy_from_slice(&buf[..4]);
            Address::IPv4(ip, port)
        }
        ATYP_IPV6 => {
            let mut ip = [0u8; 16];
            ip.copy_from_slice(&buf[..16]);
            Address::IPv6(ip, port)
        }
        // domain bytes are taken as-is, no character-set validation
        _ => Address::Domain(String::from_utf8_lossy(&buf[..addr_len]).into_owned(), port),
    };
    Ok(addr)
}

async fn read_record_bytes<R>(stream: &mut R, buf: &mut [u8]) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    stream.read_exact(buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            SocksslError::TruncatedInput
        } else {
            SocksslError::Io(e)
        }
    })?;
    Ok(())
}

/// Run the client-facing handshake to completion.
///
/// Drives method negotiation and the connect request, decodes the
/// destination with capture enabled, and acknowledges with the fixed
/// reply. Returns the destination and the captured address-record bytes,
/// ready for verbatim replay into the tunnel. Any failure aborts
/// immediately; the caller owns closing the connection.
pub async fn handshake<S>(stream: &mut S) -> Result<(Address, Vec<u8>)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_method(stream).await?;
    read_connect_request(stream).await?;

    let mut raw = Vec::new();
    let addr = match decode_address(stream, Some(&mut raw)).await {
        Ok(addr) => addr,
        Err(SocksslError::Io(e)) => return Err(SocksslError::Io(e)),
        Err(_) => return Err(SocksslError::HandshakeRejected("malformed address record")),
    };

    stream.write_all(&SUCCESS_REPLY).await?;
    Ok((addr, raw))
}

/// Method negotiation: `[version][nmethods][methods...]`. The list must
/// offer the no-auth method; the version byte is consumed unchecked.
async fn negotiate_method<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = [0u8; 2];
    stream.read_exact(&mut head).await?;
    let mut methods = vec![0u8; head[1] as usize];
    stream.read_exact(&mut methods).await?;

    if !methods.contains(&METHOD_NO_AUTH) {
        return Err(SocksslError::HandshakeRejected("no authentication required"));
    }

    stream.write_all(&[SOCKS_VERSION, METHOD_NO_AUTH]).await?;
    Ok(())
}

/// Connect request: `[version][command][reserved]`. Only the command byte
/// is validated.
async fn read_connect_request<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut head = [0u8; 3];
    stream.read_exact(&mut head).await?;
    if head[1] != CMD_CONNECT {
        return Err(SocksslError::UnsupportedCommand(head[1]));
    }
    Ok(())
}
