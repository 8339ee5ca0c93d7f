//! Per-connection agents
//!
//! Each accepted connection gets one agent task and nothing shared
//! beyond the read-only tunnel configuration. Agents decide all failure
//! policy: any error closes the streams this connection opened and
//! abandons it, with no retry and no fallback. The accept loops keep
//! serving other connections.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Result, SocksslError};
use crate::logger::log;
use crate::protocol;
use crate::relay::relay;
use crate::tls::TunnelConnector;

/// Front-end agent: drive the SOCKS handshake against a local client,
/// open the tunnel, replay the captured address record verbatim, then
/// relay until both directions drain.
pub async fn run_front_agent<S>(
    mut local: S,
    peer: SocketAddr,
    tunnel: &TunnelConnector,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (target, raw) = protocol::handshake(&mut local).await?;
    let target = target.to_string();
    log::info!(peer = %peer, target = %target, "Handshake complete");

    let mut remote = tunnel.connect().await?;
    remote
        .write_all(&raw)
        .await
        .map_err(SocksslError::TunnelFailure)?;
    log::info!(peer = %peer, target = %target, "Tunnel established");

    let start = Instant::now();
    let counts = relay(local, remote).await;
    log::info!(
        peer = %peer,
        target = %target,
        tx = counts.tx,
        rx = counts.rx,
        elapsed = elapsed_secs(start),
        "Connection finished"
    );
    Ok(())
}

/// Back-end agent: the tunnel handshake (including client certificate
/// verification) has already completed; decode the destination from the
/// tunnel stream, dial it, then relay.
pub async fn run_back_agent<S>(mut tunnel: S, peer: SocketAddr) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let addr = protocol::decode_address(&mut tunnel, None).await?;
    let target = addr.to_string();
    log::info!(peer = %peer, target = %target, "Destination received");

    let dest_addr = addr.to_socket_addr().await.map_err(SocksslError::DialFailure)?;
    let dest = TcpStream::connect(dest_addr)
        .await
        .map_err(SocksslError::DialFailure)?;
    let _ = dest.set_nodelay(true);
    log::info!(peer = %peer, target = %target, "Destination connected");

    let start = Instant::now();
    let counts = relay(tunnel, dest).await;
    log::info!(
        peer = %peer,
        target = %target,
        tx = counts.tx,
        rx = counts.rx,
        elapsed = elapsed_secs(start),
        "Connection finished"
    );
    Ok(())
}

/// Wall-clock duration rounded to whole seconds
fn elapsed_secs(start: Instant) -> u64 {
    start.elapsed().as_secs_f64().round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_back_agent_dials_and_relays() {
        // echo destination
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dest_addr = listener.local_addr().unwrap();
        let echo = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (mut r, mut w) = stream.split();
            tokio::io::copy(&mut r, &mut w).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let (mut tunnel_peer, tunnel) = duplex(64 * 1024);
        let peer: SocketAddr = "198.51.100.7:40000".parse().unwrap();
        let agent = tokio::spawn(run_back_agent(tunnel, peer));

        let ip = match dest_addr.ip() {
            IpAddr::V4(v4) => v4.octets(),
            IpAddr::V6(_) => unreachable!("listener bound to IPv4"),
        };
        let mut record = vec![1u8];
        record.extend_from_slice(&ip);
        record.extend_from_slice(&dest_addr.port().to_be_bytes());
        tunnel_peer.write_all(&record).await.unwrap();

        tunnel_peer.write_all(b"hello").await.unwrap();
        tunnel_peer.shutdown().await.unwrap();

        let mut out = Vec::new();
        tunnel_peer.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");

        agent.await.unwrap().unwrap();
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn test_back_agent_rejects_malformed_record() {
        let (mut tunnel_peer, tunnel) = duplex(1024);
        let peer: SocketAddr = "198.51.100.7:40001".parse().unwrap();
        let agent = tokio::spawn(run_back_agent(tunnel, peer));

        tunnel_peer.write_all(&[9, 0, 0, 0, 0, 0, 0]).await.unwrap();

        let err = agent.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksslError::MalformedAddress(9)));
    }

    #[tokio::test]
    async fn test_back_agent_reports_dial_failure() {
        let (mut tunnel_peer, tunnel) = duplex(1024);
        let peer: SocketAddr = "198.51.100.7:40002".parse().unwrap();
        let agent = tokio::spawn(run_back_agent(tunnel, peer));

        // loopback port 1 is refused immediately
        let record = [1u8, 127, 0, 0, 1, 0, 1];
        tunnel_peer.write_all(&record).await.unwrap();

        let err = agent.await.unwrap().unwrap_err();
        assert!(matches!(err, SocksslError::DialFailure(_)));
    }
}
