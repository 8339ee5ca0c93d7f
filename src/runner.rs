//! Listener setup and accept loops
//!
//! Both processes follow the same shape: bind through socket2 so the
//! listener can be tuned, then accept forever, spawning one agent task
//! per connection. Accept and per-connection errors are logged and never
//! stop the loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{ClientArgs, ServerArgs};
use crate::handler;
use crate::logger::log;
use crate::tls::{self, TunnelConnector};

/// TCP keepalive interval; dead peers are detected in ~45s (3 probes)
const TCP_KEEPALIVE_SECS: u64 = 15;

/// Listen backlog for pending connections
const TCP_BACKLOG: i32 = 1024;

/// Bind a TCP listener with SO_REUSEADDR for fast restarts
fn bind_listener(addr: &str) -> Result<TcpListener> {
    let socket_addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid listen address {}", addr))?;

    let socket = Socket::new(
        match socket_addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(TCP_BACKLOG)?;

    Ok(TcpListener::from_std(socket.into())?)
}

/// Lower latency and detect dead peers on an accepted or dialed socket
fn tune_stream(stream: &TcpStream) {
    let _ = stream.set_nodelay(true);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(TCP_KEEPALIVE_SECS))
        .with_interval(Duration::from_secs(TCP_KEEPALIVE_SECS));
    let _ = SockRef::from(stream).set_tcp_keepalive(&keepalive);
}

/// Front-end accept loop: local SOCKS connections in, tunnel out.
pub async fn run_client(args: ClientArgs) -> Result<()> {
    let tunnel = Arc::new(TunnelConnector::new(
        &args.root_ca,
        &args.cert,
        &args.key,
        args.server_addr(),
    )?);

    let listener = bind_listener(&args.listen_addr())?;
    let local_addr = listener.local_addr()?;
    log::info!(address = %local_addr, server = %tunnel.server_addr(), "SockSSL client serving");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::connection(&peer.to_string(), "new");
                tune_stream(&stream);

                let tunnel = Arc::clone(&tunnel);
                tokio::spawn(async move {
                    if let Err(e) = handler::run_front_agent(stream, peer, &tunnel).await {
                        log::warn!(peer = %peer, error = %e, "Connection failed");
                    }
                    log::connection(&peer.to_string(), "closed");
                });
            }
            Err(e) => {
                log::error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Back-end accept loop: tunnel connections in, destinations out.
pub async fn run_server(args: ServerArgs) -> Result<()> {
    let acceptor = tls::build_acceptor(&args.root_ca, &args.cert, &args.key)?;

    let listener = bind_listener(&args.listen_addr())?;
    let local_addr = listener.local_addr()?;
    log::info!(address = %local_addr, "SockSSL server serving");

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::connection(&peer.to_string(), "new");
                tune_stream(&stream);

                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            if let Err(e) = handler::run_back_agent(tls_stream, peer).await {
                                log::warn!(peer = %peer, error = %e, "Connection failed");
                            }
                        }
                        Err(e) => {
                            log::warn!(peer = %peer, error = %e, "Tunnel handshake failed");
                        }
                    }
                    log::connection(&peer.to_string(), "closed");
                });
            }
            Err(e) => {
                log::error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

/// Resolves when a shutdown signal arrives
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM");

        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
