//! Front-to-back flow over an in-memory tunnel: a local application
//! drives the SOCKS handshake, the captured address record is replayed
//! into the tunnel, and the back-end agent dials the destination and
//! relays the payload both ways.

use std::net::{IpAddr, SocketAddr};

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use sockssl::handler::run_back_agent;
use sockssl::protocol::{self, SUCCESS_REPLY};
use sockssl::relay::relay;

#[tokio::test]
async fn socks_request_relayed_through_tunnel() {
    // destination: echoes until end-of-stream
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dest_addr = listener.local_addr().unwrap();
    let echo = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let (mut r, mut w) = stream.split();
        tokio::io::copy(&mut r, &mut w).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    // back end, fed by the front end through an in-memory tunnel
    let (tunnel_front, tunnel_back) = duplex(64 * 1024);
    let tunnel_peer: SocketAddr = "198.51.100.9:51000".parse().unwrap();
    let back = tokio::spawn(run_back_agent(tunnel_back, tunnel_peer));

    // front end: handshake against the local application, replay the
    // captured record, then relay
    let (mut app, mut local) = duplex(64 * 1024);
    let front = tokio::spawn(async move {
        let (target, raw) = protocol::handshake(&mut local).await.unwrap();
        assert_eq!(target.to_string(), dest_addr.to_string());

        let mut tunnel = tunnel_front;
        tunnel.write_all(&raw).await.unwrap();
        relay(local, tunnel).await
    });

    // the local application speaks the SOCKS connect subset
    let ip = match dest_addr.ip() {
        IpAddr::V4(v4) => v4.octets(),
        IpAddr::V6(_) => unreachable!("listener bound to IPv4"),
    };
    app.write_all(&[5, 1, 0]).await.unwrap();
    let mut method_reply = [0u8; 2];
    app.read_exact(&mut method_reply).await.unwrap();
    assert_eq!(method_reply, [5, 0]);

    let mut request = vec![5u8, 1, 0, 1];
    request.extend_from_slice(&ip);
    request.extend_from_slice(&dest_addr.port().to_be_bytes());
    app.write_all(&request).await.unwrap();

    let mut reply = [0u8; 10];
    app.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply, SUCCESS_REPLY);

    // payload through both relays and back
    app.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    app.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");

    // closing the application unwinds the whole chain
    app.shutdown().await.unwrap();
    let mut rest = Vec::new();
    app.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());

    let counts = front.await.unwrap();
    assert_eq!(counts.tx, 4);
    assert_eq!(counts.rx, 4);

    back.await.unwrap().unwrap();
    echo.await.unwrap();
}
