//! Tunnel credentials: TLS connector and acceptor
//!
//! Both directions of the tunnel are authenticated against the same
//! private CA: the server presents its site certificate, and the client
//! must present a certificate the CA signed. The resulting configuration
//! is built once at startup and shared read-only by every connection.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::client::{ClientSessionMemoryCache, Resumption};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio::net::TcpStream;
use tokio_rustls::{client, TlsAcceptor, TlsConnector};

use crate::error::{self, SocksslError};
use crate::logger::log;

/// Sessions kept for TLS resumption across reconnects to the same server
const SESSION_CACHE_SIZE: usize = 32;

/// Client-side tunnel configuration: the fixed remote endpoint plus the
/// credentials presented to it.
pub struct TunnelConnector {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    server_addr: String,
}

impl TunnelConnector {
    pub fn new(ca_path: &str, cert_path: &str, key_path: &str, server_addr: String) -> Result<Self> {
        let roots = load_root_store(ca_path)?;
        let certs = load_certs(cert_path)?;
        let key = load_private_key(key_path)?;

        let mut config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .context("building TLS client configuration")?;
        config.resumption =
            Resumption::store(Arc::new(ClientSessionMemoryCache::new(SESSION_CACHE_SIZE)));

        let server_name = server_name_for(&server_addr)?;
        log::info!(ca = ca_path, cert = cert_path, key = key_path, "Loaded TLS credentials");

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
            server_addr,
        })
    }

    /// Remote endpoint this connector dials
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Open one tunnel connection: TCP dial plus TLS client handshake.
    pub async fn connect(&self) -> error::Result<client::TlsStream<TcpStream>> {
        let tcp = TcpStream::connect(&self.server_addr)
            .await
            .map_err(SocksslError::DialFailure)?;
        let _ = tcp.set_nodelay(true);
        self.connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(SocksslError::TunnelFailure)
    }
}

/// Build the server-side acceptor. Tunnel clients must present a
/// certificate signed by the CA; verification completes before any
/// tunnel byte is readable.
pub fn build_acceptor(ca_path: &str, cert_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let roots = load_root_store(ca_path)?;
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .context("building client certificate verifier")?;

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .context("building TLS server configuration")?;

    log::info!(ca = ca_path, cert = cert_path, key = key_path, "Loaded TLS credentials");
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_root_store(path: &str) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .with_context(|| format!("adding CA certificate from {} to trust store", path))?;
    }
    Ok(roots)
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening certificate file {}", path))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<std::result::Result<Vec<_>, _>>()?;

    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {}", path));
    }
    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening key file {}", path))?;
    let mut reader = BufReader::new(file);
    let key = rustls_pemfile::private_key(&mut reader)?;
    key.ok_or_else(|| anyhow!("no private key found in {}", path))
}

/// SNI for the tunnel, taken from the host portion of `host:port`.
fn server_name_for(addr: &str) -> Result<ServerName<'static>> {
    let host = match addr.rsplit_once(':') {
        Some((host, _port)) => host.trim_start_matches('[').trim_end_matches(']'),
        None => addr,
    };
    ServerName::try_from(host.to_string()).map_err(|_| anyhow!("invalid server name: {}", host))
}
