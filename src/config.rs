//! CLI configuration for both binaries
//!
//! Options mirror each other where they overlap; every flag can also be
//! supplied through a `SOCKSSL_`-prefixed environment variable. The
//! referenced PEM files are checked for existence before startup so a
//! missing credential fails fast instead of on the first connection.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::Path;

/// Port appended to the server argument when it carries none
pub const DEFAULT_SERVER_PORT: u16 = 2080;

/// CLI arguments for the front end
#[derive(Parser, Debug, Clone)]
#[command(name = "sockssl-client", version, about = "SockSSL front end: local SOCKS5 listener tunneling to a SockSSL server")]
pub struct ClientArgs {
    /// Listen interface
    #[arg(short = 'i', long = "interface", env = "SOCKSSL_INTERFACE", default_value = "127.0.0.1")]
    pub interface: String,

    /// Listen port
    #[arg(short = 'p', long = "port", env = "SOCKSSL_PORT", default_value_t = 1080)]
    pub port: u16,

    /// Root CA certificate used to verify the server
    #[arg(long = "ca", env = "SOCKSSL_ROOT_CA", default_value = "root-ca.pem")]
    pub root_ca: String,

    /// Client certificate presented to the server
    #[arg(long = "cert", env = "SOCKSSL_CLIENT_CERT", default_value = "client-cert.pem")]
    pub cert: String,

    /// Client private key
    #[arg(long = "key", env = "SOCKSSL_CLIENT_KEY", default_value = "client-key.pem")]
    pub key: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log-level", env = "SOCKSSL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// SockSSL server address as host[:port]
    #[arg(value_name = "SERVER")]
    pub server: String,
}

impl ClientArgs {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the CLI arguments
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(anyhow!("server address is required"));
        }
        require_file(&self.root_ca, "root CA certificate")?;
        require_file(&self.cert, "client certificate")?;
        require_file(&self.key, "client private key")?;
        Ok(())
    }

    /// Address to listen on for local SOCKS connections
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }

    /// Server address with the default port appended when missing
    pub fn server_addr(&self) -> String {
        if self.server.contains(':') {
            self.server.clone()
        } else {
            format!("{}:{}", self.server, DEFAULT_SERVER_PORT)
        }
    }
}

/// CLI arguments for the back end
#[derive(Parser, Debug, Clone)]
#[command(name = "sockssl-server", version, about = "SockSSL back end: terminates mutual-TLS tunnels and dials destinations")]
pub struct ServerArgs {
    /// Listen interface
    #[arg(short = 'i', long = "interface", env = "SOCKSSL_INTERFACE", default_value = "0.0.0.0")]
    pub interface: String,

    /// Listen port
    #[arg(short = 'p', long = "port", env = "SOCKSSL_PORT", default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Root CA certificate used to verify tunnel clients
    #[arg(long = "ca", env = "SOCKSSL_ROOT_CA", default_value = "root-ca.pem")]
    pub root_ca: String,

    /// Server certificate
    #[arg(long = "cert", env = "SOCKSSL_SITE_CERT", default_value = "site-cert.pem")]
    pub cert: String,

    /// Server private key
    #[arg(long = "key", env = "SOCKSSL_SITE_KEY", default_value = "site-key.pem")]
    pub key: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log-level", env = "SOCKSSL_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerArgs {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the CLI arguments
    pub fn validate(&self) -> Result<()> {
        require_file(&self.root_ca, "root CA certificate")?;
        require_file(&self.cert, "server certificate")?;
        require_file(&self.key, "server private key")?;
        Ok(())
    }

    /// Address to listen on for tunnel connections
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }
}

fn require_file(path: &str, what: &str) -> Result<()> {
    if !Path::new(path).exists() {
        return Err(anyhow!("{} not found: {}", what, path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_args(server: &str) -> ClientArgs {
        ClientArgs::try_parse_from(["sockssl-client", server]).unwrap()
    }

    #[test]
    fn test_server_addr_appends_default_port() {
        let args = client_args("proxy.example.com");
        assert_eq!(args.server_addr(), "proxy.example.com:2080");
    }

    #[test]
    fn test_server_addr_keeps_explicit_port() {
        let args = client_args("proxy.example.com:443");
        assert_eq!(args.server_addr(), "proxy.example.com:443");
    }

    #[test]
    fn test_client_defaults() {
        let args = client_args("proxy.example.com");
        assert_eq!(args.listen_addr(), "127.0.0.1:1080");
        assert_eq!(args.root_ca, "root-ca.pem");
        assert_eq!(args.cert, "client-cert.pem");
        assert_eq!(args.key, "client-key.pem");
    }

    #[test]
    fn test_server_defaults() {
        let args = ServerArgs::try_parse_from(["sockssl-server"]).unwrap();
        assert_eq!(args.listen_addr(), "0.0.0.0:2080");
        assert_eq!(args.cert, "site-cert.pem");
        assert_eq!(args.key, "site-key.pem");
    }

    #[test]
    fn test_validate_missing_files() {
        let mut args = client_args("proxy.example.com");
        args.root_ca = "/nonexistent/root-ca.pem".to_string();
        assert!(args.validate().is_err());
    }
}
