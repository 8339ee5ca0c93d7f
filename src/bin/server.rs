//! SockSSL back end entry point

use anyhow::Result;
use sockssl::config::ServerArgs;
use sockssl::logger::{self, log};
use sockssl::runner;

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Install ring as the default crypto provider for rustls
    // This must be done before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = ServerArgs::parse_args();
    args.validate()?;
    logger::init_logger(&args.log_level);

    tokio::select! {
        result = runner::run_server(args) => result,
        _ = runner::shutdown_signal() => {
            log::info!("Shutdown signal received, exiting");
            Ok(())
        }
    }
}
