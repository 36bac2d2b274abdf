//! Termchat relay server binary.
//!
//! ```bash
//! termchat-server --port 3000
//! PORT=3000 RUST_LOG=debug termchat-server
//! ```

use std::time::Duration;

use clap::Parser;
use termchat_server::{ChatError, Server, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Group chat relay over WebSocket
#[derive(Parser, Debug)]
#[command(name = "termchat-server")]
#[command(version, about)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0")]
    addr: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Events queued per connection before new ones are dropped for it
    #[arg(long, default_value_t = 64)]
    outbound_capacity: usize,

    /// Seconds a new connection may stay silent before it is dropped
    #[arg(long, default_value_t = 10)]
    idle_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = ServerConfig::builder()
        .addr(args.addr)
        .port(args.port)
        .outbound_capacity(args.outbound_capacity)
        .idle_timeout(Duration::from_secs(args.idle_timeout_secs))
        .build();

    let server = Server::bind(config).await?;
    tracing::info!("termchat server listening on {}", server.local_addr()?);

    server.run_until(shutdown_signal()).await?;

    tracing::info!("server closed");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
    }
}
