//! zonedns binary entry point.

use clap::Parser;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use zonedns::{telemetry, Config, DnsServer};

/// Authoritative DNS server synthesizing zones from cloud inventory.
#[derive(Parser, Debug)]
#[command(name = "zonedns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML).
    #[arg(short, long, default_value = "zonedns.toml")]
    config: PathBuf,
}

/// Cancel `token` on the first SIGINT or SIGTERM.
async fn watch_signals(token: CancellationToken) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }
    token.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()))
        .add_source(
            config::Environment::with_prefix("ZONEDNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        private_base = %config.dns.private_base,
        public_base = %config.dns.public_base,
        "Starting zonedns"
    );

    let server = match DnsServer::from_config(config) {
        Ok(server) => server,
        Err(e) => {
            error!("startup failed: {}", e);
            telemetry::shutdown();
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    let signals = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_signals(signals).await {
            error!("failed to install signal handlers: {}", e);
        }
    });

    let result = server.run(cancel).await;

    telemetry::shutdown();

    if let Err(e) = result {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("zonedns shutdown complete");
    Ok(())
}
