//! Example relay entry point.
//!
//! Binds the relay and runs until interrupted, reporting the room count
//! once a minute. Battle rooms are created through
//! [`LockstepServer::registry`] by the deployment's admin surface, which is
//! not part of this binary.

use std::time::Duration;

use clap::Parser;
use lockstep::{LockstepServer, ServerError};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "lockstep-server",
    about = "Authoritative relay for lock-step multiplayer battles"
)]
struct Args {
    /// Address the relay listens on.
    #[arg(long, default_value = "0.0.0.0:10086")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = LockstepServer::bind(&args.bind).await?;
    info!(addr = %server.local_addr(), "relay running");

    let mut report = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => {
                info!(
                    rooms = server.registry().count(),
                    connections = server.total_conn(),
                    "status"
                );
            }
        }
    }

    info!("quitting");
    server.stop().await;
    Ok(())
}
