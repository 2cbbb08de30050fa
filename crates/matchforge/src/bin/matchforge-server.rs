//! matchforge-server: runs a Matchforge server until Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use matchforge::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "matchforge-server", version, about = "Matchmaking and game room relay server")]
struct Args {
    /// TOML configuration file. Built-in defaults are used without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), MatchforgeError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "failed to load config");
            e
        })?,
        None => ServerConfig::default(),
    };

    let mut builder = MatchforgeServerBuilder::from_config(&config);
    if let Some(bind) = &args.bind {
        builder = builder.bind(bind);
    }

    match &config.auth.secret {
        Some(secret) => serve(builder, SignedTokenAuthenticator::new(secret)).await,
        None => {
            tracing::warn!("no auth secret configured, trusting client-supplied identities");
            serve(builder, DevAuthenticator).await
        }
    }
}

async fn serve<A: Authenticator>(
    builder: MatchforgeServerBuilder,
    auth: A,
) -> Result<(), MatchforgeError> {
    let server = builder.build(auth).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
}
