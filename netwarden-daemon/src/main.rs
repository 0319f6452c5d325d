use anyhow::Result;
use clap::Parser;

use netwarden_core::config::NetwardenConfig;
use netwarden_daemon::cli::DaemonCli;
use netwarden_daemon::logging;
use netwarden_daemon::orchestrator::{self, Orchestrator, Shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = match &cli.config {
        Some(path) => NetwardenConfig::load(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", path.display(), e))?,
        None => {
            let mut config = NetwardenConfig::default();
            config.apply_env_overrides();
            config
        }
    };
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    logging::init_tracing(&config.general)?;

    if cli.validate {
        let classifier = orchestrator::check_config(&config).await?;
        println!(
            "configuration OK (classifier: {})",
            if classifier { "loaded" } else { "disabled" }
        );
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "netwarden-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    match orchestrator.run().await? {
        Shutdown::Requested(_) => {
            tracing::info!("netwarden-daemon shut down");
            Ok(())
        }
        Shutdown::Fatal(e) => Err(anyhow::anyhow!("flow engine halted: {}", e)),
        Shutdown::SourceFailed(e) => Err(e.context("packet source failed")),
    }
}
