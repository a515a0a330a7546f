//! `flowforge`: optimize an agent workflow for a task and print the result.
//!
//! Configuration comes from `FLOWFORGE_CONFIG` / `FLOWFORGE_ENV` and the
//! `FLOWFORGE_*` overrides (a `.env` file is honored), then from flags.
//!
//! ```text
//! flowforge "rank risky accounts by transfer volume" --seed 42 -o ./workflow
//! ```
//!
//! Ctrl+C stops the search at the next round boundary; the best workflow found
//! so far is still reported.

mod args;

use anyhow::Context;
use args::Cli;
use clap::Parser;
use flowforge_core::cancel::CancellationFlag;
use flowforge_core::config::OptimizeConfig;
use flowforge_runtime::RuntimeBackend;
use flowforge_runtime::metrics::MetricsServer;
use flowforge_search::optimize;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = OptimizeConfig::from_env().context("failed to load configuration")?;
    cli.apply(&mut config);

    init_tracing(&config.observability.log_level);

    if config.observability.metrics_enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        MetricsServer::new(addr)
            .start()
            .context("failed to start metrics exporter")?;
    }

    let runtime =
        RuntimeBackend::from_config(&config.runtime).context("failed to build runtime")?;
    info!(
        runtime = runtime.name(),
        environment = ?config.environment,
        seed = cli.seed,
        "Starting flowforge"
    );

    let cancel = CancellationFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current round");
            on_signal.cancel();
        }
    });

    let result = optimize(runtime.clone(), &cli.task, config, cli.seed, &cancel).await?;

    if let Some(output) = &cli.output {
        let handle = result.materialize(&runtime, output).await?;
        info!(path = %handle.path.display(), bytes = handle.bytes, "Workflow written");
    }

    let rendered = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{rendered}");

    Ok(())
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
