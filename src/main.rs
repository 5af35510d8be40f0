use crate::runner::ProcessRunner;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

mod config;
mod error;
mod helm;
mod image_reference;
mod path_lookup;
mod runner;
mod state;
mod task;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// image-stream allows you to tag and copy docker images to a specified registry.
#[derive(Parser, Debug)]
#[command(name = "image-stream", version, about)]
struct Cli {
    /// Path to the configuration file containing the registry and image details.
    configuration: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    info!("Starting image-stream {}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&cli.configuration).with_context(|| {
        format!(
            "Failed to load configuration {}",
            cli.configuration.display()
        )
    })?;
    let mut tasks = config::build_tasks(&config.images, &config.global)
        .context("Failed to build delivery tasks")?;
    let tools = config.toolchain();

    task::deliver_all(&mut tasks, &ProcessRunner, &tools)
        .await
        .context("Delivery aborted")?;

    info!("Delivered {} tasks", tasks.len());
    Ok(())
}
