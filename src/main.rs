// ABOUTME: Entry point for the dockutil CLI application.
// ABOUTME: Parses arguments, builds the client and prints each answer as JSON.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use dockutil::config::Config;
use dockutil::docker::{
    BollardConnector, CgroupIdProvider, ContainerListOptions, DockerClient,
};
use dockutil::error::Result;
use dockutil::types::ContainerId;
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let ctx = CancellationToken::new();
    let interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    if let Err(e) = run(cli, ctx).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    config.with_env_overrides()
}

async fn run(cli: Cli, ctx: CancellationToken) -> Result<()> {
    let config = load_config(&cli)?;
    let connector = BollardConnector::new(config.docker_host.clone(), config.query_timeout);
    let client = DockerClient::new(
        Arc::new(connector),
        Arc::new(CgroupIdProvider::default()),
        config.client_options(),
    );

    match cli.command {
        Commands::Images { all } => print_json(&client.images(&ctx, all).await?),
        Commands::Volumes => print_json(&client.count_volumes(&ctx).await?),
        Commands::Containers { all } => {
            let options = ContainerListOptions {
                all,
                ..Default::default()
            };
            print_json(&client.raw_container_list(&ctx, &options).await?)
        }
        Commands::Labels => print_json(&client.all_container_labels(&ctx).await?),
        Commands::Hostname => {
            println!("{}", client.hostname(&ctx).await?);
            Ok(())
        }
        Commands::Storage => print_json(&client.storage_stats(&ctx).await?),
        Commands::Resolve { reference } => {
            println!("{}", client.resolve_image_name(&ctx, &reference).await?);
            Ok(())
        }
        Commands::Inspect { id, size, no_cache } => {
            let id = ContainerId::new(id);
            let record = if no_cache {
                client.inspect_no_cache(&ctx, &id, size).await?
            } else {
                client.inspect(&ctx, &id, size).await?
            };
            let image = client
                .resolve_image_name_from_container(&ctx, &record)
                .await?;
            tracing::debug!("{} runs {}", record.name(), image);
            print_json(&record)
        }
        Commands::InspectSelf => print_json(&client.inspect_self(&ctx).await?),
        Commands::Stats { id } => {
            print_json(&client.container_stats(&ctx, &ContainerId::new(id)).await?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
