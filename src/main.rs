// Copyright (c) 2025 azenv contributors
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use azenv::{
    arm::ArmProvisioner,
    azureml::{AzureMl, AzureMlArgs},
    config::Settings,
    engine::Deployment,
    stack::Stack,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

/// Deploy an Azure ML environment from a YAML settings file.
#[derive(Debug, Parser)]
#[command(name = "azenv", version, about)]
struct Cli {
    /// Path to the environment settings file.
    #[arg(short, long, default_value = "settings.yaml")]
    config: PathBuf,

    /// Azure subscription id.
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription: Option<String>,

    /// ARM bearer token (`az account get-access-token`).
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resource graph in deploy order without touching Azure.
    Preview,
    /// Deploy the environment.
    Up,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("azenv-deploy")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug azenv preview
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json azenv up
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let cli = Cli::parse();

    info!(config = %cli.config.display(), "Loading environment settings");
    let settings = Settings::from_path(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    settings.validate().context("invalid settings")?;
    debug!(prefix = %settings.prefix, private = settings.enable_private_endpoint, "Settings validated");

    let mut stack = Stack::new();
    let name = format!("{}azml", settings.prefix);
    let env = AzureMl::register(&mut stack, &name, &AzureMlArgs::from_settings(&settings));
    info!(nodes = stack.len(), environment = %name, "Resource graph registered");

    match cli.command {
        Command::Preview => {
            let order = stack.deploy_order().context("invalid resource graph")?;
            for (position, handle) in order.iter().enumerate() {
                let node = stack.node(*handle);
                println!("{:>3}. [{}] {}", position + 1, node.kind_tag(), node.name);
            }
        }
        Command::Up => {
            let subscription = cli
                .subscription
                .context("--subscription or AZURE_SUBSCRIPTION_ID is required for `up`")?;
            let provisioner = ArmProvisioner::new(subscription, cli.token)
                .context("failed to build ARM client")?;

            let result = Deployment::run(&stack, &provisioner)
                .await
                .context("deployment failed")?;

            let workspace = result
                .state(env.workspace)
                .context("workspace state missing after deployment")?;
            info!(workspace = %workspace.name, id = %workspace.id, "Environment deployed");
            for (cluster_name, handle) in &env.compute_clusters {
                if let Some(state) = result.state(*handle) {
                    info!(cluster = %cluster_name, id = %state.id, "Compute cluster deployed");
                }
            }
        }
    }

    Ok(())
}
