//! warden — a policy-guarded terminal tool server and chat agent.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("warden=debug")
            .init();
    }

    match cli.command {
        Commands::Serve { policy } => commands::serve::run(&policy).await,
        Commands::Chat {
            policy,
            model,
            base_url,
            max_steps,
        } => {
            commands::chat::run(
                &policy,
                model.as_deref(),
                base_url.as_deref(),
                max_steps,
            )
            .await
        }
    }
}
