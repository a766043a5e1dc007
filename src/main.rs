//! Stereofix CLI
//!
//! Command-line front end for offline rendering and settings inspection.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stereofix::cli::commands::{self, RenderRequest};
use stereofix::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Stereofix v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Stereofix v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            mode,
            music_removal,
            variant,
            settings,
            bit_depth,
        } => {
            let request = RenderRequest {
                input,
                output,
                mode,
                music_removal,
                variant,
                settings,
                bit_depth,
            };
            commands::render(&request)
                .with_context(|| format!("failed to render {}", request.input.display()))?;
        }
        Commands::Resolve {
            settings,
            sample_rate,
        } => {
            commands::resolve(&settings, sample_rate)
                .with_context(|| format!("failed to resolve {}", settings.display()))?;
        }
    }
    Ok(())
}
