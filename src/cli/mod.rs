//! CLI Module
//!
//! Offline front end: renders WAV files through the same graphs the live
//! engine builds, and shows how a settings document resolves.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stereofix - stereo collapse and vocal isolation for media audio
#[derive(Parser, Debug)]
#[command(name = "stereofix")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a WAV file through the processing graph
    #[command(name = "render")]
    Render {
        /// Input WAV file (mono or stereo)
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (always stereo)
        #[arg(short, long)]
        output: PathBuf,

        /// Stereo mode: left, right or average
        #[arg(short, long)]
        mode: Option<String>,

        /// Enable vocal isolation
        #[arg(long)]
        music_removal: bool,

        /// Vocal isolation variant: basic, enhanced or spectral
        #[arg(long)]
        variant: Option<String>,

        /// Settings document; flags override its values
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output bit depth (16, 24 or 32)
        #[arg(long, default_value_t = 32)]
        bit_depth: u16,
    },

    /// Print the configuration and graph a settings document resolves to
    #[command(name = "resolve")]
    Resolve {
        /// Settings document
        #[arg(short, long)]
        settings: PathBuf,

        /// Sample rate to build the graph for
        #[arg(long, default_value_t = 48000)]
        sample_rate: u32,
    },
}
