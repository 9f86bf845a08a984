//! wgpudrv CLI - test renders and driver options
//!
//! # Commands
//!
//! - `wgpudrv render-test` - Render a synthetic frame offscreen and save it as PNG
//! - `wgpudrv options` - Print the driver options, writing defaults to the file
//!
//! # Usage
//!
//! ```bash
//! wgpudrv render-test --width 640 --height 480 --out frame.png
//! wgpudrv options --variant deus-ex
//! ```

mod options;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use wgpudrv_common::EngineVariant;

/// wgpudrv CLI - test renders and driver options
#[derive(Parser)]
#[command(name = "wgpudrv")]
#[command(about = "Test renders and driver options for the wgpudrv render device")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a synthetic frame offscreen and save it as PNG
    RenderTest(render_test::RenderTestArgs),

    /// Print the driver options, writing defaults to the file
    Options(options::OptionsArgs),
}

/// Engine the device is configured for
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum Variant {
    Unreal,
    #[default]
    UnrealTournament,
    DeusEx,
    Rune,
}

impl From<Variant> for EngineVariant {
    fn from(variant: Variant) -> Self {
        match variant {
            Variant::Unreal => EngineVariant::Unreal,
            Variant::UnrealTournament => EngineVariant::UnrealTournament,
            Variant::DeusEx => EngineVariant::DeusEx,
            Variant::Rune => EngineVariant::Rune,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RenderTest(args) => render_test::execute(args),
        Commands::Options(args) => options::execute(args),
    }
}
