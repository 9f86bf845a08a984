//! Options command - print and initialize the option file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use wgpudrv_common::{DriverOptions, TomlOptionStore};

use crate::Variant;

/// Arguments for the options command
#[derive(Args)]
pub struct OptionsArgs {
    /// Option file (defaults to wgpudrv.toml in the config directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Engine variant, selects variant-specific defaults
    #[arg(long, value_enum, default_value_t)]
    pub variant: Variant,

    /// Print without writing missing defaults back
    #[arg(long)]
    pub dry_run: bool,
}

pub fn execute(args: OptionsArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => TomlOptionStore::default_path()
            .context("Could not determine the configuration directory")?,
    };

    let mut store = TomlOptionStore::open(&path);
    let options = DriverOptions::read_from(&mut store, args.variant.into());

    if store.is_dirty() && !args.dry_run {
        store.save()?;
        tracing::info!("Wrote default options to {}", path.display());
    }

    let rendered = toml::to_string_pretty(&options).context("Failed to format options")?;
    println!("# {}", path.display());
    print!("{rendered}");
    Ok(())
}
