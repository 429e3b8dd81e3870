pub mod aggregate;
pub mod assemble;
pub mod sample;
pub mod translate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rsm::RunConfig;

/// The config named by `--config`, or defaults.
pub fn load_config(cli: &crate::cli::Cli) -> Result<RunConfig> {
    match &cli.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

/// `dir/name`, refusing to clobber an existing file without `--force`.
pub fn output_path(cli: &crate::cli::Cli, dir: &Path, name: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    if path.exists() && !cli.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(path)
}
