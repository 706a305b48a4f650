//! Subcommand implementations.

pub mod build;
pub mod dev;
pub mod init;
pub mod preview;
pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use ezsite_core::{ConfigFile, DeploymentTarget, SiteConfig};

/// Load site.toml, apply `overrides`, and resolve the deployment target.
///
/// Directories named in the file are relative to the file; overrides from
/// the command line stay relative to the working directory.
pub fn load_site(
    config_path: &Path,
    overrides: impl FnOnce(&mut ConfigFile),
) -> Result<SiteConfig> {
    let mut file = ConfigFile::load(config_path)?;
    file.resolve_paths(config_path);
    overrides(&mut file);

    let target = DeploymentTarget::from_env();
    SiteConfig::new(file, target).context("Invalid site configuration")
}
