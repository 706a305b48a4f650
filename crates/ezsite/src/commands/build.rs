//! Static site build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ezsite_core::SoftwareApplication;
use ezsite_static::StaticBuilder;

use super::load_site;

/// Run the build command.
pub fn run(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    tracing::info!("Building static site...");

    let site = load_site(config_path, |file| {
        if let Some(dir) = output {
            file.output.pages_dir = dir.clone();
            file.output.assets_dir = dir;
        }
    })?;

    let result = StaticBuilder::new(site, SoftwareApplication::ez_term())?.build()?;

    tracing::info!(
        "Built {} pages and {} assets in {}ms",
        result.pages,
        result.assets,
        result.duration_ms
    );

    if result.compressed > 0 {
        tracing::info!("Precompressed {} files", result.compressed);
    }

    if !result.warnings.is_empty() {
        tracing::warn!("{} broken links reported", result.warnings.len());
    }

    tracing::info!("Output: {}", result.pages_dir.display());

    Ok(())
}
