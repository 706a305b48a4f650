//! Preview server command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ezsite_server::PreviewServer;

use super::load_site;

/// Run the preview command.
pub async fn run(
    config_path: &Path,
    port: Option<u16>,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let site = load_site(config_path, |_| {})?;

    let mut server = PreviewServer::new(&site);
    if !open {
        server = server.with_open(false);
    }
    if let Some(port) = port {
        server = server.with_port(port);
    }
    if let Some(dir) = dir {
        server = server.with_dir(dir);
    }

    if let Err(e) = server.start().await {
        if matches!(e, ezsite_server::ServerError::MissingDirectory(_)) {
            anyhow::bail!("{}. Run 'ezsite build' first.", e);
        }
        return Err(e.into());
    }

    Ok(())
}
