//! Development server command.

use std::path::Path;

use anyhow::Result;
use ezsite_core::SoftwareApplication;
use ezsite_server::DevServer;

use super::load_site;

/// Run the dev server.
pub async fn run(config_path: &Path, port: Option<u16>, open: bool) -> Result<()> {
    let site = load_site(config_path, |_| {})?;

    let mut server = DevServer::new(&site, &SoftwareApplication::ez_term())?;
    if !open {
        server = server.with_open(false);
    }
    if let Some(port) = port {
        server = server.with_port(port);
    }

    tracing::info!(
        "Starting development server for {} ({})",
        site.source_dir().display(),
        site.target()
    );

    server.start().await?;

    Ok(())
}
