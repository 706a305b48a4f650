//! Print the structured-data document.

use anyhow::{Context, Result};
use ezsite_core::SoftwareApplication;

/// Run the schema command.
pub fn run(compact: bool) -> Result<()> {
    let app = SoftwareApplication::ez_term();

    let json = if compact {
        serde_json::to_string(&app)
    } else {
        app.to_json_ld()
    }
    .context("Failed to serialize structured data")?;

    println!("{json}");

    Ok(())
}
