//! Scaffold a site next to the config file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ezsite_core::{ConfigFile, SoftwareApplication};

/// Run the init command.
pub async fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing site...");

    if let Some(dir) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    } else {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
    }

    let mut config = ConfigFile::load(config_path)?;
    config.resolve_paths(config_path);
    let source_dir = config.site.source;
    fs::create_dir_all(&source_dir).context("Failed to create source directory")?;

    let index_path = source_dir.join("index.html");
    if !index_path.exists() || yes {
        let app = SoftwareApplication::ez_term();
        let page = DEFAULT_INDEX
            .replace("{name}", &app.name)
            .replace("{description}", &app.description);
        fs::write(&index_path, page).context("Failed to write index.html")?;
        tracing::info!("Created {}", index_path.display());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'ezsite dev' to start the development server.");

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# ezsite configuration
#
# The base path is not configured here. Build with GITHUB_PAGES=true to
# serve the site under /ez-term.

[site]
# Directory holding the prerendered pages and static assets
source = "site"

# Public origin, used for sitemap.xml and robots.txt
origin = "https://ezcorp-org.github.io"

[output]
pages = "build"
assets = "build"
# fallback = "404.html"
precompress = false
strict = true

[prerender]
# "fail", "warn" or "ignore"
handle_missing_id = "warn"
handle_http_error = "warn"

[server]
host = "0.0.0.0"
dev_port = 5173
preview_port = 4173
allowed_hosts = ["nixos.taile1c5b0.ts.net", ".ts.net"]
open = true
"#;

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{name}</title>
  <meta name="description" content="{description}">
</head>
<body>
  <main>
    <h1>{name}</h1>
    <p>{description}</p>
    <p><a href="/#install">Install</a></p>
    <h2 id="install">Install</h2>
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::load_site;
    use ezsite_core::{DeploymentTarget, SiteConfig};
    use ezsite_static::StaticBuilder;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scaffolds_config_and_index() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("site.toml");

        run(&config_path, false).await.unwrap();

        let file = ConfigFile::load(&config_path).unwrap();
        assert_eq!(file, ConfigFile::default());
        assert!(SiteConfig::new(file, DeploymentTarget::Default).is_ok());

        let index = fs::read_to_string(temp.path().join("site/index.html")).unwrap();
        assert!(index.contains("<title>ez-term</title>"));
    }

    #[tokio::test]
    async fn keeps_existing_files_without_yes() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("site.toml");
        fs::write(&config_path, "[site]\nsource = \"pages\"\n").unwrap();
        fs::create_dir_all(temp.path().join("pages")).unwrap();
        fs::write(temp.path().join("pages/index.html"), "<p>mine</p>").unwrap();

        run(&config_path, false).await.unwrap();

        assert_eq!(
            fs::read_to_string(&config_path).unwrap(),
            "[site]\nsource = \"pages\"\n"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("pages/index.html")).unwrap(),
            "<p>mine</p>"
        );
    }

    #[tokio::test]
    async fn overwrites_with_yes() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("site.toml");
        fs::write(&config_path, "[site]\nsource = \"pages\"\n").unwrap();

        run(&config_path, true).await.unwrap();

        assert!(fs::read_to_string(&config_path)
            .unwrap()
            .contains("source = \"site\""));
        assert!(temp.path().join("site/index.html").exists());
    }

    #[tokio::test]
    async fn nested_config_scaffold_builds() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("web/site.toml");

        run(&config_path, false).await.unwrap();

        let site = load_site(&config_path, |_| {}).unwrap();
        assert_eq!(site.source_dir(), temp.path().join("web/site"));

        let result = StaticBuilder::new(site, SoftwareApplication::ez_term())
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(result.pages, 1);
        assert!(temp.path().join("web/build/index.html").exists());
    }

    #[test]
    fn command_line_output_stays_relative_to_cwd() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("web/site.toml");

        let site = load_site(&config_path, |file| {
            file.output.pages_dir = "dist".into();
        })
        .unwrap();

        assert_eq!(site.output().pages_dir, Path::new("dist"));
        assert_eq!(site.output().assets_dir, temp.path().join("web/build"));
    }
}
