//! Site configuration.
//!
//! `site.toml` is optional; every section falls back to the defaults the site
//! has always been built with. The base path is deliberately absent from the
//! file: it only ever comes from the [`DeploymentTarget`].
//!
//! ```toml
//! [site]
//! source = "site"
//! origin = "https://ezcorp-org.github.io"
//!
//! [output]
//! pages = "build"
//! assets = "build"
//! precompress = false
//! strict = true
//!
//! [prerender]
//! handle_missing_id = "warn"
//! handle_http_error = "warn"
//!
//! [server]
//! host = "0.0.0.0"
//! allowed_hosts = ["nixos.taile1c5b0.ts.net", ".ts.net"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::deploy::DeploymentTarget;
use crate::hosts::HostAllowlist;

/// Default config file name.
pub const CONFIG_FILE: &str = "site.toml";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration file structure (site.toml).
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub site: SourceSettings,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub prerender: PrerenderPolicy,
    #[serde(default)]
    pub server: ServerSettings,
}

impl ConfigFile {
    /// Parse configuration from TOML text.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load configuration from `path` if it exists.
    /// Returns an error if the file exists but is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::parse(&content, path)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Anchor relative `source`, `pages` and `assets` directories at the
    /// directory holding `config_path`.
    pub fn resolve_paths(&mut self, config_path: &Path) {
        let Some(base) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        for dir in [
            &mut self.site.source,
            &mut self.output.pages_dir,
            &mut self.output.assets_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

/// `[site]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceSettings {
    /// Directory holding prerendered pages and static files
    pub source: PathBuf,

    /// Scheme and host the site is published on
    pub origin: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            source: PathBuf::from("site"),
            origin: "https://ezcorp-org.github.io".to_string(),
        }
    }
}

/// Static export layout, `[output]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory generated pages are written to
    #[serde(rename = "pages")]
    pub pages_dir: PathBuf,

    /// Directory static assets are written to
    #[serde(rename = "assets")]
    pub assets_dir: PathBuf,

    /// File name of the SPA fallback page, if any
    pub fallback: Option<String>,

    /// Write zstd-compressed siblings of text files
    pub precompress: bool,

    /// Fail the build on route conflicts instead of warning
    pub strict: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pages_dir: PathBuf::from("build"),
            assets_dir: PathBuf::from("build"),
            fallback: None,
            precompress: false,
            strict: true,
        }
    }
}

/// How a prerender finding is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handling {
    /// Abort the build
    Fail,

    /// Log and continue
    #[default]
    Warn,

    /// Drop silently
    Ignore,
}

/// `[prerender]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrerenderPolicy {
    /// Link points at `#id` that does not exist on the target page
    pub handle_missing_id: Handling,

    /// Link points at a route the build did not produce
    pub handle_http_error: Handling,
}

/// `[server]` section, shared by the dev and preview servers.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    pub dev_port: u16,

    pub preview_port: u16,

    /// Hosts accepted in the `Host` header
    pub allowed_hosts: HostAllowlist,

    /// Open a browser once the server is up
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            dev_port: 5173,
            preview_port: 4173,
            allowed_hosts: HostAllowlist::site_default(),
            open: true,
        }
    }
}

/// Runtime settings for one server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_hosts: HostAllowlist,
    pub open: bool,
}

impl ServerConfig {
    /// Address string suitable for `SocketAddr` parsing.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host a browser should be pointed at.
    pub fn browse_url(&self, base_path: &str) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" => "localhost",
            other => other,
        };
        format!("http://{}:{}{}/", host, self.port, base_path)
    }
}

/// Resolved site configuration.
///
/// Built once per invocation. The base path is fixed by the deployment target
/// at construction and cannot be changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    target: DeploymentTarget,
    source_dir: PathBuf,
    origin: String,
    output: OutputConfig,
    prerender: PrerenderPolicy,
    server: ServerSettings,
}

impl SiteConfig {
    /// Combine file settings with the deployment target.
    pub fn new(file: ConfigFile, target: DeploymentTarget) -> Result<Self, ConfigError> {
        if let Some(fallback) = &file.output.fallback {
            if fallback.is_empty() || fallback.contains("..") || fallback.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "output.fallback must be a relative file name, got {fallback:?}"
                )));
            }
        }

        if file.site.origin.ends_with('/') {
            return Err(ConfigError::Invalid(
                "site.origin must not end with '/'".to_string(),
            ));
        }

        Ok(Self {
            target,
            source_dir: file.site.source,
            origin: file.site.origin,
            output: file.output,
            prerender: file.prerender,
            server: file.server,
        })
    }

    /// Load `path` and resolve the target from the environment.
    ///
    /// Relative directories are taken relative to the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = ConfigFile::load(path)?;
        file.resolve_paths(path);
        Self::new(file, DeploymentTarget::from_env())
    }

    pub fn target(&self) -> DeploymentTarget {
        self.target
    }

    /// URL prefix for every emitted route and asset.
    pub fn base_path(&self) -> &'static str {
        self.target.base_path()
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    pub fn prerender(&self) -> PrerenderPolicy {
        self.prerender
    }

    pub fn allowed_hosts(&self) -> &HostAllowlist {
        &self.server.allowed_hosts
    }

    /// Public URL of the site root, always ending in `/`.
    pub fn site_url(&self) -> String {
        format!("{}{}/", self.origin, self.base_path())
    }

    /// Settings for the development server.
    pub fn dev_server(&self) -> ServerConfig {
        self.server_config(self.server.dev_port)
    }

    /// Settings for the preview server.
    pub fn preview_server(&self) -> ServerConfig {
        self.server_config(self.server.preview_port)
    }

    fn server_config(&self, port: u16) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port,
            allowed_hosts: self.server.allowed_hosts.clone(),
            open: self.server.open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn parse(content: &str) -> ConfigFile {
        ConfigFile::parse(content, Path::new("site.toml")).unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = parse("");

        assert_eq!(file, ConfigFile::default());
        assert_eq!(file.output.pages_dir, PathBuf::from("build"));
        assert_eq!(file.output.assets_dir, PathBuf::from("build"));
        assert_eq!(file.output.fallback, None);
        assert!(!file.output.precompress);
        assert!(file.output.strict);
        assert_eq!(file.prerender.handle_missing_id, Handling::Warn);
        assert_eq!(file.prerender.handle_http_error, Handling::Warn);
        assert_eq!(file.server.host, "0.0.0.0");
    }

    #[test]
    fn parses_all_sections() {
        let file = parse(
            r#"
[site]
source = "public"

[output]
pages = "out/pages"
assets = "out/assets"
fallback = "200.html"
precompress = true
strict = false

[prerender]
handle_missing_id = "ignore"
handle_http_error = "fail"

[server]
dev_port = 3000
allowed_hosts = ["docs.example.com"]
"#,
        );

        assert_eq!(file.site.source, PathBuf::from("public"));
        assert_eq!(file.output.pages_dir, PathBuf::from("out/pages"));
        assert_eq!(file.output.fallback.as_deref(), Some("200.html"));
        assert!(file.output.precompress);
        assert!(!file.output.strict);
        assert_eq!(file.prerender.handle_missing_id, Handling::Ignore);
        assert_eq!(file.prerender.handle_http_error, Handling::Fail);
        assert_eq!(file.server.dev_port, 3000);
        assert_eq!(file.server.preview_port, 4173);
        assert!(file.server.allowed_hosts.allows("docs.example.com"));
    }

    #[test]
    fn resolves_directories_next_to_config() {
        let mut file = parse("[output]\npages = \"out\"\nassets = \"/srv/assets\"\n");

        file.resolve_paths(Path::new("web/site.toml"));

        assert_eq!(file.site.source, PathBuf::from("web/site"));
        assert_eq!(file.output.pages_dir, PathBuf::from("web/out"));
        assert_eq!(file.output.assets_dir, PathBuf::from("/srv/assets"));
    }

    #[test]
    fn bare_config_name_keeps_paths() {
        let mut file = ConfigFile::default();

        file.resolve_paths(Path::new("site.toml"));

        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn rejects_unknown_sections() {
        let err = ConfigFile::parse("[paths]\nbase = \"/x\"", Path::new("site.toml"))
            .unwrap_err();

        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let file = ConfigFile::load(&temp.path().join("site.toml")).unwrap();

        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("site.toml");
        fs::write(&path, "[output\npages = ").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("site.toml"));
    }

    #[test]
    fn base_path_follows_target() {
        let pages = SiteConfig::new(ConfigFile::default(), DeploymentTarget::GithubPages).unwrap();
        let root = SiteConfig::new(ConfigFile::default(), DeploymentTarget::Default).unwrap();

        assert_eq!(pages.base_path(), "/ez-term");
        assert_eq!(pages.site_url(), "https://ezcorp-org.github.io/ez-term/");
        assert_eq!(root.base_path(), "");
        assert_eq!(root.site_url(), "https://ezcorp-org.github.io/");
    }

    #[test]
    fn dev_and_preview_share_allowlist() {
        let config = SiteConfig::new(ConfigFile::default(), DeploymentTarget::Default).unwrap();
        let dev = config.dev_server();
        let preview = config.preview_server();

        assert!(dev.allowed_hosts.contains_entry("nixos.taile1c5b0.ts.net"));
        assert!(dev.allowed_hosts.contains_entry(".ts.net"));
        assert_eq!(dev.allowed_hosts, preview.allowed_hosts);
        assert_eq!(dev.host, preview.host);
        assert_eq!(ServerConfig { port: dev.port, ..preview }, dev);
    }

    #[test]
    fn rejects_fallback_outside_output() {
        let mut file = ConfigFile::default();
        file.output.fallback = Some("../index.html".to_string());

        let err = SiteConfig::new(file, DeploymentTarget::Default).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn formats_bind_and_browse_addresses() {
        let config = SiteConfig::new(ConfigFile::default(), DeploymentTarget::GithubPages).unwrap();
        let dev = config.dev_server();

        assert_eq!(dev.bind_addr(), "0.0.0.0:5173");
        assert_eq!(dev.browse_url(config.base_path()), "http://localhost:5173/ez-term/");

        let v6 = ServerConfig {
            host: "::1".to_string(),
            ..dev
        };
        assert_eq!(v6.bind_addr(), "[::1]:5173");
    }
}
