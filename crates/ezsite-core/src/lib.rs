//! Deployment settings and structured data for the ez-term website.
//!
//! This crate holds the pieces every other ezsite crate agrees on: the
//! deployment target and its base path, the host allowlist shared by the dev
//! and preview servers, the `site.toml` configuration, and the schema.org
//! document embedded in each page.

pub mod config;
pub mod deploy;
pub mod hosts;
pub mod schema;

pub use config::{
    ConfigError, ConfigFile, Handling, OutputConfig, PrerenderPolicy, ServerConfig, SiteConfig,
    CONFIG_FILE,
};
pub use deploy::{resolve_base_path, DeploymentTarget, GITHUB_PAGES_ENV};
pub use hosts::{HostAllowlist, HostPattern};
pub use schema::{Offer, Organization, SoftwareApplication};
