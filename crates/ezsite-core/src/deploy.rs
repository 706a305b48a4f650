//! Deployment target detection and base path resolution.

/// Environment variable that selects the GitHub Pages deployment.
pub const GITHUB_PAGES_ENV: &str = "GITHUB_PAGES";

/// Base path used when the site is served as a GitHub project page.
pub const GITHUB_PAGES_BASE_PATH: &str = "/ez-term";

/// Where the built site is going to be hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTarget {
    /// Project page under `https://<org>.github.io/ez-term/`
    GithubPages,

    /// Served from a domain root
    Default,
}

impl DeploymentTarget {
    /// Pick the target from the raw flag value.
    ///
    /// Only the exact string `"true"` selects GitHub Pages.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => Self::GithubPages,
            _ => Self::Default,
        }
    }

    /// Read the flag from the process environment.
    pub fn from_env() -> Self {
        let flag = std::env::var(GITHUB_PAGES_ENV).ok();
        Self::from_flag(flag.as_deref())
    }

    /// URL prefix for every route and asset.
    pub fn base_path(self) -> &'static str {
        match self {
            Self::GithubPages => GITHUB_PAGES_BASE_PATH,
            Self::Default => "",
        }
    }
}

impl std::fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GithubPages => f.write_str("github-pages"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Resolve the base path for a raw environment flag value.
pub fn resolve_base_path(flag: Option<&str>) -> &'static str {
    DeploymentTarget::from_flag(flag).base_path()
}
