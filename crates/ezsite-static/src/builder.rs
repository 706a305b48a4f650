//! Static site builder.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use ezsite_core::{Handling, PrerenderPolicy, SiteConfig, SoftwareApplication};

use crate::assets::AssetPipeline;
use crate::rewrite::{extract_ids, extract_links, PageTransform};
use crate::templates::{FallbackContext, TemplateEngine};

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages: usize,

    /// Number of static files copied
    pub assets: usize,

    /// Number of `.zst` files written
    pub compressed: usize,

    /// Prerender findings that were logged but did not fail the build
    pub warnings: Vec<Finding>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Pages output directory
    pub pages_dir: PathBuf,
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to read source: {0}")]
    ReadError(String),

    #[error("Failed to write output: {0}")]
    WriteError(String),

    #[error("Failed to render template: {0}")]
    TemplateError(String),

    #[error("Failed to serialize structured data: {0}")]
    SchemaError(String),

    #[error("Route {route} is produced by both {first} and {second}")]
    RouteConflict {
        route: String,
        first: String,
        second: String,
    },

    #[error("Prerendering failed:\n{0}")]
    Prerender(String),

    #[error("Refusing to clean {0}: it contains the source directory")]
    UnsafeOutput(String),
}

/// What a prerender check found wrong with a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// The link target is not produced by the build
    MissingRoute,

    /// The target page has no element with the linked id
    MissingId,
}

/// A broken internal link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Route of the page containing the link
    pub page: String,
    /// Link as written in the source
    pub link: String,
    pub kind: FindingKind,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FindingKind::MissingRoute => {
                write!(f, "{}: link to {} does not resolve", self.page, self.link)
            }
            FindingKind::MissingId => {
                write!(f, "{}: link to {} points at a missing id", self.page, self.link)
            }
        }
    }
}

/// A page to be built.
#[derive(Debug)]
struct PageInfo {
    /// Source file path
    source_path: PathBuf,

    /// Relative path from the source dir, `/`-separated
    relative: String,

    /// Route the page answers for
    route: String,

    /// Source markup
    html: String,
}

/// A static file copied as-is.
#[derive(Debug)]
struct AssetInfo {
    source_path: PathBuf,
    relative: String,
}

/// Build the page transform for a site.
pub fn page_transform(
    config: &SiteConfig,
    schema: &SoftwareApplication,
) -> Result<PageTransform, BuildError> {
    let head = schema
        .script_tag()
        .map_err(|e| BuildError::SchemaError(e.to_string()))?;
    Ok(PageTransform::new(config.base_path(), head))
}

/// Route served for a source-relative page path.
///
/// `index.html` maps to its directory; `about.html` and `about/index.html`
/// both map to `/about`.
pub fn route_for(relative: &str) -> String {
    let mut parts: Vec<&str> = relative.split('/').filter(|p| !p.is_empty()).collect();
    if let Some(last) = parts.pop() {
        let stem = last.strip_suffix(".html").unwrap_or(last);
        if stem != "index" {
            parts.push(stem);
        }
    }
    format!("/{}", parts.join("/"))
}

/// Static site builder.
pub struct StaticBuilder {
    config: SiteConfig,
    transform: PageTransform,
    templates: TemplateEngine,
    schema: SoftwareApplication,
    head: String,
}

impl StaticBuilder {
    /// Create a new static builder.
    pub fn new(config: SiteConfig, schema: SoftwareApplication) -> Result<Self, BuildError> {
        let head = schema
            .script_tag()
            .map_err(|e| BuildError::SchemaError(e.to_string()))?;
        let transform = PageTransform::new(config.base_path(), head.clone());
        let templates =
            TemplateEngine::new().map_err(|e| BuildError::TemplateError(e.to_string()))?;

        Ok(Self {
            config,
            transform,
            templates,
            schema,
            head,
        })
    }

    /// Build the static site.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let output = self.config.output();

        tracing::info!(
            "Target: {} (base path {:?})",
            self.config.target(),
            self.config.base_path()
        );

        let (pages, assets) = self.discover()?;
        let pages = self.resolve_routes(pages)?;

        let findings = self.check_links(&pages, &assets);
        let unresolved_fail = output.strict && output.fallback.is_none();
        let warnings = apply_policy(findings, self.config.prerender(), unresolved_fail)?;

        self.prepare_output()?;

        pages
            .par_iter()
            .map(|page| self.write_page(page))
            .collect::<Result<Vec<()>, BuildError>>()?;

        assets
            .par_iter()
            .map(|asset| {
                let dest = output.assets_dir.join(&asset.relative);
                AssetPipeline::copy(&asset.source_path, &dest)
                    .map(|_| ())
                    .map_err(|e| BuildError::WriteError(format!("{}: {}", dest.display(), e)))
            })
            .collect::<Result<Vec<()>, BuildError>>()?;

        self.generate_fallback(&pages)?;
        self.generate_sitemap(&pages, &assets)?;

        let mut compressed = 0;
        if output.precompress {
            compressed += self.precompress(&output.pages_dir)?;
            if output.assets_dir != output.pages_dir {
                compressed += self.precompress(&output.assets_dir)?;
            }
        }

        let duration = start.elapsed();

        Ok(BuildResult {
            pages: pages.len(),
            assets: assets.len(),
            compressed,
            warnings,
            duration_ms: duration.as_millis() as u64,
            pages_dir: output.pages_dir.clone(),
        })
    }

    /// Walk the source directory, splitting pages from static files.
    fn discover(&self) -> Result<(Vec<PageInfo>, Vec<AssetInfo>), BuildError> {
        let source_dir = self.config.source_dir();

        if !source_dir.is_dir() {
            return Err(BuildError::ReadError(format!(
                "Source directory not found: {}",
                source_dir.display()
            )));
        }

        let mut pages = Vec::new();
        let mut assets = Vec::new();

        for entry in WalkDir::new(source_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(|e| BuildError::ReadError(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_url_path(path.strip_prefix(source_dir).unwrap_or(path));

            if relative.ends_with(".html") {
                let html = fs::read_to_string(path)
                    .map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))?;
                pages.push(PageInfo {
                    source_path: path.to_path_buf(),
                    route: route_for(&relative),
                    relative,
                    html,
                });
            } else {
                assets.push(AssetInfo {
                    source_path: path.to_path_buf(),
                    relative,
                });
            }
        }

        tracing::debug!("Found {} pages and {} assets", pages.len(), assets.len());

        Ok((pages, assets))
    }

    /// Reject sources that claim an already taken route.
    fn resolve_routes(&self, pages: Vec<PageInfo>) -> Result<Vec<PageInfo>, BuildError> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut resolved = Vec::with_capacity(pages.len());

        for page in pages {
            if let Some(first) = seen.get(&page.route) {
                return Err(BuildError::RouteConflict {
                    route: page.route.clone(),
                    first: first.clone(),
                    second: page.relative.clone(),
                });
            }

            seen.insert(page.route.clone(), page.relative.clone());
            resolved.push(page);
        }

        Ok(resolved)
    }

    /// Find internal links that point nowhere.
    fn check_links(&self, pages: &[PageInfo], assets: &[AssetInfo]) -> Vec<Finding> {
        let base_path = self.config.base_path();
        let has_fallback = self.config.output().fallback.is_some();

        let ids: HashMap<&str, HashSet<String>> = pages
            .iter()
            .map(|p| (p.route.as_str(), extract_ids(&p.html)))
            .collect();
        let page_files: HashMap<&str, &str> = pages
            .iter()
            .map(|p| (p.relative.as_str(), p.route.as_str()))
            .collect();
        let asset_files: HashSet<&str> = assets.iter().map(|a| a.relative.as_str()).collect();

        let mut findings = Vec::new();

        for page in pages {
            for link in extract_links(&page.html) {
                let (target, fragment) = match link.split_once('#') {
                    Some((target, fragment)) => (target, Some(fragment)),
                    None => (link.as_str(), None),
                };
                let target = target.split('?').next().unwrap_or_default();

                let route = if target.is_empty() {
                    Some(page.route.as_str())
                } else if target.starts_with('/') && !target.starts_with("//") {
                    let target = strip_base(target, base_path);
                    let trimmed = target.trim_matches('/');
                    let as_route = format!("/{trimmed}");

                    if let Some((route, _)) = ids.get_key_value(as_route.as_str()) {
                        Some(*route)
                    } else if let Some(route) = page_files.get(trimmed) {
                        Some(*route)
                    } else if asset_files.contains(trimmed) || is_generated(trimmed) {
                        continue;
                    } else {
                        if !has_fallback {
                            findings.push(Finding {
                                page: page.route.clone(),
                                link: link.clone(),
                                kind: FindingKind::MissingRoute,
                            });
                        }
                        continue;
                    }
                } else {
                    // External or relative; not checked.
                    continue;
                };

                if let (Some(route), Some(fragment)) = (route, fragment) {
                    if fragment.is_empty() || fragment == "top" {
                        continue;
                    }
                    let defined = ids.get(route).is_some_and(|set| set.contains(fragment));
                    if !defined {
                        findings.push(Finding {
                            page: page.route.clone(),
                            link: link.clone(),
                            kind: FindingKind::MissingId,
                        });
                    }
                }
            }
        }

        findings
    }

    /// Empty and recreate the output directories.
    fn prepare_output(&self) -> Result<(), BuildError> {
        let output = self.config.output();
        let mut dirs = vec![&output.pages_dir];
        if output.assets_dir != output.pages_dir {
            dirs.push(&output.assets_dir);
        }

        let source = self
            .config
            .source_dir()
            .canonicalize()
            .map_err(|e| BuildError::ReadError(e.to_string()))?;

        for dir in dirs {
            if dir.exists() {
                let canonical = dir
                    .canonicalize()
                    .map_err(|e| BuildError::WriteError(e.to_string()))?;
                if source.starts_with(&canonical) {
                    return Err(BuildError::UnsafeOutput(dir.display().to_string()));
                }
                fs::remove_dir_all(dir)
                    .map_err(|e| BuildError::WriteError(format!("{}: {}", dir.display(), e)))?;
            }
            fs::create_dir_all(dir)
                .map_err(|e| BuildError::WriteError(format!("{}: {}", dir.display(), e)))?;
        }

        Ok(())
    }

    /// Transform and write a single page.
    fn write_page(&self, page: &PageInfo) -> Result<(), BuildError> {
        let dest = self.config.output().pages_dir.join(&page.relative);
        let html = self.transform.apply(&page.html);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        fs::write(&dest, html)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", dest.display(), e)))?;

        tracing::debug!("{} -> {}", page.source_path.display(), dest.display());

        Ok(())
    }

    /// Write the SPA fallback page, if configured.
    fn generate_fallback(&self, pages: &[PageInfo]) -> Result<(), BuildError> {
        let Some(fallback) = &self.config.output().fallback else {
            return Ok(());
        };

        if let Some(page) = pages.iter().find(|p| &p.relative == fallback) {
            return Err(BuildError::RouteConflict {
                route: page.route.clone(),
                first: page.relative.clone(),
                second: format!("fallback {fallback}"),
            });
        }

        let html = self
            .templates
            .render_fallback(&FallbackContext {
                title: self.schema.name.clone(),
                base_path: self.config.base_path().to_string(),
                head: self.head.clone(),
            })
            .map_err(|e| BuildError::TemplateError(e.to_string()))?;

        let dest = self.config.output().pages_dir.join(fallback);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::WriteError(e.to_string()))?;
        }
        fs::write(&dest, html).map_err(|e| BuildError::WriteError(e.to_string()))?;

        tracing::info!("Wrote fallback page {}", dest.display());

        Ok(())
    }

    /// Generate sitemap.xml and robots.txt unless the source ships its own.
    fn generate_sitemap(&self, pages: &[PageInfo], assets: &[AssetInfo]) -> Result<(), BuildError> {
        let provided: HashSet<&str> = assets.iter().map(|a| a.relative.as_str()).collect();
        let site_url = self.config.site_url();
        let pages_dir = &self.config.output().pages_dir;

        if !provided.contains("sitemap.xml") {
            let mut urls: Vec<String> = pages
                .iter()
                .map(|page| {
                    let mut url = format!("{}{}", site_url.trim_end_matches('/'), page.route);
                    if page.relative.ends_with("index.html") && !url.ends_with('/') {
                        url.push('/');
                    }
                    url
                })
                .collect();
            urls.sort();

            let sitemap = self
                .templates
                .render_sitemap(&urls)
                .map_err(|e| BuildError::TemplateError(e.to_string()))?;
            fs::write(pages_dir.join("sitemap.xml"), sitemap)
                .map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        if !provided.contains("robots.txt") {
            let robots = format!("User-agent: *\nAllow: /\nSitemap: {site_url}sitemap.xml\n");
            fs::write(pages_dir.join("robots.txt"), robots)
                .map_err(|e| BuildError::WriteError(e.to_string()))?;
        }

        Ok(())
    }

    fn precompress(&self, dir: &Path) -> Result<usize, BuildError> {
        let written =
            AssetPipeline::precompress(dir).map_err(|e| BuildError::WriteError(e.to_string()))?;
        tracing::info!("Precompressed {} files in {}", written.len(), dir.display());
        Ok(written.len())
    }
}

/// Log or fail on findings according to the prerender policy.
///
/// With `unresolved_fail` set, every missing route fails the build whatever
/// `handle_http_error` says. Returns the findings that were only warned about.
fn apply_policy(
    findings: Vec<Finding>,
    policy: PrerenderPolicy,
    unresolved_fail: bool,
) -> Result<Vec<Finding>, BuildError> {
    let mut failures = Vec::new();
    let mut warnings = Vec::new();

    for finding in findings {
        let handling = match finding.kind {
            FindingKind::MissingRoute if unresolved_fail => Handling::Fail,
            FindingKind::MissingRoute => policy.handle_http_error,
            FindingKind::MissingId => policy.handle_missing_id,
        };
        match handling {
            Handling::Fail => failures.push(finding),
            Handling::Warn => {
                tracing::warn!("{}", finding);
                warnings.push(finding);
            }
            Handling::Ignore => {}
        }
    }

    if failures.is_empty() {
        Ok(warnings)
    } else {
        let report = failures
            .iter()
            .map(|f| format!("  {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        Err(BuildError::Prerender(report))
    }
}

fn strip_base<'a>(path: &'a str, base_path: &str) -> &'a str {
    if base_path.is_empty() {
        return path;
    }
    match path.strip_prefix(base_path) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Files the builder writes itself.
fn is_generated(relative: &str) -> bool {
    matches!(relative, "sitemap.xml" | "robots.txt")
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}

/// Join path components with `/` regardless of platform.
fn relative_url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
