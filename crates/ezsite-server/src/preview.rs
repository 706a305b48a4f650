//! Preview server for the built site.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware,
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use tower::Service;
use tower_http::services::{ServeDir, ServeFile};

use ezsite_core::{ServerConfig, SiteConfig};

use crate::guard::host_guard;
use crate::server::{parse_addr, ServerError};

/// Serves the static export exactly as a static host would, under the base path.
pub struct PreviewServer {
    config: ServerConfig,
    dir: PathBuf,
    assets_dir: PathBuf,
    base_path: &'static str,
    fallback: Option<String>,
    precompressed: bool,
}

impl PreviewServer {
    /// Create a preview server for the configured pages directory.
    pub fn new(site: &SiteConfig) -> Self {
        let output = site.output();
        Self {
            config: site.preview_server(),
            dir: output.pages_dir.clone(),
            assets_dir: output.assets_dir.clone(),
            base_path: site.base_path(),
            fallback: output.fallback.clone(),
            precompressed: output.precompress,
        }
    }

    /// Serve pages and assets from a single other directory.
    pub fn with_dir(mut self, dir: PathBuf) -> Self {
        self.assets_dir = dir.clone();
        self.dir = dir;
        self
    }

    /// Override the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Override whether a browser is opened on start.
    pub fn with_open(mut self, open: bool) -> Self {
        self.config.open = open;
        self
    }

    /// Build the router without binding a socket.
    ///
    /// Requests the pages directory cannot answer fall through to the assets
    /// directory, then to the fallback page.
    pub fn router(&self) -> Router {
        let pages = self.serve_dir(&self.dir);
        let not_found = self
            .fallback
            .as_ref()
            .map(|fallback| ServeFile::new(self.dir.join(fallback)));

        let router = if self.assets_dir == self.dir {
            match not_found {
                Some(not_found) => mount(pages.not_found_service(not_found), self.base_path),
                None => mount(pages, self.base_path),
            }
        } else {
            let assets = self.serve_dir(&self.assets_dir);
            match not_found {
                Some(not_found) => mount(
                    pages.fallback(assets.not_found_service(not_found)),
                    self.base_path,
                ),
                None => mount(pages.fallback(assets), self.base_path),
            }
        };

        router.layer(middleware::from_fn_with_state(
            Arc::new(self.config.allowed_hosts.clone()),
            host_guard,
        ))
    }

    fn serve_dir(&self, dir: &Path) -> ServeDir {
        let files = ServeDir::new(dir);
        if self.precompressed {
            files.precompressed_zstd()
        } else {
            files
        }
    }

    /// Start the preview server.
    pub async fn start(self) -> Result<(), ServerError> {
        if !self.dir.is_dir() {
            return Err(ServerError::MissingDirectory(self.dir.display().to_string()));
        }

        let addr = parse_addr(&self.config)?;
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = self.config.browse_url(self.base_path);
        tracing::info!("Serving {} at {}", self.dir.display(), url);

        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::ServeError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Mount a file service at the base path, redirecting `/` to it.
fn mount<S>(service: S, base_path: &str) -> Router
where
    S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    if base_path.is_empty() {
        return Router::new().fallback_service(service);
    }

    let target = format!("{base_path}/");
    Router::new()
        .route(
            "/",
            get(move || {
                let target = target.clone();
                async move { Redirect::temporary(&target) }
            }),
        )
        .nest_service(base_path, service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use ezsite_core::{ConfigFile, DeploymentTarget};
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn preview(temp: &TempDir, target: DeploymentTarget, fallback: Option<&str>) -> PreviewServer {
        let build = temp.path().join("build");
        fs::create_dir_all(build.join("docs")).unwrap();
        fs::write(build.join("index.html"), "<p>home</p>").unwrap();
        fs::write(build.join("docs/index.html"), "<p>docs</p>").unwrap();
        fs::write(build.join("404.html"), "<p>fallback</p>").unwrap();

        let mut file = ConfigFile::default();
        file.output.assets_dir = build.clone();
        file.output.pages_dir = build;
        file.output.fallback = fallback.map(str::to_string);
        let site = SiteConfig::new(file, target).unwrap();
        PreviewServer::new(&site)
    }

    async fn get(router: Router, uri: &str, host: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .header("host", host)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn serves_build_under_base_path() {
        let temp = tempdir().unwrap();
        let router = preview(&temp, DeploymentTarget::GithubPages, None).router();

        let (status, body) = get(router.clone(), "/ez-term/docs/", "localhost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>docs</p>");

        let (status, _) = get(router, "/", "localhost").await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn serves_build_at_root() {
        let temp = tempdir().unwrap();
        let router = preview(&temp, DeploymentTarget::Default, None).router();

        let (status, body) = get(router, "/", "nixos.taile1c5b0.ts.net:4173").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>home</p>");
    }

    #[tokio::test]
    async fn missing_pages_use_fallback() {
        let temp = tempdir().unwrap();
        let router = preview(&temp, DeploymentTarget::Default, Some("404.html")).router();

        let (status, body) = get(router, "/no/such/page", "localhost").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "<p>fallback</p>");
    }

    #[tokio::test]
    async fn serves_assets_from_separate_directory() {
        let temp = tempdir().unwrap();
        let pages = temp.path().join("pages");
        let assets = temp.path().join("assets");
        fs::create_dir_all(&pages).unwrap();
        fs::create_dir_all(assets.join("img")).unwrap();
        fs::write(pages.join("index.html"), "<p>home</p>").unwrap();
        fs::write(pages.join("404.html"), "<p>fallback</p>").unwrap();
        fs::write(assets.join("app.css"), "body {}").unwrap();
        fs::write(assets.join("img/logo.svg"), "<svg/>").unwrap();

        let mut file = ConfigFile::default();
        file.output.pages_dir = pages;
        file.output.assets_dir = assets;
        file.output.fallback = Some("404.html".to_string());
        let site = SiteConfig::new(file, DeploymentTarget::GithubPages).unwrap();
        let router = PreviewServer::new(&site).router();

        let (status, body) = get(router.clone(), "/ez-term/", "localhost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<p>home</p>");

        let (status, body) = get(router.clone(), "/ez-term/app.css", "localhost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "body {}");

        let (status, body) = get(router.clone(), "/ez-term/img/logo.svg", "localhost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg/>");

        let (status, body) = get(router, "/ez-term/missing.css", "localhost").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "<p>fallback</p>");
    }

    #[tokio::test]
    async fn rejects_unknown_hosts() {
        let temp = tempdir().unwrap();
        let router = preview(&temp, DeploymentTarget::Default, None).router();

        let (status, _) = get(router, "/", "preview.example.org").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
