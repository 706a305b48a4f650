//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use ezsite_core::{ServerConfig, SiteConfig, SoftwareApplication};
use ezsite_static::rewrite::inject_body_end;
use ezsite_static::{page_transform, BuildError, PageTransform};

use crate::guard::host_guard;
use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{
    reload_client_script, reload_script_tag, ReloadHub, ReloadMessage, RELOAD_SCRIPT_PATH,
    RELOAD_SOCKET_PATH,
};

/// Errors that can occur with the servers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("Server error on {0}: {1}")]
    ServeError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Directory not found: {0}")]
    MissingDirectory(String),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Shared server state.
struct ServerState {
    root: PathBuf,
    transform: PageTransform,
    hub: ReloadHub,
}

/// Development server.
///
/// Serves the source tree under the base path, transforming pages the same
/// way the builder does, and reloads connected browsers on changes.
pub struct DevServer {
    config: ServerConfig,
    root: PathBuf,
    transform: PageTransform,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(site: &SiteConfig, schema: &SoftwareApplication) -> Result<Self, ServerError> {
        Ok(Self {
            config: site.dev_server(),
            root: site.source_dir().to_path_buf(),
            transform: page_transform(site, schema)?,
            hub: ReloadHub::new(),
        })
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
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            root: self.root.clone(),
            transform: self.transform.clone(),
            hub: self.hub.clone(),
        });

        Router::new()
            .route(RELOAD_SOCKET_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .fallback(page_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                Arc::new(self.config.allowed_hosts.clone()),
                host_guard,
            ))
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        if !self.root.is_dir() {
            return Err(ServerError::MissingDirectory(self.root.display().to_string()));
        }

        let addr = parse_addr(&self.config)?;

        let (watcher, mut rx) = FileWatcher::new(&self.root)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let hub = self.hub.clone();
        let root = self.root.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&hub, &root, event);
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = self.config.browse_url(self.transform.base_path());
        tracing::info!("Dev server running at {}", url);

        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::ServeError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Parse the configured bind address.
pub(crate) fn parse_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
    let raw = config.bind_addr();
    raw.parse().map_err(|_| ServerError::InvalidAddress(raw))
}

/// Handle file watch events.
fn handle_watch_event(hub: &ReloadHub, root: &Path, event: WatchEvent) {
    let path = event.path();
    let relative = path.strip_prefix(root).unwrap_or(path).display().to_string();

    match &event {
        WatchEvent::PageModified(_) => tracing::info!("Page modified: {}", relative),
        WatchEvent::AssetModified(_) => tracing::info!("Asset modified: {}", relative),
        WatchEvent::Created(_) => tracing::debug!("Created: {}", relative),
        WatchEvent::Deleted(_) => tracing::debug!("Deleted: {}", relative),
    }

    hub.send(ReloadMessage::Reload { path: relative });
}

/// Serve a file from the source tree.
async fn page_handler(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let base_path = state.transform.base_path();

    let Some(local) = strip_base(&path, base_path) else {
        if path == "/" {
            return Redirect::temporary(&format!("{base_path}/")).into_response();
        }
        return (
            StatusCode::NOT_FOUND,
            format!("{path} is outside the base path {base_path}/\n"),
        )
            .into_response();
    };

    let Some(file) = resolve_path(local, &state.root) else {
        return (StatusCode::NOT_FOUND, format!("Not found: {path}\n")).into_response();
    };

    let is_page = file
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"));

    if is_page {
        return match tokio::fs::read_to_string(&file).await {
            Ok(source) => {
                let html = state.transform.apply(&source);
                Html(inject_body_end(&html, &reload_script_tag())).into_response()
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", file.display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        };
    }

    match ServeFile::new(&file).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

/// Handler for the reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    // Forward reload messages to the client
    while let Ok(msg) = rx.recv().await {
        if send_json(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

/// Handler for the reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    (
        [("content-type", "application/javascript")],
        reload_client_script(),
    )
}

/// Strip the base path from a request path.
///
/// Returns `None` when the path lies outside the base path.
pub(crate) fn strip_base<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(base_path) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// Resolve a URL path to a file under `root`.
///
/// Directories resolve to their `index.html`, extensionless paths to
/// `<path>.html`. Paths escaping `root` or not valid UTF-8 once decoded
/// resolve to nothing.
pub fn resolve_path(url: &str, root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url)?;

    if clean.split('/').any(|part| part == "..") {
        return None;
    }

    let root = root.canonicalize().ok()?;
    let candidates = [root.join(&clean), root.join(format!("{clean}.html"))];

    for candidate in candidates {
        let Ok(canonical) = candidate.canonicalize() else {
            continue;
        };
        if !canonical.starts_with(&root) {
            return None;
        }
        if canonical.is_file() {
            return Some(canonical);
        }
        if canonical.is_dir() {
            let index = canonical.join("index.html");
            if index.is_file() {
                return Some(index);
            }
        }
    }

    None
}

/// Decode and trim a URL path.
fn normalize_url(url: &str) -> Option<String> {
    use percent_encoding::percent_decode_str;

    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    Some(decoded.trim_matches('/').to_string())
}
