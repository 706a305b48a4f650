//! Development and preview servers for the ez-term website.
//!
//! The dev server serves the source tree with live reload; the preview server
//! serves the static export. Both answer only for allowlisted hosts.

pub mod guard;
pub mod preview;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use guard::host_guard;
pub use preview::PreviewServer;
pub use server::{DevServer, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
pub use websocket::{ReloadHub, ReloadMessage};
