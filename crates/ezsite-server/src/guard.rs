//! Host header validation shared by the dev and preview servers.
//!
//! Requests whose `Host` is not on the allowlist get `403 Forbidden`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use ezsite_core::HostAllowlist;

/// Middleware rejecting requests for hosts outside the allowlist.
///
/// Install with `axum::middleware::from_fn_with_state(Arc::new(list), host_guard)`.
pub async fn host_guard(
    State(allowed): State<Arc<HostAllowlist>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request_host(&request);

    match host {
        Some(host) if allowed.allows(&host) => next.run(request).await,
        Some(host) => {
            tracing::warn!("Blocked request for host {}", host);
            (
                StatusCode::FORBIDDEN,
                format!(
                    "Blocked request. This host ({host}) is not allowed.\n\
                     To allow it, add it to server.allowed_hosts in site.toml.\n"
                ),
            )
                .into_response()
        }
        None => (StatusCode::FORBIDDEN, "Missing Host header.\n").into_response(),
    }
}

/// Host the client asked for, from the `Host` header or the request URI.
fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}
