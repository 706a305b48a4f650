//! Host allowlist for the development and preview servers.
//!
//! Entries are either exact hostnames (`nixos.taile1c5b0.ts.net`) or suffix
//! patterns starting with a dot (`.ts.net`), which match the bare domain and
//! every subdomain below it. IP literals, `localhost` and `*.localhost` are
//! always accepted since DNS rebinding cannot reach them.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Tailnet hostname of the machine the site is usually developed on.
pub const TAILNET_HOST: &str = "nixos.taile1c5b0.ts.net";

/// Any host inside a Tailscale network.
pub const TAILNET_SUFFIX: &str = ".ts.net";

/// A single allowlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostPattern {
    /// Matches one hostname
    Exact(String),

    /// Matches a domain and all of its subdomains (stored without the dot)
    Suffix(String),
}

impl HostPattern {
    /// Parse an entry in the `.suffix` / `exact` notation.
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim().trim_end_matches('.').to_ascii_lowercase();
        match entry.strip_prefix('.') {
            Some(domain) => Self::Suffix(domain.to_string()),
            None => Self::Exact(entry),
        }
    }

    /// Check a normalized hostname against this pattern.
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Exact(name) => host == name,
            Self::Suffix(domain) => {
                host == domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            }
        }
    }
}

impl std::fmt::Display for HostPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(name) => f.write_str(name),
            Self::Suffix(domain) => write!(f, ".{domain}"),
        }
    }
}

/// Set of hosts a server will answer for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct HostAllowlist {
    patterns: Vec<HostPattern>,
}

impl HostAllowlist {
    /// Build an allowlist from entries, dropping blanks and duplicates.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns: Vec<HostPattern> = Vec::new();
        for entry in entries {
            if entry.as_ref().trim().is_empty() {
                continue;
            }
            let pattern = HostPattern::parse(entry.as_ref());
            if !patterns.contains(&pattern) {
                patterns.push(pattern);
            }
        }
        Self { patterns }
    }

    /// The allowlist the site ships with.
    pub fn site_default() -> Self {
        Self::new([TAILNET_HOST, TAILNET_SUFFIX])
    }

    /// Whether the raw value of a `Host` header is accepted.
    pub fn allows(&self, host_header: &str) -> bool {
        let host = normalize_host(host_header);
        if host.is_empty() {
            return false;
        }
        is_always_allowed(&host) || self.patterns.iter().any(|p| p.matches(&host))
    }

    /// Configured entries in their textual form.
    pub fn entries(&self) -> Vec<String> {
        self.patterns.iter().map(ToString::to_string).collect()
    }

    pub fn contains_entry(&self, entry: &str) -> bool {
        self.patterns.contains(&HostPattern::parse(entry))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for HostAllowlist {
    fn default() -> Self {
        Self::site_default()
    }
}

impl From<Vec<String>> for HostAllowlist {
    fn from(entries: Vec<String>) -> Self {
        Self::new(entries)
    }
}

impl From<HostAllowlist> for Vec<String> {
    fn from(list: HostAllowlist) -> Self {
        list.entries()
    }
}

/// Lowercase a `Host` header value and strip the port and trailing dot.
/// Hosts a rebinding attack cannot name: IP literals and the `localhost` zone.
fn is_always_allowed(host: &str) -> bool {
    host == "localhost" || host.ends_with(".localhost") || host.parse::<IpAddr>().is_ok()
}

fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();

    let host = if let Some(rest) = raw.strip_prefix('[') {
        // [::1]:5173
        rest.split(']').next().unwrap_or_default()
    } else if raw.matches(':').count() == 1 {
        raw.split(':').next().unwrap_or_default()
    } else {
        raw
    };

    host.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contains_tailnet_entries() {
        let list = HostAllowlist::site_default();

        assert!(list.contains_entry("nixos.taile1c5b0.ts.net"));
        assert!(list.contains_entry(".ts.net"));
        assert_eq!(list.entries(), vec!["nixos.taile1c5b0.ts.net", ".ts.net"]);
    }

    #[test]
    fn suffix_matches_subdomains_and_bare_domain() {
        let list = HostAllowlist::new([".ts.net"]);

        assert!(list.allows("ts.net"));
        assert!(list.allows("laptop.tail1234.ts.net"));
        assert!(!list.allows("evil-ts.net"));
        assert!(!list.allows("ts.net.example.com"));
    }

    #[test]
    fn exact_entries_do_not_match_subdomains() {
        let list = HostAllowlist::new(["example.com"]);

        assert!(list.allows("example.com"));
        assert!(!list.allows("www.example.com"));
    }

    #[test]
    fn ignores_port_case_and_trailing_dot() {
        let list = HostAllowlist::site_default();

        assert!(list.allows("NixOS.taile1c5b0.ts.net:5173"));
        assert!(list.allows("nixos.taile1c5b0.ts.net."));
    }

    #[test]
    fn always_allows_local_names_and_ip_literals() {
        let list = HostAllowlist::new(Vec::<String>::new());

        assert!(list.allows("localhost:5173"));
        assert!(list.allows("app.localhost"));
        assert!(list.allows("127.0.0.1"));
        assert!(list.allows("192.168.1.20:5173"));
        assert!(list.allows("[::1]:4173"));
        assert!(list.allows("[fe80::1]"));
        assert!(!list.allows("localhost.example.com"));
        assert!(!list.allows("192.168.1.20.nip.io"));
        assert!(!list.allows(""));
    }

    #[test]
    fn drops_duplicates_and_blanks() {
        let list = HostAllowlist::new([".ts.net", "", ".TS.NET", "a.test"]);

        assert_eq!(list.len(), 2);
    }

    #[test]
    fn deserializes_from_string_list() {
        let list: HostAllowlist =
            serde_json::from_str(r#"["example.com", ".internal"]"#).unwrap();

        assert!(list.allows("docs.internal"));
        assert_eq!(
            serde_json::to_string(&list).unwrap(),
            r#"["example.com",".internal"]"#
        );
    }
}
