//! HTML rewriting applied to every emitted page.
//!
//! Two things happen to a page on its way out: root-relative URLs gain the
//! deployment base path, and the structured-data script is placed in `<head>`.
//! The same transform runs in the builder and in the dev server so both serve
//! identical markup.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static URL_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src|action|formaction|poster)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid URL attribute regex")
});

static SRCSET_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(srcset)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid srcset regex")
});

static ID_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(?:id|name)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid id regex")
});

static JSON_LD_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<script\b[^>]*\btype\s*=\s*["']?application/ld\+json["']?[^>]*>.*?</script\s*>"#,
    )
    .expect("Invalid JSON-LD script regex")
});

static HREF_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid href regex")
});

/// Rewrites pages for one deployment.
#[derive(Debug, Clone)]
pub struct PageTransform {
    base_path: String,
    head_html: String,
}

impl PageTransform {
    /// Create a transform for `base_path` that injects `head_html` into `<head>`.
    pub fn new(base_path: impl Into<String>, head_html: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            head_html: head_html.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Apply the base path rewrite and head injection.
    pub fn apply(&self, html: &str) -> String {
        let rewritten = if self.base_path.is_empty() {
            html.to_string()
        } else {
            self.rewrite_urls(html)
        };
        replace_json_ld(&rewritten, &self.head_html)
    }

    /// Prefix a single URL with the base path if it is root-relative.
    pub fn prefix_url(&self, url: &str) -> String {
        prefix_url(&self.base_path, url)
    }

    fn rewrite_urls(&self, html: &str) -> String {
        let html = URL_ATTR.replace_all(html, |caps: &Captures| {
            rebuild_attr(caps, |value| self.prefix_url(value))
        });

        SRCSET_ATTR
            .replace_all(&html, |caps: &Captures| {
                rebuild_attr(caps, |value| self.prefix_srcset(value))
            })
            .into_owned()
    }

    fn prefix_srcset(&self, srcset: &str) -> String {
        srcset
            .split(',')
            .map(|candidate| {
                let candidate = candidate.trim();
                match candidate.split_once(char::is_whitespace) {
                    Some((url, descriptor)) => {
                        format!("{} {}", self.prefix_url(url), descriptor.trim())
                    }
                    None => self.prefix_url(candidate),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Prefix `url` with `base_path` when it is root-relative and not yet prefixed.
pub fn prefix_url(base_path: &str, url: &str) -> String {
    if base_path.is_empty() || !url.starts_with('/') || url.starts_with("//") {
        return url.to_string();
    }

    if let Some(rest) = url.strip_prefix(base_path) {
        if rest.is_empty() || rest.starts_with(['/', '?', '#']) {
            return url.to_string();
        }
    }

    format!("{base_path}{url}")
}

/// Rebuild a matched `name="value"` attribute with a transformed value.
fn rebuild_attr(caps: &Captures, transform: impl Fn(&str) -> String) -> String {
    let name = &caps[1];
    let eq = &caps[2];
    match (caps.get(3), caps.get(4)) {
        (Some(value), _) => format!(r#"{name}{eq}"{}""#, transform(value.as_str())),
        (None, Some(value)) => format!("{name}{eq}'{}'", transform(value.as_str())),
        (None, None) => caps[0].to_string(),
    }
}

/// Insert `snippet` before `</head>`, once.
///
/// Pages without a head get the snippet before `<body>`, or at the very top.
pub fn inject_head(html: &str, snippet: &str) -> String {
    if snippet.is_empty() || html.contains(snippet) {
        return html.to_string();
    }

    let lower = html.to_ascii_lowercase();
    let Some(at) = lower.find("</head>").or_else(|| lower.find("<body")) else {
        return format!("{snippet}{html}");
    };

    let mut out = String::with_capacity(html.len() + snippet.len() + 1);
    out.push_str(&html[..at]);
    out.push_str(snippet);
    out.push('\n');
    out.push_str(&html[at..]);
    out
}

/// Put `script` in place of the page's first JSON-LD script, or inject it
/// into `<head>` when the page has none.
pub fn replace_json_ld(html: &str, script: &str) -> String {
    if script.is_empty() {
        return html.to_string();
    }
    match JSON_LD_SCRIPT.find(html) {
        Some(existing) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..existing.start()]);
            out.push_str(script);
            out.push_str(&html[existing.end()..]);
            out
        }
        None => inject_head(html, script),
    }
}

/// Insert `snippet` before `</body>`, or append it.
pub fn inject_body_end(html: &str, snippet: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(at) => format!("{}{}\n{}", &html[..at], snippet, &html[at..]),
        None => format!("{html}{snippet}"),
    }
}

/// Targets of every `<a href>` in the page.
pub fn extract_links(html: &str) -> Vec<String> {
    HREF_ATTR
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fragment targets (`id` and `name` attributes) defined by the page.
pub fn extract_ids(html: &str) -> HashSet<String> {
    ID_ATTR
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCRIPT: &str = r#"<script type="application/ld+json">{}</script>"#;

    #[test]
    fn prefixes_root_relative_urls() {
        assert_eq!(prefix_url("/ez-term", "/"), "/ez-term/");
        assert_eq!(prefix_url("/ez-term", "/docs/"), "/ez-term/docs/");
        assert_eq!(prefix_url("/ez-term", "/app.css?v=2"), "/ez-term/app.css?v=2");
    }

    #[test]
    fn leaves_other_urls_alone() {
        for url in [
            "https://github.com/ezcorp-org/ez-term",
            "//cdn.example.com/x.js",
            "#install",
            "docs/intro",
            "mailto:hi@example.com",
            "/ez-term",
            "/ez-term/",
            "/ez-term#top",
        ] {
            assert_eq!(prefix_url("/ez-term", url), url);
        }
        assert_eq!(prefix_url("/ez-term", "/ez-terminal"), "/ez-term/ez-terminal");
    }

    #[test]
    fn empty_base_path_is_identity() {
        let transform = PageTransform::new("", "");
        let html = r#"<a href="/docs/">Docs</a>"#;

        assert_eq!(transform.apply(html), html);
    }

    #[test]
    fn rewrites_attributes_in_both_quote_styles() {
        let transform = PageTransform::new("/ez-term", "");
        let html = r#"<link href="/app.css"><img src='/logo.png' alt="/not-a-url"><form action="/search"></form>"#;

        assert_eq!(
            transform.apply(html),
            r#"<link href="/ez-term/app.css"><img src='/ez-term/logo.png' alt="/not-a-url"><form action="/ez-term/search"></form>"#
        );
    }

    #[test]
    fn rewrites_srcset_candidates() {
        let transform = PageTransform::new("/ez-term", "");
        let html = r#"<img srcset="/a.png 1x, /b.png 2x,https://x.test/c.png 3x">"#;

        assert_eq!(
            transform.apply(html),
            r#"<img srcset="/ez-term/a.png 1x, /ez-term/b.png 2x, https://x.test/c.png 3x">"#
        );
    }

    #[test]
    fn injects_head_snippet_once() {
        let html = "<html><head><title>ez</title></head><body></body></html>";

        let once = inject_head(html, SCRIPT);
        let twice = inject_head(&once, SCRIPT);

        assert_eq!(once, twice);
        assert_eq!(once.matches("application/ld+json").count(), 1);
        assert!(once.find(SCRIPT).unwrap() < once.find("</head>").unwrap());
    }

    #[test]
    fn replaces_existing_json_ld() {
        let transform = PageTransform::new("", SCRIPT);
        let html = "<html><head>\n<SCRIPT type='application/ld+json'>\n{\n  \"name\": \"old\"\n}\n</SCRIPT>\n</head><body></body></html>";

        let out = transform.apply(html);

        assert_eq!(out.to_ascii_lowercase().matches("application/ld+json").count(), 1);
        assert!(out.contains(SCRIPT));
        assert!(!out.contains("old"));
        assert_eq!(transform.apply(&out), out);
    }

    #[test]
    fn leaves_other_scripts_alone() {
        let html = r#"<head><script src="/app.js"></script></head>"#;

        assert_eq!(
            replace_json_ld(html, SCRIPT),
            format!("<head><script src=\"/app.js\"></script>{SCRIPT}\n</head>")
        );
    }

    #[test]
    fn injects_without_head() {
        assert_eq!(inject_head("<p>hi</p>", "<x>"), "<x><p>hi</p>");
        assert_eq!(
            inject_head("<BODY>hi</BODY>", "<x>"),
            "<x>\n<BODY>hi</BODY>"
        );
    }

    #[test]
    fn injects_body_end() {
        assert_eq!(
            inject_body_end("<body>hi</body>", "<s></s>"),
            "<body>hi<s></s>\n</body>"
        );
        assert_eq!(inject_body_end("hi", "<s></s>"), "hi<s></s>");
    }

    #[test]
    fn extracts_links_and_ids() {
        let html = r##"<h2 id="install">Install</h2><a class="x" href="/docs/#usage">Docs</a>
<a href='#install'>Top</a><link href="/app.css"><a name="legacy"></a>"##;

        assert_eq!(extract_links(html), vec!["/docs/#usage", "#install"]);

        let ids = extract_ids(html);
        assert!(ids.contains("install"));
        assert!(ids.contains("legacy"));
        assert_eq!(ids.len(), 2);
    }
}
