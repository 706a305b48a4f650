//! Templates for the files the builder generates itself.

use minijinja::{context, AutoEscape, Environment};
use serde::Serialize;

/// Context for rendering the fallback page.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackContext {
    /// Document title
    pub title: String,
    /// Deployment base path (empty at the domain root)
    pub base_path: String,
    /// Markup placed at the end of `<head>`
    pub head: String,
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with the built-in templates.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();

        // Values are escaped explicitly; the default HTML escaper also encodes `/`.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("xml", xml_escape);

        env.add_template("fallback.html", FALLBACK_TEMPLATE)?;
        env.add_template("sitemap.xml", SITEMAP_TEMPLATE)?;

        Ok(Self { env })
    }

    /// Render the SPA fallback page.
    pub fn render_fallback(&self, context: &FallbackContext) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("fallback.html")?;

        tmpl.render(context)
    }

    /// Render a sitemap listing absolute page URLs.
    pub fn render_sitemap(&self, urls: &[String]) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("sitemap.xml")?;

        tmpl.render(context! { urls => urls })
    }
}

/// Escape text for use in HTML or XML content and attribute values.
pub fn xml_escape(value: String) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const FALLBACK_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta name="robots" content="noindex">
  <title>{{ title | xml }}</title>
  {{ head }}
</head>
<body>
  <main>
    <h1>Page not found</h1>
    <p><a href="{{ base_path | xml }}/">Back to {{ title | xml }}</a></p>
  </main>
</body>
</html>
"##;

const SITEMAP_TEMPLATE: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{% for url in urls %}  <url>
    <loc>{{ url | xml }}</loc>
  </url>
{% endfor %}</urlset>
"##;
