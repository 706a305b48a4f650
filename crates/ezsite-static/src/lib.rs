//! Static export for the ez-term website.
//!
//! Copies a tree of prerendered pages and static files into the configured
//! output layout, prefixing root-relative URLs with the deployment base path
//! and embedding the structured-data document in every page.

pub mod assets;
pub mod builder;
pub mod rewrite;
pub mod templates;

pub use builder::{
    page_transform, route_for, BuildError, BuildResult, Finding, FindingKind, StaticBuilder,
};
pub use rewrite::PageTransform;
