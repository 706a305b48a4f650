//! schema.org structured data describing ez-term.
//!
//! The document is authored data: [`SoftwareApplication::ez_term`] returns the
//! same value on every call and nothing in it is derived from the build.

use serde::{Deserialize, Serialize};

const SCHEMA_CONTEXT: &str = "https://schema.org";
const SITE_URL: &str = "https://ezcorp-org.github.io/ez-term/";

/// A `SoftwareApplication` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareApplication {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub name: String,
    pub application_category: String,
    pub operating_system: String,
    pub description: String,
    pub url: String,
    pub download_url: String,
    pub software_version: String,
    pub offers: Offer,
    pub creator: Organization,
    pub screenshot: String,
    pub feature_list: Vec<String>,
    pub keywords: String,
    pub license: String,
    pub code_repository: String,
    pub programming_language: String,
}

/// Pricing offer attached to the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(rename = "@type")]
    pub kind: String,
    pub price: String,
    pub price_currency: String,
}

impl Offer {
    /// Free software: zero price in US dollars.
    pub fn free() -> Self {
        Self {
            kind: "Offer".to_string(),
            price: "0".to_string(),
            price_currency: "USD".to_string(),
        }
    }
}

/// Organization credited as the creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(rename = "@type")]
    pub kind: String,
    pub name: String,
    pub url: String,
}

impl SoftwareApplication {
    /// The structured data published on every page of the site.
    pub fn ez_term() -> Self {
        Self {
            context: SCHEMA_CONTEXT.to_string(),
            kind: "SoftwareApplication".to_string(),
            name: "ez-term".to_string(),
            application_category: "DeveloperApplication".to_string(),
            operating_system: "Linux, macOS, Windows".to_string(),
            description: "Privacy-first AI CLI command generator that runs 100% locally using \
                          Ollama. Context-aware, safe by default, and zero telemetry."
                .to_string(),
            url: SITE_URL.to_string(),
            download_url: "https://github.com/ezcorp-org/ez-term/releases".to_string(),
            software_version: "0.3.0".to_string(),
            offers: Offer::free(),
            creator: Organization {
                kind: "Organization".to_string(),
                name: "EZ Corp".to_string(),
                url: SITE_URL.to_string(),
            },
            screenshot: format!("{SITE_URL}assets/images/og-preview.png"),
            feature_list: [
                "100% Local Processing with Ollama",
                "Zero Telemetry and Privacy-First",
                "Context-Aware Command Generation",
                "Safe by Default - Preview Before Execute",
                "Cross-Platform Support",
                "Shell Integration (zsh/bash)",
                "Open Source MIT License",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            keywords: "CLI, command generator, AI, Ollama, privacy, terminal, bash, shell, \
                       developer tools"
                .to_string(),
            license: "https://opensource.org/licenses/MIT".to_string(),
            code_repository: "https://github.com/ezcorp-org/ez-term".to_string(),
            programming_language: "Rust".to_string(),
        }
    }

    /// Serialize as pretty-printed JSON-LD.
    pub fn to_json_ld(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a JSON-LD document.
    pub fn from_json_ld(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// HTML `<script>` element embedding this document.
    ///
    /// `</` is escaped so the payload cannot close the script element early.
    pub fn script_tag(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?.replace("</", "<\\/");
        Ok(format!(r#"<script type="application/ld+json">{json}</script>"#))
    }
}

impl Default for SoftwareApplication {
    fn default() -> Self {
        Self::ez_term()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn offer_is_free() {
        let app = SoftwareApplication::ez_term();

        assert_eq!(app.offers.price, "0");
        assert_eq!(app.offers.price_currency, "USD");
    }

    #[test]
    fn uses_schema_org_field_names() {
        let value = serde_json::to_value(SoftwareApplication::ez_term()).unwrap();

        assert_eq!(value["@context"], "https://schema.org");
        assert_eq!(value["@type"], "SoftwareApplication");
        assert_eq!(value["offers"]["@type"], "Offer");
        assert_eq!(value["offers"]["priceCurrency"], "USD");
        assert_eq!(value["creator"]["@type"], "Organization");
        assert_eq!(value["softwareVersion"], "0.3.0");
        assert_eq!(value["codeRepository"], "https://github.com/ezcorp-org/ez-term");
        assert_eq!(value["featureList"].as_array().unwrap().len(), 7);
    }

    #[test]
    fn json_ld_round_trips() {
        let app = SoftwareApplication::ez_term();
        let json = app.to_json_ld().unwrap();

        assert_eq!(SoftwareApplication::from_json_ld(&json).unwrap(), app);
    }

    #[test]
    fn is_constant_across_calls() {
        assert_eq!(SoftwareApplication::ez_term(), SoftwareApplication::ez_term());
    }

    #[test]
    fn script_tag_escapes_closing_sequences() {
        let mut app = SoftwareApplication::ez_term();
        app.description = "</script><b>".to_string();

        let tag = app.script_tag().unwrap();

        assert!(tag.starts_with(r#"<script type="application/ld+json">"#));
        assert_eq!(tag.matches("</script>").count(), 1);
        assert!(tag.contains(r"<\/script>"));
    }
}
