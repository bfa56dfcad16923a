//! Content-type and format-name vocabulary.
//!
//! The host's metadata surface and format plugins both speak in "short
//! format names" (`json`, `csv`, ...) while responses carry full MIME
//! types. This module owns both vocabularies and the mapping between them.

use serde::{Deserialize, Serialize};

/// `application/json`, the hardcoded fallback default content type.
pub const JSON: &str = "application/json";
/// `application/xml`
pub const XML: &str = "application/xml";
/// `text/jsv`
pub const JSV: &str = "text/jsv";
/// `text/csv`
pub const CSV: &str = "text/csv";
/// `text/html`
pub const HTML: &str = "text/html";
/// `text/xml; charset=utf-8` used by SOAP 1.1 endpoints.
pub const SOAP11: &str = "text/xml; charset=utf-8";
/// `application/soap+xml; charset=utf-8` used by SOAP 1.2 endpoints.
pub const SOAP12: &str = "application/soap+xml; charset=utf-8";
/// `text/markdown`
pub const MARKDOWN: &str = "text/markdown";
/// `text/plain`
pub const PLAIN_TEXT: &str = "text/plain";

/// A wire format the host can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// XML
    Xml,
    /// JSON
    Json,
    /// JSV (JSON-like CSV-escaped text)
    Jsv,
    /// CSV
    Csv,
    /// HTML
    Html,
    /// SOAP 1.1
    Soap11,
    /// SOAP 1.2
    Soap12,
    /// Markdown
    Markdown,
}

impl Format {
    /// The canonical short name used on the metadata/discovery surface.
    pub fn short_name(self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
            Format::Jsv => "jsv",
            Format::Csv => "csv",
            Format::Html => "html",
            Format::Soap11 => "soap11",
            Format::Soap12 => "soap12",
            Format::Markdown => "markdown",
        }
    }

    /// The MIME type responses in this format carry.
    pub fn content_type(self) -> &'static str {
        match self {
            Format::Xml => XML,
            Format::Json => JSON,
            Format::Jsv => JSV,
            Format::Csv => CSV,
            Format::Html => HTML,
            Format::Soap11 => SOAP11,
            Format::Soap12 => SOAP12,
            Format::Markdown => MARKDOWN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_lowercase_and_stable() {
        assert_eq!(Format::Json.short_name(), "json");
        assert_eq!(Format::Soap11.short_name(), "soap11");
        assert_eq!(Format::Csv.content_type(), CSV);
    }

    #[test]
    fn format_serializes_as_short_name() {
        let json = serde_json::to_string(&Format::Soap12).unwrap();
        assert_eq!(json, "\"soap12\"");
    }
}
