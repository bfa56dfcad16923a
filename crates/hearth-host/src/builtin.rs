//! Built-in plugins.
//!
//! These are the default registry entries the feature reconciliation acts
//! on. Each is deliberately small, since the host only depends on their
//! registration contracts, and each carries the capability descriptor that
//! ties it to its feature bit.

use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::json;

use hearth_core::{content_type, Format, HostResult, HttpRequest, HttpResponse};

use crate::features::Feature;
use crate::handler::HttpHandler;
use crate::host::AppHost;
use crate::plugin::Plugin;
use crate::services::ServiceController;

/// Request path relative to the configured handler prefix, trimmed of
/// slashes; `None` when the request is outside the prefix.
fn relative_path(host: &AppHost, req: &dyn HttpRequest) -> Option<String> {
    let snapshot = host.config();
    let prefix = snapshot.derived.handler_path.as_str();
    let path = req.path().trim_matches('/');

    if prefix.is_empty() {
        return Some(path.to_string());
    }
    path.strip_prefix(prefix)
        .map(|rest| rest.trim_matches('/').to_string())
}

// ===== Metadata =====

/// Serves the metadata/discovery surface under `{prefix}/metadata`.
#[derive(Debug, Default)]
pub struct MetadataPlugin;

impl Plugin for MetadataPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::Metadata)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.add_raw_handler(|host, req| {
            let claims = *req.method() == Method::GET
                && relative_path(host, req).is_some_and(|rel| rel == "metadata");
            claims.then(|| Arc::new(MetadataHandler) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }
}

struct MetadataHandler;

impl HttpHandler for MetadataHandler {
    fn process(
        &self,
        host: &AppHost,
        _req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()> {
        let snapshot = host.config();
        let body = json!({
            "service": snapshot.service_name,
            "operations": host.services().operations(),
            "formats": snapshot.derived.metadata_formats,
        });
        host.write_response(
            res,
            StatusCode::OK,
            content_type::JSON,
            &serde_json::to_vec(&body).unwrap_or_default(),
        );
        Ok(())
    }
}

// ===== Predefined routes =====

/// Maps `{prefix}/reply/{operation}` onto registered services.
#[derive(Debug, Default)]
pub struct PredefinedRoutesPlugin;

impl Plugin for PredefinedRoutesPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::PredefinedRoutes)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.add_raw_handler(|host, req| {
            let rel = relative_path(host, req)?;
            let operation = rel.strip_prefix("reply/")?;
            if !host.services().has_operation(operation) {
                return None;
            }
            Some(Arc::new(ServiceRequestHandler {
                operation: operation.to_string(),
            }) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }
}

struct ServiceRequestHandler {
    operation: String,
}

impl HttpHandler for ServiceRequestHandler {
    fn process(
        &self,
        host: &AppHost,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()> {
        host.execute_operation(req, res, &self.operation)
    }
}

// ===== Request info =====

/// Diagnostic echo surface under `{prefix}/requestinfo`; added
/// automatically in debug mode.
#[derive(Debug, Default)]
pub struct RequestInfoPlugin;

impl Plugin for RequestInfoPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::RequestInfo)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.add_raw_handler(|host, req| {
            let claims = relative_path(host, req).is_some_and(|rel| rel == "requestinfo");
            claims.then(|| Arc::new(RequestInfoHandler) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }
}

struct RequestInfoHandler;

impl HttpHandler for RequestInfoHandler {
    fn process(
        &self,
        host: &AppHost,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()> {
        let headers: Vec<String> = req
            .headers()
            .iter()
            .map(|(name, value)| format!("{name}: {}", value.to_str().unwrap_or("<binary>")))
            .collect();
        let body = json!({
            "method": req.method().as_str(),
            "path": req.path(),
            "query": req.query_string(),
            "headers": headers,
        });
        host.write_response(
            res,
            StatusCode::OK,
            content_type::JSON,
            &serde_json::to_vec(&body).unwrap_or_default(),
        );
        Ok(())
    }
}

// ===== Format plugins =====

/// Registers the CSV content type.
#[derive(Debug, Default)]
pub struct CsvFormatPlugin;

impl Plugin for CsvFormatPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::Csv)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.register_format(Format::Csv);
        Ok(())
    }
}

/// Registers the HTML content type.
#[derive(Debug, Default)]
pub struct HtmlFormatPlugin;

impl Plugin for HtmlFormatPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::Html)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.register_format(Format::Html);
        Ok(())
    }
}

/// Registers the Markdown content type.
#[derive(Debug, Default)]
pub struct MarkdownFormatPlugin;

impl Plugin for MarkdownFormatPlugin {
    fn capability(&self) -> Option<Feature> {
        Some(Feature::Markdown)
    }

    fn register(&self, host: &AppHost) -> HostResult<()> {
        host.register_format(Format::Markdown);
        Ok(())
    }
}
