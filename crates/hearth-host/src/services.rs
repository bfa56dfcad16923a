//! Service controller: the boundary between the host and service code.
//!
//! The host treats the controller as an opaque collaborator: it discovers
//! services from assemblies during `init`, finalizes late-registered
//! mappings during `after_init`, and dispatches bound requests through
//! `execute`. The shipped [`ServiceRoutes`] implementation is
//! registration-driven: assemblies enumerate typed registrations rather
//! than relying on any runtime discovery.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use hearth_core::{HostError, HostResult, RequestContext, RequestDto, ResponseDto};

/// A type-erased service implementation.
pub type ServiceFn = Arc<dyn Fn(Value, &mut RequestContext) -> HostResult<Value> + Send + Sync>;

/// A named batch of service registrations, the discovery unit handed to
/// [`ServiceController::init`].
pub struct ServiceAssembly {
    name: String,
    registrations: Vec<(String, ServiceFn)>,
}

impl std::fmt::Debug for ServiceAssembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAssembly")
            .field("name", &self.name)
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

impl ServiceAssembly {
    /// An empty assembly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registrations: Vec::new(),
        }
    }

    /// Assembly name, used in discovery logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a typed service for `operation`.
    ///
    /// The request payload is bound to `Req` before the service runs; a
    /// payload that fails to bind yields an invalid-request error without
    /// invoking the service.
    #[must_use]
    pub fn service<Req, Res, F>(mut self, operation: impl Into<String>, service: F) -> Self
    where
        Req: DeserializeOwned,
        Res: Serialize,
        F: Fn(Req, &mut RequestContext) -> HostResult<Res> + Send + Sync + 'static,
    {
        let operation = operation.into();
        let type_erased: ServiceFn = Arc::new(move |body, ctx| {
            let request: Req = serde_json::from_value(body)
                .map_err(|e| HostError::invalid_request(format!("request binding failed: {e}")))?;
            let response = service(request, ctx)?;
            serde_json::to_value(response)
                .map_err(|e| HostError::internal(format!("response serialization failed: {e}")))
        });
        self.registrations.push((operation, type_erased));
        self
    }
}

/// Contract the host dispatches through.
pub trait ServiceController: Send + Sync {
    /// Discover and register services from the given assemblies.
    fn init(&self, assemblies: Vec<ServiceAssembly>);

    /// Finalize bindings that depended on plugins being loaded.
    fn after_init(&self);

    /// Whether an operation has a registered service.
    fn has_operation(&self, operation: &str) -> bool;

    /// Registered operation names, sorted.
    fn operations(&self) -> Vec<String>;

    /// Dispatch a bound request to its service.
    ///
    /// # Errors
    ///
    /// `NotFound` when no service is registered for the operation;
    /// otherwise whatever the service itself returns.
    fn execute(&self, dto: &RequestDto, ctx: &mut RequestContext) -> HostResult<ResponseDto>;

    /// Queue a mapping to be bound at `after_init`. Used by plugins that
    /// contribute services during registration.
    fn add_late(&self, operation: &str, service: ServiceFn);
}

/// Registration-driven [`ServiceController`].
pub struct ServiceRoutes {
    routes: DashMap<String, ServiceFn>,
    pending: Mutex<Vec<(String, ServiceFn)>>,
}

impl std::fmt::Debug for ServiceRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRoutes")
            .field("routes", &self.routes.len())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl Default for ServiceRoutes {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRoutes {
    /// An empty route table.
    pub fn new() -> Self {
        Self {
            routes: DashMap::new(),
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl ServiceController for ServiceRoutes {
    fn init(&self, assemblies: Vec<ServiceAssembly>) {
        for assembly in assemblies {
            debug!(
                assembly = %assembly.name,
                services = assembly.registrations.len(),
                "discovering services"
            );
            for (operation, service) in assembly.registrations {
                self.routes.insert(operation, service);
            }
        }
    }

    fn after_init(&self) {
        let late = std::mem::take(&mut *self.pending.lock());
        for (operation, service) in late {
            debug!(%operation, "binding late-registered service");
            self.routes.insert(operation, service);
        }
    }

    fn has_operation(&self, operation: &str) -> bool {
        self.routes.contains_key(operation)
    }

    fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn execute(&self, dto: &RequestDto, ctx: &mut RequestContext) -> HostResult<ResponseDto> {
        let service = self
            .routes
            .get(&dto.operation)
            .map(|e| e.value().clone())
            .ok_or_else(|| HostError::not_found(format!("no service for {}", dto.operation)))?;

        let body = service(dto.body.clone(), ctx)?;
        Ok(ResponseDto::ok(body))
    }

    fn add_late(&self, operation: &str, service: ServiceFn) {
        self.pending.lock().push((operation.to_string(), service));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Echo {
        text: String,
    }

    #[derive(Serialize)]
    struct EchoResponse {
        text: String,
    }

    fn controller_with_echo() -> ServiceRoutes {
        let controller = ServiceRoutes::new();
        let assembly = ServiceAssembly::new("tests").service(
            "Echo",
            |req: Echo, _ctx: &mut RequestContext| {
                Ok(EchoResponse {
                    text: req.text.to_uppercase(),
                })
            },
        );
        controller.init(vec![assembly]);
        controller
    }

    #[test]
    fn executes_registered_service() {
        let controller = controller_with_echo();
        let dto = RequestDto::new("Echo", serde_json::json!({ "text": "hi" }));
        let mut ctx = RequestContext::new();

        let res = controller.execute(&dto, &mut ctx).unwrap();
        assert_eq!(res.body["text"], "HI");
    }

    #[test]
    fn unknown_operation_is_not_found() {
        let controller = controller_with_echo();
        let dto = RequestDto::new("Missing", Value::Null);
        let err = controller
            .execute(&dto, &mut RequestContext::new())
            .unwrap_err();
        assert_eq!(err.kind, hearth_core::ErrorKind::NotFound);
    }

    #[test]
    fn binding_failure_never_reaches_the_service() {
        let controller = controller_with_echo();
        let dto = RequestDto::new("Echo", serde_json::json!({ "text": 42 }));
        let err = controller
            .execute(&dto, &mut RequestContext::new())
            .unwrap_err();
        assert_eq!(err.kind, hearth_core::ErrorKind::InvalidRequest);
    }

    #[test]
    fn late_registrations_bind_at_after_init() {
        let controller = controller_with_echo();
        controller.add_late("Late", Arc::new(|_, _| Ok(Value::Null)));
        assert!(!controller.has_operation("Late"));

        controller.after_init();
        assert!(controller.has_operation("Late"));
    }
}
