//! Request dispatch tests.
//!
//! Exercises the pipeline composition rules end to end: raw-handler and
//! catch-all resolution (first match wins), filter ordering and the
//! closed-response short circuit, service-exception refinement (last write
//! wins), uncaught-error synthesis with the closed-response guard, and
//! per-request release.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use http::{Method, StatusCode};
use serial_test::serial;

use hearth_host::prelude::*;

type ConfigureFn = Box<dyn Fn(&AppHost) -> HostResult<()> + Send + Sync>;

struct TestApp {
    configure: ConfigureFn,
}

impl TestApp {
    fn new(configure: impl Fn(&AppHost) -> HostResult<()> + Send + Sync + 'static) -> Self {
        Self {
            configure: Box::new(configure),
        }
    }
}

impl HostApp for TestApp {
    fn service_name(&self) -> &str {
        "dispatch-tests"
    }

    fn assemblies(&self) -> Vec<ServiceAssembly> {
        vec![ServiceAssembly::new("dispatch-tests")
            .service("Echo", |req: serde_json::Value, _ctx: &mut RequestContext| {
                Ok(serde_json::json!({ "echo": req }))
            })
            .service("Fail", |_req: serde_json::Value, _ctx: &mut RequestContext| {
                Err::<serde_json::Value, _>(HostError::service("database exploded"))
            })]
    }

    fn configure(&self, host: &AppHost) -> HostResult<()> {
        (self.configure)(host)
    }
}

struct StaticHandler {
    body: &'static str,
}

impl HttpHandler for StaticHandler {
    fn process(
        &self,
        host: &AppHost,
        _req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()> {
        host.write_response(res, StatusCode::OK, "text/plain", self.body.as_bytes());
        Ok(())
    }
}

#[test]
#[serial]
fn echo_service_round_trips_through_the_pipeline() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    let mut req = BasicRequest::post("/Echo", r#"{"text":"hi"}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.is_closed());
    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["echo"]["text"], "hi");
    assert_eq!(
        res.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );

    host.dispose();
}

#[test]
#[serial]
fn raw_handlers_resolve_first_match_in_registration_order() {
    let host = AppHost::init(TestApp::new(|host| {
        host.add_raw_handler(|_host, req| {
            (req.path() == "/claimed")
                .then(|| Arc::new(StaticHandler { body: "first" }) as Arc<dyn HttpHandler>)
        });
        host.add_raw_handler(|_host, req| {
            (req.path() == "/claimed")
                .then(|| Arc::new(StaticHandler { body: "second" }) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::get("/claimed");
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);
    assert_eq!(res.body_string(), "first");

    host.dispose();
}

#[test]
#[serial]
fn options_preflight_can_be_answered_without_any_service() {
    let host = AppHost::init(TestApp::new(|host| {
        host.add_raw_handler(|_host, req| {
            (*req.method() == Method::OPTIONS)
                .then(|| Arc::new(StaticHandler { body: "" }) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::options("/Echo");
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.is_closed());

    host.dispose();
}

#[test]
#[serial]
fn catch_all_handles_unmatched_requests_and_not_found_is_the_floor() {
    let host = AppHost::init(TestApp::new(|host| {
        host.add_catch_all_handler(|_host, req| {
            req.path()
                .starts_with("/legacy/")
                .then(|| Arc::new(StaticHandler { body: "legacy" }) as Arc<dyn HttpHandler>)
        });
        Ok(())
    }))
    .unwrap();

    let mut res = BasicResponse::new();
    host.handle_request(&mut BasicRequest::get("/legacy/v1"), &mut res);
    assert_eq!(res.body_string(), "legacy");

    let mut res = BasicResponse::new();
    host.handle_request(&mut BasicRequest::get("/nothing/here"), &mut res);
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    host.dispose();
}

#[test]
#[serial]
fn filters_run_in_registration_order_and_closing_short_circuits() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let service_seen = Arc::new(AtomicBool::new(false));
    let seen = service_seen.clone();

    let host = AppHost::init(TestApp::new(move |host| {
        let (a, b) = (a.clone(), b.clone());
        host.add_request_filter(move |_req, _res, _dto| a.lock().unwrap().push("one"));
        host.add_request_filter(move |_req, res, dto| {
            b.lock().unwrap().push("two");
            if dto.operation == "Echo" {
                // Claim the request: the response signals "already handled".
                res.set_status(StatusCode::FORBIDDEN);
                res.close();
            }
        });
        let seen = seen.clone();
        host.add_response_filter(move |_req, _res, _response| {
            seen.store(true, Ordering::SeqCst);
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::post("/Echo", r#"{}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(*order.lock().unwrap(), vec!["one", "two"]);
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    // Service and response filters never ran: the request was claimed.
    assert!(!service_seen.load(Ordering::SeqCst));

    host.dispose();
}

#[test]
#[serial]
fn service_exception_handlers_refine_with_last_write_wins() {
    let host = AppHost::init(TestApp::new(|host| {
        host.add_service_exception_handler(|_req, _dto, _err| {
            Some(ResponseDto::error(StatusCode::CONFLICT, "first claim"))
        });
        host.add_service_exception_handler(|_req, _dto, _err| None);
        host.add_service_exception_handler(|_req, _dto, err| {
            Some(ResponseDto::error(
                StatusCode::IM_A_TEAPOT,
                format!("refined: {}", err.message),
            ))
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::post("/Fail", r#"{}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    // The last non-None result is the effective error response.
    assert_eq!(res.status(), StatusCode::IM_A_TEAPOT);
    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["error"], "refined: database exploded");

    host.dispose();
}

#[test]
#[serial]
fn unclaimed_service_error_falls_back_to_mapped_status() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    let mut req = BasicRequest::post("/Fail", r#"{}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["error"], "database exploded");

    host.dispose();
}

#[test]
#[serial]
fn uncaught_error_with_no_handlers_synthesizes_mapped_status() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    // A malformed body fails request binding and escapes dispatch.
    let mut req = BasicRequest::post("/Echo", b"{not json".to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.body_string().contains("malformed request body"));

    host.dispose();
}

#[test]
#[serial]
fn uncaught_handlers_take_over_entirely_and_all_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (first, second) = (calls.clone(), calls.clone());

    let host = AppHost::init(TestApp::new(move |host| {
        let first = first.clone();
        host.add_uncaught_exception_handler(move |_req, res, _operation, _err| {
            first.fetch_add(1, Ordering::SeqCst);
            res.set_status(StatusCode::BAD_GATEWAY);
        });
        let second = second.clone();
        host.add_uncaught_exception_handler(move |_req, res, operation, err| {
            second.fetch_add(1, Ordering::SeqCst);
            res.write(format!("{operation}: {}", err.message).as_bytes());
            res.close();
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::post("/Echo", b"{not json".to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    // No short-circuit: both handlers ran, and the host wrote nothing of
    // its own.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.body_string().starts_with("Echo:"));

    host.dispose();
}

#[test]
#[serial]
fn writing_an_error_to_a_closed_response_is_a_noop() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    let mut req = BasicRequest::get("/anything");
    let mut res = BasicResponse::new();
    res.close();

    host.handle_uncaught_exception(&mut req, &mut res, "anything", &HostError::internal("late"));

    assert!(res.body_string().is_empty());
    assert_eq!(res.status(), StatusCode::OK);

    host.dispose();
}

#[test]
#[serial]
fn global_response_headers_are_stamped_on_every_write() {
    let host = AppHost::init(TestApp::new(|host| {
        host.update_config(|config| {
            config
                .global_response_headers
                .push(("x-powered-by".to_string(), "hearth".to_string()));
        });
        Ok(())
    }))
    .unwrap();

    let mut req = BasicRequest::post("/Echo", r#"{}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    assert_eq!(res.headers().get("x-powered-by").unwrap(), "hearth");

    host.dispose();
}

#[test]
#[serial]
fn metadata_surface_lists_operations_and_visible_formats() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    let mut req = BasicRequest::get("/metadata");
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["service"], "dispatch-tests");
    let operations: Vec<String> =
        serde_json::from_value(body["operations"].clone()).unwrap();
    assert!(operations.contains(&"Echo".to_string()));
    let formats: Vec<String> = serde_json::from_value(body["formats"].clone()).unwrap();
    assert!(formats.contains(&"json".to_string()));

    host.dispose();
}

#[test]
#[serial]
fn predefined_reply_routes_reach_services() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();

    let mut req = BasicRequest::post("/reply/Echo", r#"{"n":1}"#.as_bytes().to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);

    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["echo"]["n"], 1);

    host.dispose();
}

#[test]
#[serial]
fn handler_path_prefix_is_normalized_and_routes_under_it() {
    struct PrefixedApp;

    impl HostApp for PrefixedApp {
        fn service_name(&self) -> &str {
            "prefixed"
        }

        fn load_config(&self, config: &mut HostConfig) {
            // Leading separator is stripped during on_after_init.
            config.handler_factory_path = "/api".to_string();
        }

        fn assemblies(&self) -> Vec<ServiceAssembly> {
            vec![ServiceAssembly::new("prefixed").service(
                "Ping",
                |_req: serde_json::Value, _ctx: &mut RequestContext| Ok("pong"),
            )]
        }

        fn configure(&self, _host: &AppHost) -> HostResult<()> {
            Ok(())
        }
    }

    let host = AppHost::init(PrefixedApp).unwrap();
    assert_eq!(host.config().handler_factory_path, "api");

    let mut req = BasicRequest::get("/api/metadata");
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);
    let body: serde_json::Value = serde_json::from_slice(&res.body()).unwrap();
    assert_eq!(body["service"], "prefixed");

    let mut req = BasicRequest::post("/api/reply/Ping", b"null".to_vec());
    let mut res = BasicResponse::new();
    host.handle_request(&mut req, &mut res);
    assert_eq!(res.body_string(), "\"pong\"");

    host.dispose();
}

struct TrackedItem(Arc<AtomicUsize>);

impl hearth_host::core::Disposable for TrackedItem {
    fn dispose(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
#[serial]
fn tracked_request_items_are_released_at_end_of_request() {
    let host = AppHost::init(TestApp::new(|_| Ok(()))).unwrap();
    let released = Arc::new(AtomicUsize::new(0));

    let mut ctx = RequestContext::new();
    ctx.track(Arc::new(TrackedItem(released.clone())));
    ctx.track(Arc::new(TrackedItem(released.clone())));

    host.release_request(&mut ctx);
    assert_eq!(released.load(Ordering::SeqCst), 2);

    // Release is idempotent once drained.
    host.release_request(&mut ctx);
    assert_eq!(released.load(Ordering::SeqCst), 2);

    host.dispose();
}
