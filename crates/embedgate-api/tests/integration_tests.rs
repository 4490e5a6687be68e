//! # Integration Tests for embedgate-api
//!
//! Drives the full router with in-memory backends and a manual clock:
//! origin allow-listing, fixed-window rate limiting, ticket downgrade,
//! registry failure, audit isolation, probes, metrics, and response headers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use embedgate_api::audit::{verify_sink, AuditAction, AuditEvent, AuditError, AuditSink, InMemoryAuditSink, StoredAuditEvent};
use embedgate_api::middleware::metrics::GatewayMetrics;
use embedgate_api::registry::{InMemoryRegistry, RegistryError, WidgetRegistry};
use embedgate_api::state::{AppState, GatewayParts};
use embedgate_api::store::{BucketStore, InMemoryBucketStore, StoreError};
use embedgate_api::GatewayConfig;
use embedgate_core::{ManualClock, SiteKey, WidgetRegistration, WidgetSecret};
use embedgate_crypto::sign_ticket;

/// 2026-01-15T12:00:30Z, thirty seconds into a one-minute window.
const NOW: i64 = 1_768_478_430_000;
const SITE_KEY: &str = "pk_test_1";
const SECRET: &str = "s3cr3t-0123456789abcdef";

struct TestGateway {
    app: axum::Router,
    audit: Arc<InMemoryAuditSink>,
    clock: ManualClock,
    metrics: GatewayMetrics,
}

fn registration() -> WidgetRegistration {
    serde_json::from_value(serde_json::json!({
        "widget_id": "w-1",
        "name": "Support Chat",
        "site_key": SITE_KEY,
        "secret": SECRET,
        "allowed_origins": ["https://good.com", "http://localhost:3000"],
        "tenant_id": "tenant-a",
        "theme": {"color": "#0044ff"}
    }))
    .unwrap()
}

fn default_registry() -> Arc<dyn WidgetRegistry> {
    Arc::new(InMemoryRegistry::from_registrations(vec![registration()]).unwrap())
}

/// Helper: build the app around `registry` and `audit` sinks.
fn build(
    config: GatewayConfig,
    registry: Arc<dyn WidgetRegistry>,
    audit: Arc<dyn AuditSink>,
) -> (axum::Router, ManualClock, GatewayMetrics) {
    build_with_buckets(config, registry, Arc::new(InMemoryBucketStore::new()), audit)
}

fn build_with_buckets(
    config: GatewayConfig,
    registry: Arc<dyn WidgetRegistry>,
    buckets: Arc<dyn BucketStore>,
    audit: Arc<dyn AuditSink>,
) -> (axum::Router, ManualClock, GatewayMetrics) {
    let clock = ManualClock::new(NOW);
    let metrics = GatewayMetrics::new();
    let parts = GatewayParts {
        registry,
        buckets,
        audit,
        clock: Arc::new(clock.clone()),
    };
    let state = AppState::assemble(config, parts, metrics.clone(), None);
    (embedgate_api::app(state), clock, metrics)
}

/// Helper: test app with a single registered widget.
fn test_gateway(config: GatewayConfig) -> TestGateway {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (app, clock, metrics) = build(config, default_registry(), audit.clone());
    TestGateway {
        app,
        audit,
        clock,
        metrics,
    }
}

fn config_with_limit(limit: u64) -> GatewayConfig {
    GatewayConfig {
        rate_limit: limit,
        store_timeout: Duration::from_millis(200),
        ..GatewayConfig::default()
    }
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

fn bootstrap_uri(params: &[(&str, &str)]) -> String {
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{k}={}", encode(v)))
        .collect();
    format!("/widget/bootstrap?{}", query.join("&"))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::ORIGIN, "https://good.com")
        .body(Body::empty())
        .unwrap()
}

fn bootstrap(origin: &str) -> Request<Body> {
    get(&bootstrap_uri(&[("site_key", SITE_KEY), ("origin", origin)]))
}

fn ticketed(user_id: &str, timestamp: i64, signature: &str) -> Request<Body> {
    let ts = timestamp.to_string();
    get(&bootstrap_uri(&[
        ("site_key", SITE_KEY),
        ("origin", "https://good.com"),
        ("user_id", user_id),
        ("timestamp", &ts),
        ("signature", signature),
    ]))
}

fn sign(user_id: &str, timestamp: i64) -> String {
    sign_ticket(&WidgetSecret::new(SECRET).unwrap(), user_id, timestamp).unwrap()
}

fn assert_cache_control(response: &axum::http::Response<Body>) {
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=60"
    );
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let gw = test_gateway(GatewayConfig::default());
    let response = gw.app.oneshot(get("/health/liveness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe_without_database() {
    let gw = test_gateway(GatewayConfig::default());
    let response = gw.app.oneshot(get("/health/readiness")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Successful Bootstrap -----------------------------------------------------

#[tokio::test]
async fn test_allowed_origin_returns_sanitized_config() {
    let gw = test_gateway(GatewayConfig::default());
    let response = gw.app.oneshot(bootstrap("https://good.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=60"
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );

    let body = body_string(response).await;
    assert!(!body.contains("secret"));
    assert!(!body.contains(SECRET));
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["id"], "w-1");
    assert_eq!(json["name"], "Support Chat");
    assert_eq!(json["site_key"], SITE_KEY);
    assert_eq!(json["theme"]["color"], "#0044ff");
    assert!(json.get("user").is_none());

    assert_eq!(gw.audit.actions(), vec![AuditAction::BootstrapSuccess]);
}

#[tokio::test]
async fn test_equivalent_origin_spellings_are_allowed() {
    let gw = test_gateway(GatewayConfig::default());
    for origin in ["https://good.com/", "https://GOOD.com", "https://good.com:443"] {
        let response = gw.app.clone().oneshot(bootstrap(origin)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{origin}");
    }
}

// -- Origin Validation --------------------------------------------------------

#[tokio::test]
async fn test_origin_variants_are_forbidden() {
    let gw = test_gateway(GatewayConfig::default());
    for origin in [
        "https://good.com.evil.com",
        "https://good.com:8443",
        "https://good.com/path",
        "https://evil.com",
        "http://localhost:3001",
        "https://user@good.com",
    ] {
        let response = gw.app.clone().oneshot(bootstrap(origin)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{origin}");
        assert_cache_control(&response);
        let json = body_json(response).await;
        assert_eq!(json["status"], 403);
        assert_eq!(json["error"], "origin not allowed");
    }
    assert_eq!(gw.audit.len(), 6);
    assert!(gw
        .audit
        .actions()
        .iter()
        .all(|a| *a == AuditAction::OriginMismatch));
    let first = &gw.audit.events()[0].event;
    assert_eq!(first.tenant_id.as_deref(), Some("tenant-a"));
    assert_eq!(first.meta["origin"], "https://good.com.evil.com");
}

// -- Malformed Input ----------------------------------------------------------

#[tokio::test]
async fn test_malformed_requests_are_400() {
    let gw = test_gateway(GatewayConfig::default());
    let uris = [
        "/widget/bootstrap".to_string(),
        bootstrap_uri(&[("origin", "https://good.com")]),
        bootstrap_uri(&[("site_key", SITE_KEY)]),
        bootstrap_uri(&[("site_key", "has spaces"), ("origin", "https://good.com")]),
        bootstrap_uri(&[("site_key", SITE_KEY), ("origin", "not a url")]),
    ];
    for uri in &uris {
        let response = gw.app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "private, max-age=60"
        );
        let json = body_json(response).await;
        assert_eq!(json["status"], 400);
    }
    assert_eq!(gw.audit.len(), uris.len());
    assert!(gw
        .audit
        .events()
        .iter()
        .all(|e| e.event.action == AuditAction::MalformedInput && e.event.tenant_id.is_none()));
}

#[tokio::test]
async fn test_unknown_site_key_is_404() {
    let gw = test_gateway(GatewayConfig::default());
    let uri = bootstrap_uri(&[("site_key", "pk_unknown"), ("origin", "https://good.com")]);
    let response = gw.app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cache_control(&response);
    let json = body_json(response).await;
    assert_eq!(json["error"], "widget not found");

    let event = &gw.audit.events()[0].event;
    assert_eq!(event.action, AuditAction::WidgetNotFound);
    assert_eq!(event.target, "pk_unknown");
}

#[tokio::test]
async fn test_undecodable_query_is_audited_as_malformed_query() {
    let gw = test_gateway(GatewayConfig::default());
    let uri = format!(
        "/widget/bootstrap?site_key={SITE_KEY}&site_key=pk_other&origin={}",
        encode("https://good.com")
    );
    let response = gw.app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cache_control(&response);

    let event = &gw.audit.events()[0].event;
    assert_eq!(event.action, AuditAction::MalformedInput);
    assert_eq!(event.meta["reason"], "malformed_query");
    assert_eq!(event.meta["stage"], "shape");
}

// -- Rate Limiting ------------------------------------------------------------

#[tokio::test]
async fn test_exactly_limit_requests_succeed_per_window() {
    let gw = test_gateway(config_with_limit(3));
    for _ in 0..3 {
        let response = gw.app.clone().oneshot(bootstrap("https://good.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = gw.app.clone().oneshot(bootstrap("https://good.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_cache_control(&response);
    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(retry_after, 30);
    let json = body_json(response).await;
    assert_eq!(json["status"], 429);

    // Next window opens a fresh bucket.
    gw.clock.advance(30_000);
    let response = gw.app.clone().oneshot(bootstrap("https://good.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_retry_after_only_on_429() {
    let gw = test_gateway(GatewayConfig::default());
    let response = gw.app.oneshot(bootstrap("https://evil.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_burst_admits_at_most_limit() {
    let limit = 10;
    let gw = test_gateway(config_with_limit(limit));
    let tasks: Vec<_> = (0..limit * 2)
        .map(|_| {
            let app = gw.app.clone();
            tokio::spawn(async move { app.oneshot(bootstrap("https://good.com")).await.unwrap().status() })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, limit);
    assert_eq!(limited, limit);
    assert_eq!(gw.audit.len() as u64, limit * 2);
}

#[tokio::test]
async fn test_subject_from_peer_address() {
    let gw = test_gateway(config_with_limit(1));
    for (peer, expected) in [
        ("198.51.100.1:4000", StatusCode::OK),
        ("198.51.100.2:4000", StatusCode::OK),
        ("198.51.100.1:4001", StatusCode::TOO_MANY_REQUESTS),
    ] {
        let mut request = bootstrap("https://good.com");
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let response = gw.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "{peer}");
    }
    assert_eq!(gw.audit.events()[0].event.actor, "198.51.100.1");
}

#[tokio::test]
async fn test_forwarded_for_only_when_trusted() {
    let trusted = test_gateway(GatewayConfig {
        trust_forwarded_for: true,
        ..config_with_limit(1)
    });
    for client in ["203.0.113.1", "203.0.113.2"] {
        let mut request = bootstrap("https://good.com");
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        let response = trusted.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{client}");
    }

    let untrusted = test_gateway(config_with_limit(1));
    let mut statuses = Vec::new();
    for client in ["203.0.113.1", "203.0.113.2"] {
        let mut request = bootstrap("https://good.com");
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        statuses.push(untrusted.app.clone().oneshot(request).await.unwrap().status());
    }
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
}

// -- Identity Tickets ---------------------------------------------------------

#[tokio::test]
async fn test_valid_ticket_authenticates_user() {
    let gw = test_gateway(GatewayConfig::default());
    let signature = sign("user-42", NOW - 5_000);
    let response = gw
        .app
        .oneshot(ticketed("user-42", NOW - 5_000, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["user"]["id"], "user-42");
    assert_eq!(gw.audit.events()[0].event.meta["ticket"], "verified");
}

#[tokio::test]
async fn test_flipped_signature_byte_downgrades_to_anonymous() {
    let gw = test_gateway(GatewayConfig::default());
    let signature = sign("user-42", NOW);
    let mut chars: Vec<char> = signature.chars().collect();
    chars[0] = if chars[0] == '0' { '1' } else { '0' };
    let tampered: String = chars.into_iter().collect();

    let response = gw
        .app
        .oneshot(ticketed("user-42", NOW, &tampered))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("user").is_none());
    assert_eq!(json["id"], "w-1");

    let events = gw.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.action, AuditAction::InvalidTicket);
    assert_eq!(events[0].event.meta["user_id"], "user-42");
}

#[tokio::test]
async fn test_ten_minute_old_ticket_downgrades_to_anonymous() {
    let gw = test_gateway(GatewayConfig::default());
    let issued = NOW - 10 * 60 * 1_000;
    let signature = sign("user-42", issued);
    let response = gw
        .app
        .oneshot(ticketed("user-42", issued, &signature))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.get("user").is_none());
    assert_eq!(gw.audit.actions(), vec![AuditAction::TicketExpired]);
}

#[tokio::test]
async fn test_non_numeric_timestamp_is_invalid_not_400() {
    let gw = test_gateway(GatewayConfig::default());
    let uri = bootstrap_uri(&[
        ("site_key", SITE_KEY),
        ("origin", "https://good.com"),
        ("user_id", "user-42"),
        ("timestamp", "yesterday"),
        ("signature", "abcd"),
    ]);
    let response = gw.app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(gw.audit.actions(), vec![AuditAction::InvalidTicket]);
    assert_eq!(
        gw.audit.events()[0].event.meta["reason"],
        "malformed_timestamp"
    );
}

#[tokio::test]
async fn test_ticket_not_checked_when_origin_forbidden() {
    let gw = test_gateway(GatewayConfig::default());
    let signature = sign("user-42", NOW);
    let ts = NOW.to_string();
    let uri = bootstrap_uri(&[
        ("site_key", SITE_KEY),
        ("origin", "https://evil.com"),
        ("user_id", "user-42"),
        ("timestamp", &ts),
        ("signature", &signature),
    ]);
    let response = gw.app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(gw.audit.actions(), vec![AuditAction::OriginMismatch]);
}

// -- Registry Failure ---------------------------------------------------------

struct DownRegistry;

#[async_trait]
impl WidgetRegistry for DownRegistry {
    async fn lookup(&self, _site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError> {
        Err(RegistryError::Unavailable("connection refused".into()))
    }
}

struct SlowRegistry;

#[async_trait]
impl WidgetRegistry for SlowRegistry {
    async fn lookup(&self, _site_key: &SiteKey) -> Result<Option<WidgetRegistration>, RegistryError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }
}

#[tokio::test]
async fn test_registry_failure_is_503_without_detail() {
    let registries: [Arc<dyn WidgetRegistry>; 2] = [Arc::new(DownRegistry), Arc::new(SlowRegistry)];
    for registry in registries {
        let audit = Arc::new(InMemoryAuditSink::new());
        let (app, _, _) = build(config_with_limit(60), registry, audit.clone());
        let response = app.oneshot(bootstrap("https://good.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_cache_control(&response);
        let body = body_string(response).await;
        assert!(!body.contains("connection refused"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "service unavailable");
        assert_eq!(audit.actions(), vec![AuditAction::RegistryUnavailable]);
    }
}

// -- Degraded Bucket Store ----------------------------------------------------

struct DownBuckets;

#[async_trait]
impl BucketStore for DownBuckets {
    async fn atomic_increment(&self, _bucket_key: &str, _window_start: i64) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn prune_before(&self, _window_start: i64) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn test_bucket_store_down_fails_open_by_default() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (app, _, metrics) = build_with_buckets(
        config_with_limit(1),
        default_registry(),
        Arc::new(DownBuckets),
        audit.clone(),
    );
    for _ in 0..3 {
        let response = app.clone().oneshot(bootstrap("https://good.com")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    let events = audit.events();
    assert_eq!(events.len(), 3);
    for stored in &events {
        assert_eq!(stored.event.action, AuditAction::BootstrapSuccess);
        assert_eq!(stored.event.meta["limiter_degraded"], true);
    }
    assert_eq!(metrics.rate_limiter_degraded(), 3);
}

#[tokio::test]
async fn test_bucket_store_down_fails_closed_when_configured() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let config = GatewayConfig {
        rate_fail_closed: true,
        ..config_with_limit(60)
    };
    let (app, _, metrics) =
        build_with_buckets(config, default_registry(), Arc::new(DownBuckets), audit.clone());
    let response = app.oneshot(bootstrap("https://good.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_cache_control(&response);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");

    let event = &audit.events()[0].event;
    assert_eq!(event.action, AuditAction::RateLimited);
    assert_eq!(event.meta["reason"], "store_unavailable");
    assert_eq!(event.meta["limiter_degraded"], true);
    assert_eq!(metrics.rate_limiter_degraded(), 1);
}

// -- Audit Trail --------------------------------------------------------------

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn append(&self, _event: &AuditEvent) -> Result<StoredAuditEvent, AuditError> {
        Err(AuditError::Unavailable("audit store offline".into()))
    }

    async fn read_chain(&self) -> Result<Vec<StoredAuditEvent>, AuditError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_audit_failure_does_not_change_response() {
    let (app, _, metrics) = build(config_with_limit(60), default_registry(), Arc::new(FailingSink));
    let response = app.clone().oneshot(bootstrap("https://good.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.oneshot(bootstrap("https://evil.com")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(metrics.audit_write_failures(), 2);
}

#[tokio::test]
async fn test_one_audit_event_per_request_and_chain_verifies() {
    let gw = test_gateway(config_with_limit(2));
    let requests = vec![
        bootstrap("https://good.com"),
        bootstrap("https://evil.com"),
        get("/widget/bootstrap"),
        bootstrap("https://good.com"),
    ];
    for request in requests {
        gw.app.clone().oneshot(request).await.unwrap();
    }
    assert_eq!(
        gw.audit.actions(),
        vec![
            AuditAction::BootstrapSuccess,
            AuditAction::OriginMismatch,
            AuditAction::MalformedInput,
            AuditAction::RateLimited,
        ]
    );

    let integrity = verify_sink(gw.audit.as_ref()).await.unwrap();
    assert!(integrity.chain_valid);
    assert_eq!(integrity.total_events, 4);
    assert_eq!(gw.metrics.outcomes("rate_limited"), 1);
}

// -- CORS, Metrics, OpenAPI ---------------------------------------------------

#[tokio::test]
async fn test_cors_preflight() {
    let gw = test_gateway(GatewayConfig::default());
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/widget/bootstrap")
        .header(header::ORIGIN, "https://good.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = gw.app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=60"
    );
    assert!(gw.audit.is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint_reports_outcomes() {
    let gw = test_gateway(GatewayConfig::default());
    gw.app
        .clone()
        .oneshot(bootstrap("https://good.com"))
        .await
        .unwrap();
    let response = gw.app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("embedgate_bootstrap_outcomes_total"));
    assert!(body.contains("bootstrap_success"));
    assert!(body.contains("embedgate_http_requests_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_absent_when_disabled() {
    let gw = test_gateway(GatewayConfig {
        metrics_enabled: false,
        ..GatewayConfig::default()
    });
    let response = gw.app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let gw = test_gateway(GatewayConfig::default());
    let response = gw.app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/widget/bootstrap"].is_object());
}
