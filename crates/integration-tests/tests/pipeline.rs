//! The full router driven in-process.
//!
//! No database and no socket: every request goes through the same layer
//! stack the binary serves, via `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, Response, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH,
            CONTENT_SECURITY_POLICY, CONTENT_TYPE, COOKIE, ORIGIN, SERVER, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    routing::{any, get as get_route},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use storegate_integration_tests::{ALLOWED_ORIGIN, ENTRY_DOCUMENT, TestSite};
use storegate_core::OriginAllowList;
use storegate_server::{
    AppState, Environment, app, app_with_mounts,
    db::Database,
    pipeline::PolicyConfig,
    routes::{MountRule, Mounts},
};

const HIDDEN_PATHS: &[&str] = &[
    "/.env",
    "/.git/config",
    "/.well-known/security.txt",
    "/assets/.git/HEAD",
    "/static/_darcs/prefs",
    "/x/.hg/store",
    "/BitKeeper/etc/config",
    "/a/.bzr/branch",
    "/%2Egit/config",
];

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

async fn text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn assert_policy_headers(response: &Response<Body>) {
    assert_eq!(
        response.headers()[X_CONTENT_TYPE_OPTIONS],
        "nosniff",
        "missing nosniff on {}",
        response.status()
    );
    assert!(response.headers().contains_key(CONTENT_SECURITY_POLICY));
    assert_eq!(response.headers()[X_FRAME_OPTIONS], "DENY");
    assert!(response.headers().get(SERVER).is_none());
}

/// Standard mounts plus a probe mount that would answer every hidden path.
fn probed_router(site: &TestSite, hits: &Arc<AtomicUsize>) -> Router {
    let state = site.state(Environment::Production);
    let mut probe = Router::new();
    for path in HIDDEN_PATHS {
        let hits = Arc::clone(hits);
        probe = probe.route(
            path,
            any(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "reached"
                }
            }),
        );
    }
    let mounts = Mounts::standard(&state).mount("probe", MountRule::Exact(HIDDEN_PATHS), probe);
    app_with_mounts(&state, mounts).unwrap()
}

// ============================================================================
// Hidden paths
// ============================================================================

#[tokio::test]
async fn test_hidden_paths_are_denied_before_routing() {
    let site = TestSite::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let router = probed_router(&site, &hits);

    for path in HIDDEN_PATHS {
        for method in [Method::GET, Method::POST, Method::OPTIONS] {
            let response = send(&router, request(method.clone(), path)).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {path}");
            assert_policy_headers(&response);
            assert_eq!(text(response).await, "Access Denied");
        }
    }

    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_probe_mount_is_reachable_for_ordinary_paths() {
    let site = TestSite::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let state = site.state(Environment::Development);
    let probe = {
        let hits = Arc::clone(&hits);
        Router::new().route(
            "/probe",
            any(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    "reached"
                }
            }),
        )
    };
    let mounts = Mounts::standard(&state).mount("probe", MountRule::Exact(&["/probe"]), probe);
    let router = app_with_mounts(&state, mounts).unwrap();

    let response = send(&router, get("/probe")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Cross-origin policy
// ============================================================================

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(
        &router,
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/products")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert!(response.status().is_success());
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE");
    assert_eq!(
        headers[ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization, X-Requested-With"
    );
    assert_policy_headers(&response);
}

#[tokio::test]
async fn test_disallowed_origin_never_echoed() {
    let site = TestSite::new();
    let router = site.router(Environment::Production);
    let evil = "https://evil.example";

    for (method, path) in [
        (Method::GET, "/health"),
        (Method::OPTIONS, "/api/products"),
        (Method::GET, "/some/client/route"),
        (Method::GET, "/.git/config"),
    ] {
        let response = send(
            &router,
            Request::builder()
                .method(method.clone())
                .uri(path)
                .header(ORIGIN, evil)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none(),
            "{method} {path} leaked CORS headers"
        );
    }
}

#[tokio::test]
async fn test_allowed_origin_on_simple_request() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(
        &router,
        Request::builder()
            .uri("/health")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(text(response).await, "ok");
}

#[tokio::test]
async fn test_substituted_allow_list_replaces_default() {
    let site = TestSite::new();
    let shop = "https://shop.example";
    let config = site.config(Environment::Development);
    let policy = PolicyConfig::storefront(config.body_limit)
        .with_origins(OriginAllowList::new([shop]).unwrap());
    let state = AppState::with_parts(config, Database::pending(), Arc::new(policy));
    let router = app(&state).unwrap();

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/products")
            .header(ORIGIN, origin)
            .header("access-control-request-method", "PUT")
            .body(Body::empty())
            .unwrap()
    };

    let response = send(&router, preflight(shop)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], shop);

    let response = send(&router, preflight(ALLOWED_ORIGIN)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

// ============================================================================
// Body ingestion
// ============================================================================

#[tokio::test]
async fn test_malformed_json_then_server_keeps_serving() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(&router, post_json("/api/products", r#"{"name": "Figure", "#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_policy_headers(&response);
    let body = text(response).await;
    assert_eq!(body, "Bad request");

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);
    let big = format!(r#"{{"name":"{}"}}"#, "x".repeat(2 * 1024 * 1024));

    let response = send(&router, post_json("/api/products", &big)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_policy_headers(&response);
}

#[tokio::test]
async fn test_declared_oversized_body_is_rejected() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(
        &router,
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, "104857600")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// Router
// ============================================================================

#[tokio::test]
async fn test_mount_precedence() {
    let site = TestSite::new();
    let state = site.state(Environment::Development);

    assert_eq!(
        Mounts::standard(&state).order(),
        ["health", "auth", "products"]
    );

    let router = site.router(Environment::Development);

    // Auth only claims its exact paths.
    let response = send(&router, get("/api/auth/other")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(text(response).await, "Route not found");

    // Products claims everything below its prefix.
    let response = send(&router, get("/api/products/1/extra")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_me_without_session_is_unauthorized_envelope() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(
        &router,
        Request::builder()
            .uri("/api/auth/me")
            .header(COOKIE, "storegate_session=garbage")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_policy_headers(&response);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Unauthorized"})
    );
}

#[tokio::test]
async fn test_validation_runs_before_database() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(&router, post_json("/api/auth/signup", r#"{"email":"a@b.co"}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Please provide all fields"})
    );

    let response = send(
        &router,
        post_json("/api/products", r#"{"name":"Figure","price":-1,"image":"x.png"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Price cannot be negative"})
    );
}

#[tokio::test]
async fn test_database_routes_unavailable_until_connected() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(&router, get("/api/products")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await,
        json!({"success": false, "message": "Service unavailable"})
    );

    let response = send(&router, get("/health/ready")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Static gateway
// ============================================================================

#[tokio::test]
async fn test_missing_robots_and_sitemap_are_distinguishable() {
    let site = TestSite::new();
    let router = site.router(Environment::Production);

    let robots = send(&router, get("/robots.txt")).await;
    let sitemap = send(&router, get("/sitemap.xml")).await;

    assert_eq!(robots.status(), StatusCode::NOT_FOUND);
    assert_eq!(sitemap.status(), StatusCode::NOT_FOUND);
    assert_policy_headers(&robots);
    let robots = text(robots).await;
    let sitemap = text(sitemap).await;
    assert_ne!(robots, sitemap);
    assert_eq!(robots, "Robots.txt not found");
}

#[tokio::test]
async fn test_sitemap_served_in_development() {
    let site = TestSite::new();
    site.write_public("sitemap.xml", "<urlset></urlset>");
    let router = site.router(Environment::Development);

    let response = send(&router, get("/sitemap.xml")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .contains("xml")
    );
    assert_policy_headers(&response);
    assert_eq!(text(response).await, "<urlset></urlset>");
}

#[tokio::test]
async fn test_spa_fallback_only_for_get_in_production() {
    let site = TestSite::new();
    let router = site.router(Environment::Production);

    let response = send(&router, get("/some/unknown/client/route")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_policy_headers(&response);
    assert_eq!(text(response).await, ENTRY_DOCUMENT);

    let response = send(&router, request(Method::POST, "/some/unknown/client/route")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_policy_headers(&response);

    let response = send(&router, get("/assets/app.js")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "console.log('storegate')");
}

#[tokio::test]
async fn test_no_spa_fallback_in_development() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(&router, get("/some/unknown/client/route")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, get("/assets/app.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Failure containment
// ============================================================================

#[tokio::test]
async fn test_panicking_handler_is_generic_500() {
    let site = TestSite::new();
    let state = site.state(Environment::Development);
    let boom = Router::new().route(
        "/boom",
        any(|| async {
            if true {
                panic!("secret detail /srv/storegate");
            }
            "unreachable"
        }),
    );
    let mounts = Mounts::standard(&state).mount("boom", MountRule::Exact(&["/boom"]), boom);
    let router = app_with_mounts(&state, mounts).unwrap();

    let response = send(&router, get("/boom")).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_policy_headers(&response);
    let body = text(response).await;
    assert_eq!(body, "Internal server error");

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_timeout_response_carries_policy_headers() {
    let site = TestSite::new();
    let mut config = site.config(Environment::Development);
    config.request_timeout = Duration::from_millis(50);
    let policy = Arc::new(PolicyConfig::storefront(config.body_limit));
    let state = AppState::with_parts(config, Database::pending(), policy);

    let slow = Router::new().route(
        "/slow",
        get_route(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            "too late"
        }),
    );
    let mounts = Mounts::standard(&state).mount("slow", MountRule::Exact(&["/slow"]), slow);
    let router = app_with_mounts(&state, mounts).unwrap();

    let response = send(
        &router,
        Request::builder()
            .uri("/slow")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_policy_headers(&response);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);

    // The stack keeps serving after a timeout.
    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_every_response_carries_request_id() {
    let site = TestSite::new();
    let router = site.router(Environment::Development);

    let response = send(
        &router,
        Request::builder()
            .uri("/.env")
            .header("x-request-id", "edge-1234")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.headers()["x-request-id"], "edge-1234");

    let response = send(&router, get("/health")).await;
    assert!(response.headers().contains_key("x-request-id"));
}
