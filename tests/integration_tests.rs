use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path},
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing, Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusBuilder;
use model_gallery::{config::AppConfig, create_app, store::Model, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

const ALLOWED_ORIGIN: &str = "https://3d-model.aaronlei.com";

fn test_config(max_requests: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.rate_limiting.max_requests_per_window = max_requests;
    config.catalog.base_url = "http://127.0.0.1:1".to_string();
    config.catalog.timeout_seconds = 1;
    config.static_files.dir = "does-not-exist".to_string();
    config
}

fn test_app(max_requests: u32) -> (Router, AppState) {
    let state = AppState::new(test_config(max_requests), None).unwrap();
    (create_app(state.clone()), state)
}

fn request(
    method: Method,
    uri: &str,
    ip: Option<[u8; 4]>,
    referer: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(referer) = referer {
        builder = builder.header("referer", referer);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    if let Some(ip) = ip {
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    }
    request
}

fn get(uri: &str, ip: [u8; 4]) -> Request<Body> {
    request(Method::GET, uri, Some(ip), None)
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .map(|v| v.to_str().unwrap().to_string())
}

async fn seed(state: &AppState, uid: &str, minutes_ago: i64) {
    let updated_at = chrono::Utc::now() - chrono::Duration::minutes(minutes_ago);
    state
        .store
        .upsert(Model::from_catalog(
            uid,
            json!({ "name": format!("Model {}", uid), "user": { "username": "tester" } }),
            updated_at,
        ))
        .await;
}

async fn stub_catalog_model(Path(uid): Path<String>) -> Response {
    match uid.as_str() {
        "helmet01" => Json(json!({
            "uid": "helmet01",
            "name": "Helmet",
            "user": { "displayName": "Ada", "username": "ada42" },
            "thumbnails": {
                "images": [{ "url": "https://media.example/helmet.jpg", "width": 200 }]
            },
            "faceCount": 1200,
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `/v3/models/:uid` on an ephemeral port and return its base URL.
async fn start_stub_catalog() -> String {
    let catalog = Router::new().route("/v3/models/:uid", routing::get(stub_catalog_model));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, catalog).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn catalog_app(max_requests: u32) -> (Router, AppState) {
    let mut config = test_config(max_requests);
    config.catalog.base_url = start_stub_catalog().await;
    let state = AppState::new(config, None).unwrap();
    (create_app(state.clone()), state)
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app(5);

    let response = send(&app, get("/health", [10, 0, 0, 1])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "permissions-policy")
        .unwrap()
        .contains("xr-spatial-tracking=(self)"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "model-gallery");
}

#[tokio::test]
async fn test_detailed_health_reports_policy() {
    let (app, _) = test_app(7);

    let body = body_json(send(&app, get("/api/v1/health", [10, 0, 0, 1])).await).await;
    assert_eq!(body["rate_limiting"]["max_requests_per_window"], 7);
    assert_eq!(body["rate_limiting"]["tracked_identities"], 0);
}

#[tokio::test]
async fn test_five_requests_admitted_then_throttled() {
    let (app, _) = test_app(5);
    let ip = [192, 0, 2, 10];

    for expected in ["4", "3", "2", "1", "0"] {
        let response = send(&app, get("/api/models", ip)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-ratelimit-limit").unwrap(), "5");
        assert_eq!(header(&response, "x-ratelimit-remaining").unwrap(), expected);
        assert!(header(&response, "x-ratelimit-reset").is_some());
    }

    let response = send(&app, get("/api/models", ip)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&response, "retry-after").unwrap(), "86400");
    assert_eq!(header(&response, "x-ratelimit-remaining").unwrap(), "0");

    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["retryAfter"], 1440);
    assert!(body["message"].as_str().unwrap().contains("1440"));
}

#[tokio::test]
async fn test_rejected_request_never_reaches_handler() {
    let (app, state) = test_app(1);
    seed(&state, "keepme", 0).await;
    let ip = [192, 0, 2, 11];

    assert_eq!(send(&app, get("/api/model", ip)).await.status(), StatusCode::OK);

    let response = send(
        &app,
        request(Method::DELETE, "/api/models/keepme", Some(ip), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(state.store.get("keepme").await.is_some());
}

#[tokio::test]
async fn test_allowed_origin_bypasses_limit() {
    let (app, state) = test_app(1);
    let ip = [192, 0, 2, 12];

    assert_eq!(send(&app, get("/api/models", ip)).await.status(), StatusCode::OK);
    assert_eq!(
        send(&app, get("/api/models", ip)).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let referer = format!("{}/gallery", ALLOWED_ORIGIN);
    for _ in 0..3 {
        let response = send(
            &app,
            request(Method::GET, "/api/models", Some(ip), Some(&referer)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(header(&response, "x-ratelimit-remaining").is_none());
    }

    assert_eq!(state.rate_limiter.usage("192.0.2.12").unwrap().count, 1);
}

#[tokio::test]
async fn test_clients_are_counted_separately() {
    let (app, _) = test_app(1);

    assert_eq!(
        send(&app, get("/api/models", [192, 0, 2, 20])).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        send(&app, get("/api/models", [192, 0, 2, 21])).await.status(),
        StatusCode::OK
    );
    assert_eq!(
        send(&app, get("/api/models", [192, 0, 2, 20])).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

/// Requests without a peer address all land on the fallback identity and
/// compete for one quota. This is the inherited behavior, not a bug fix.
#[tokio::test]
async fn test_requests_without_address_share_fallback_counter() {
    let (app, state) = test_app(2);

    for _ in 0..2 {
        let response = send(&app, request(Method::GET, "/api/models", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = send(&app, request(Method::GET, "/api/models", None, None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    assert_eq!(state.rate_limiter.usage("127.0.0.1").unwrap().count, 2);
    assert_eq!(state.rate_limiter.tracked_identities(), 1);
}

#[tokio::test]
async fn test_stats_endpoint_is_not_gated() {
    let (app, _) = test_app(1);
    send(&app, get("/api/models", [192, 0, 2, 30])).await;
    send(&app, get("/api/models", [192, 0, 2, 31])).await;
    send(&app, get("/api/models", [192, 0, 2, 31])).await;

    for _ in 0..3 {
        let response = send(&app, get("/api/rate-limit/stats", [192, 0, 2, 30])).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["stats"]["totalTrackedIPs"], 2);
        assert_eq!(body["stats"]["allowedDomain"], ALLOWED_ORIGIN);
        assert_eq!(body["stats"]["maxRequestsPerDay"], 1);
        assert_eq!(body["stats"]["windowMs"], 86_400_000);

        let entries = body["stats"]["currentEntries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["ip"], "192.0.2.30");
        assert_eq!(entries[0]["count"], 1);
        assert_eq!(entries[0]["remaining"], 0);
    }
}

#[tokio::test]
async fn test_disabled_gate_passes_everything() {
    let mut config = test_config(1);
    config.rate_limiting.enabled = false;
    let state = AppState::new(config, None).unwrap();
    let app = create_app(state.clone());

    for _ in 0..5 {
        let response = send(&app, get("/api/models", [192, 0, 2, 40])).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(header(&response, "x-ratelimit-limit").is_none());
    }
    assert_eq!(state.rate_limiter.tracked_identities(), 0);
}

#[tokio::test]
async fn test_model_lifecycle() {
    let (app, state) = test_app(100);
    let ip = [192, 0, 2, 50];

    let response = send(&app, get("/api/model", ip)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, json!({ "ok": false }));

    seed(&state, "first", 10).await;
    seed(&state, "second", 5).await;

    let body = body_json(send(&app, get("/api/models", ip)).await).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["models"].as_array().unwrap().len(), 2);

    let body = body_json(send(&app, get("/api/model", ip)).await).await;
    assert_eq!(body, json!({ "ok": true, "uid": "second" }));

    let body = body_json(send(&app, get("/api/models/first", ip)).await).await;
    assert_eq!(body["model"]["uid"], "first");
    assert_eq!(body["model"]["name"], "Model first");
    assert_eq!(body["model"]["author"], "tester");

    let delete = || request(Method::DELETE, "/api/models/first", Some(ip), None);

    let response = send(&app, delete()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true, "deleted": 1 }));

    let response = send(&app, delete()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/api/models/first", ip)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_import_from_catalog() {
    let (app, state) = catalog_app(10).await;
    let import = || request(Method::POST, "/api/import/helmet01", Some([192, 0, 2, 62]), None);

    let response = send(&app, import()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-remaining").unwrap(), "9");

    let first = body_json(response).await;
    assert_eq!(first["ok"], true);
    assert_eq!(first["model"]["uid"], "helmet01");
    assert_eq!(first["model"]["name"], "Helmet");
    assert_eq!(first["model"]["author"], "Ada");
    assert_eq!(
        first["model"]["thumbnails"]["images"][0]["url"],
        "https://media.example/helmet.jpg"
    );
    assert_eq!(first["model"]["raw"]["faceCount"], 1200);

    let second = body_json(send(&app, import()).await).await;
    assert_eq!(second["ok"], true);
    assert_eq!(second["model"]["createdAt"], first["model"]["createdAt"]);
    assert!(
        timestamp(&second["model"]["updatedAt"]) >= timestamp(&first["model"]["updatedAt"])
    );

    assert_eq!(state.store.count().await, 1);
    let stored = state.store.get("helmet01").await.unwrap();
    assert_eq!(stored.created_at, timestamp(&first["model"]["createdAt"]));

    let body = body_json(send(&app, get("/api/model", [192, 0, 2, 62])).await).await;
    assert_eq!(body, json!({ "ok": true, "uid": "helmet01" }));
}

#[tokio::test]
async fn test_import_catalog_error_status() {
    let (app, state) = catalog_app(10).await;

    let response = send(
        &app,
        request(Method::POST, "/api/import/missing01", Some([192, 0, 2, 63]), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "catalog returned 404 Not Found" })
    );
    assert_eq!(state.store.count().await, 0);
}

#[tokio::test]
async fn test_import_with_unreachable_catalog() {
    let (app, state) = test_app(5);

    let response = send(
        &app,
        request(Method::POST, "/api/import/abc123", Some([192, 0, 2, 60]), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(header(&response, "x-ratelimit-remaining").unwrap(), "4");

    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert!(body["error"].is_string());
    assert_eq!(state.store.count().await, 0);
}

#[tokio::test]
async fn test_import_rejects_malformed_uid() {
    let (app, _) = test_app(5);

    let response = send(
        &app,
        request(Method::POST, "/api/import/a.b", Some([192, 0, 2, 61]), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["ok"], false);
}

#[tokio::test]
async fn test_tracked_identities_gauge_follows_decisions() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let (app, _) = test_app(1);
    send(&app, get("/api/models", [192, 0, 2, 70])).await;
    send(&app, get("/api/models", [192, 0, 2, 71])).await;
    assert!(handle
        .render()
        .contains("gallery_rate_limit_tracked_identities 2"));

    let response = send(&app, get("/api/models", [192, 0, 2, 72])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(handle
        .render()
        .contains("gallery_rate_limit_tracked_identities 3"));

    let referer = format!("{}/", ALLOWED_ORIGIN);
    send(
        &app,
        request(Method::GET, "/api/models", Some([192, 0, 2, 73]), Some(&referer)),
    )
    .await;
    assert!(handle
        .render()
        .contains("gallery_rate_limit_tracked_identities 3"));
}

#[tokio::test]
async fn test_openapi_document_served() {
    let (app, _) = test_app(5);

    let response = send(&app, get("/api-docs/openapi.json", [10, 0, 0, 1])).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["paths"]["/api/rate-limit/stats"].is_object());
}
