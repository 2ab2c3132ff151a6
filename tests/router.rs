use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::postgres::PgPoolOptions;
use storefront_api::{
    app::build_app,
    config::{AppConfig, MidtransConfig},
    payment::MidtransGateway,
    services::auth_service::issue_tokens,
    state::AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

// The pool never connects; every request below is answered before any query.
fn test_app() -> (Router, AppConfig) {
    let config = AppConfig {
        database_url: "postgres://storefront@localhost:1/unused".into(),
        host: "127.0.0.1".into(),
        port: 0,
        db_max_connections: 1,
        jwt_secret: "router-access".into(),
        jwt_refresh_secret: "router-refresh".into(),
        jwt_expires_in_hours: 1,
        jwt_refresh_expires_in_days: 1,
        default_shipping_fee: 10,
        midtrans: MidtransConfig::default(),
    };
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database_url)
        .expect("lazy pool");
    let gateway = Arc::new(MidtransGateway::new(&config.midtrans).expect("gateway"));
    let app = build_app(AppState::new(pool, config.clone(), gateway));
    (app, config)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_is_served_at_the_root() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn unknown_paths_get_the_envelope_404() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/api/does-not-exist")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/api/does-not-exist");
}

#[tokio::test]
async fn protected_routes_require_an_access_token() {
    let (app, config) = test_app();

    let request = Request::builder()
        .uri("/api/cart")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Refresh tokens are not accepted as bearer credentials.
    let (_, refresh) = issue_tokens(&config, Uuid::new_v4(), "user").expect("tokens");
    let request = Request::builder()
        .uri("/api/cart")
        .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn admin_routes_refuse_regular_users() {
    let (app, config) = test_app();
    let (access, _) = issue_tokens(&config, Uuid::new_v4(), "user").expect("tokens");

    let request = json_request(
        Method::POST,
        "/api/products",
        Some(&access),
        json!({
            "name": "Forbidden Widget",
            "price": 100,
            "category_id": Uuid::new_v4(),
            "stock": 1
        }),
    );
    let (status, _) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = json_request(
        Method::PUT,
        &format!("/api/orders/{}/status", Uuid::new_v4()),
        Some(&access),
        json!({ "status": "SHIPPED" }),
    );
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_touching_storage() {
    let (app, _) = test_app();

    let request = json_request(
        Method::POST,
        "/api/auth/register",
        None,
        json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "not-an-email",
            "password": "Str0ng!pass"
        }),
    );
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please provide a valid email address");

    let request = Request::builder()
        .uri("/api/products/search")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let (app, _) = test_app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.headers().contains_key("x-request-id"));
}
