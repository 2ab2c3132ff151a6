use storefront_api::routes::health::health_check;

#[tokio::test]
async fn liveness_reports_crate_version() {
    let response = health_check().await.0;
    assert_eq!(response.message, "Health check");

    let meta = response.meta.expect("meta");
    assert_eq!(meta.total, None);

    let data = response.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.version, env!("CARGO_PKG_VERSION"));
}
