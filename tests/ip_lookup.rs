use std::time::Duration;
use studio_access_server::auth::ip_lookup::UNKNOWN_IP;
use studio_access_server::IpLookup;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_resolves_public_ip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ip": "203.0.113.7" })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = IpLookup::new(&format!("{}/ip", server.uri()), Duration::from_secs(2)).unwrap();
    assert_eq!(lookup.resolve().await, "203.0.113.7");
}

#[tokio::test]
async fn test_server_error_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let lookup = IpLookup::new(&server.uri(), Duration::from_secs(2)).unwrap();
    assert_eq!(lookup.resolve().await, UNKNOWN_IP);
}

#[tokio::test]
async fn test_malformed_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
        .mount(&server)
        .await;

    let lookup = IpLookup::new(&server.uri(), Duration::from_secs(2)).unwrap();
    assert_eq!(lookup.resolve().await, UNKNOWN_IP);
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "ip": "203.0.113.7" }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let lookup = IpLookup::new(&server.uri(), Duration::from_millis(200)).unwrap();
    let started = std::time::Instant::now();
    assert_eq!(lookup.resolve().await, UNKNOWN_IP);
    assert!(started.elapsed() < Duration::from_secs(4));
}
