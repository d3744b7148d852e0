#![allow(clippy::unwrap_used)]
// Integration tests for `PortalClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use telenet_api::{Environment, Error, Fetch, PortalClient};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PortalClient) {
    let server = MockServer::start().await;
    let environment = Environment::new(
        &format!("{}/ocapi", server.uri()),
        &format!("{}/openid", server.uri()),
    )
    .unwrap();
    let password: SecretString = "test-password".to_string().into();
    let client = PortalClient::new("jan@example.com", password, "nl", environment).unwrap();
    (server, client)
}

fn user_body() -> serde_json::Value {
    json!({
        "customer_number": "12345678",
        "first_name": "Jan",
        "last_name": "Peeters",
        "identity_id": "id-001"
    })
}

/// Mount the identity-provider half of a successful handshake: the
/// authorize redirect onto the login page and the credential POST.
async fn mount_identity_provider(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/openid/oauth/authorize"))
        .and(query_param("client_id", "ocapi"))
        .and(query_param("prompt", "login"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/openid/login/page"),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openid/login/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login page"))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/openid/login.do"))
        .and(body_string_contains("j_username"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(server)
        .await;
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_handshake() {
    let (server, mut client) = setup().await;

    // First probe has no session: 401 carrying the state/nonce pair.
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(401).set_body_string("state123,nonce456"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_identity_provider(&server).await;
    // Post-login fetch proves the session.
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .mount(&server)
        .await;

    let user = client.login().await.unwrap();

    assert_eq!(user.customer_number.as_deref(), Some("12345678"));
    assert_eq!(user.first_name.as_deref(), Some("Jan"));
    assert_eq!(
        client.user().and_then(|u| u.customer_number.as_deref()),
        Some("12345678")
    );
}

#[tokio::test]
async fn test_login_short_circuits_on_valid_session() {
    let (server, mut client) = setup().await;

    // A 200 on the probe means the cookie is still good; the identity
    // provider must never be contacted.
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(1)
        .mount(&server)
        .await;

    let user = client.login().await.unwrap();

    assert_eq!(user.customer_number.as_deref(), Some("12345678"));
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(401).set_body_string("state123,nonce456"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openid/oauth/authorize"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/openid/login/page"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openid/login/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("login page"))
        .mount(&server)
        .await;
    // Rejection is signalled through the final URL, not the status.
    Mock::given(method("POST"))
        .and(path("/openid/login.do"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/openid/authentication_error"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/openid/authentication_error"))
        .respond_with(ResponseTemplate::new(200).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = client.login().await;

    assert!(
        matches!(result, Err(Error::BadCredentials { .. })),
        "expected BadCredentials, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_missing_customer_number_is_bad_credentials() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(401).set_body_string("state123,nonce456"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_identity_provider(&server).await;
    // Degraded 200: nominally logged in, but no customer number.
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "first_name": "Jan" })))
        .mount(&server)
        .await;

    let result = client.login().await;

    assert!(
        matches!(result, Err(Error::BadCredentials { .. })),
        "expected BadCredentials, got: {result:?}"
    );
}

// ── Dispatcher tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_dataset_is_a_soft_failure() {
    let (server, mut client) = setup().await;

    let error_body = json!({ "code": "NOT-FOUND", "cause": "no such product" });
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(ResponseTemplate::new(404).set_body_json(&error_body))
        .mount(&server)
        .await;

    let result = client.active_products().await.unwrap();

    assert!(result.is_unavailable());
    assert_eq!(client.last_error(), Some(&error_body));
}

#[tokio::test]
async fn test_forbidden_with_error_code_is_a_soft_failure() {
    let (server, mut client) = setup().await;

    let error_body = json!({ "code": "OCAPI-ERR-123", "cause": "not entitled" });
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(ResponseTemplate::new(403).set_body_json(&error_body))
        .mount(&server)
        .await;

    let result = client.active_products().await.unwrap();

    assert!(result.is_unavailable());
    assert_eq!(client.last_error(), Some(&error_body));
}

#[tokio::test]
async fn test_stale_session_relogins_and_retries() {
    let (server, mut client) = setup().await;

    // First attempt hits the benign forbidden code, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "code": "OCAPI-ERR-667" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .and(query_param("status", "ACTIVE"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([ { "identifier": "123", "productType": "bundle" } ])),
        )
        .mount(&server)
        .await;
    // The re-login probe finds a fresh session right away.
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .mount(&server)
        .await;

    let products = client.active_products().await.unwrap().data().unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["identifier"], json!("123"));
}

#[tokio::test]
async fn test_forbidden_without_a_body_relogins_and_retries() {
    let (server, mut client) = setup().await;

    // A gateway-level 403 carries no JSON error code; it counts as a
    // stale session, not a soft failure.
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access Denied"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .and(query_param("status", "ACTIVE"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([ { "identifier": "123", "productType": "bundle" } ])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ocapi/oauth/userdetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .mount(&server)
        .await;

    let products = client.active_products().await.unwrap().data().unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["identifier"], json!("123"));
}

#[tokio::test]
async fn test_unexpected_status_fails_fast() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.active_products().await;

    assert!(
        matches!(result, Err(Error::Service { .. })),
        "expected Service error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_xsrf_token_is_mirrored_into_the_header() {
    let (server, mut client) = setup().await;

    // First response rotates the token via a cookie.
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "TOKEN-XSRF=tok123; Path=/")
                .set_body_json(json!([])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // The follow-up only matches when the token came back as a header.
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/product-service/v1/products"))
        .and(header("X-TOKEN-XSRF", "tok123"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([ { "identifier": "42", "productType": "internet" } ])),
        )
        .mount(&server)
        .await;

    let first = client.active_products().await.unwrap().data().unwrap();
    assert!(first.is_empty());

    let second = client.active_products().await.unwrap().data().unwrap();
    assert_eq!(second[0]["identifier"], json!("42"));
}

// ── Billing tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_bill_cycles_window_spans_the_newest_cycle() {
    let (server, mut client) = setup().await;

    let body = json!({
        "billCycles": [
            { "billCycle": "CURRENT", "startDate": "2024-03-01", "endDate": "2024-03-31" },
            { "billCycle": "2024-02", "startDate": "2024-02-01", "endDate": "2024-02-29" },
        ]
    });
    Mock::given(method("GET"))
        .and(path(
            "/ocapi/public/api/billing-service/v1/account/products/123/billcycle-details",
        ))
        .and(query_param("producttype", "internet"))
        .and(query_param("count", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let window = client
        .bill_cycles("internet", "123", 2)
        .await
        .unwrap()
        .data()
        .unwrap();

    assert_eq!(window.start_date, "2024-03-01");
    assert_eq!(window.end_date, "2024-03-31");
    assert_eq!(window.cycles.len(), 2);
    assert_eq!(window.cycles[1].bill_cycle.as_deref(), Some("2024-02"));
}

#[tokio::test]
async fn test_bill_cycles_without_cycles_is_unavailable() {
    let (server, mut client) = setup().await;

    Mock::given(method("GET"))
        .and(path(
            "/ocapi/public/api/billing-service/v1/account/products/123/billcycle-details",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "billCycles": [] })))
        .mount(&server)
        .await;

    let result = client.bill_cycles("dtv", "123", 1).await.unwrap();

    assert!(result.is_unavailable());
}

// ── Contact tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_addresses_are_memoized_per_session() {
    let (server, mut client) = setup().await;

    let address = json!({ "street": "Liersesteenweg", "number": "4" });
    Mock::given(method("GET"))
        .and(path("/ocapi/public/api/contact-service/v1/contact/addresses/addr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&address))
        .expect(1)
        .mount(&server)
        .await;

    let first = client.address(Some("addr-1")).await.unwrap();
    let second = client.address(Some("addr-1")).await.unwrap();

    assert_eq!(first, Fetch::Data(address.clone()));
    assert_eq!(second, Fetch::Data(address));

    // No id at all: an empty record, no network call.
    let empty = client.address(None).await.unwrap().data().unwrap();
    assert_eq!(empty, json!({}));
}
