#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hubkit_api::{Credentials, Error, RestClient, TokenIssuer, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(credentials: Credentials) -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base_url, credentials);
    (server, client)
}

struct StaticIssuer;

#[async_trait]
impl TokenIssuer for StaticIssuer {
    async fn issue_token(
        &self,
        scope: &str,
        principal: Option<&str>,
    ) -> Result<SecretString, Error> {
        Ok(format!("token-for-{}-{scope}", principal.unwrap_or("anon")).into())
    }
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_basic_auth_header_is_sent() {
    let (server, client) = setup(Credentials::basic("jdoe", "1234".to_owned())).await;

    // base64("jdoe:1234")
    Mock::given(method("GET"))
        .and(path("/api/dataSets.json"))
        .and(header("authorization", "Basic amRvZToxMjM0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"dataSets": []})))
        .mount(&server)
        .await;

    let body = client
        .authorized(None)
        .await
        .unwrap()
        .get("api/dataSets.json")
        .await
        .unwrap();

    assert_eq!(body, json!({"dataSets": []}));
}

#[tokio::test]
async fn test_bearer_token_is_issued_per_principal() {
    let creds = Credentials::bearer(Arc::new(StaticIssuer), "app=remote");
    let (server, client) = setup(creds).await;

    Mock::given(method("GET"))
        .and(path("/api/projects.json"))
        .and(header(
            "authorization",
            "Bearer token-for-alice@example.org-app=remote",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let body = client
        .authorized(Some("alice@example.org"))
        .await
        .unwrap()
        .get("/api/projects.json")
        .await
        .unwrap();

    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = client.authorized(None).await.unwrap().get("api/x").await;

    match result {
        Err(Error::Authentication { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("bad credentials"));
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

// ── Status classification ───────────────────────────────────────────

#[tokio::test]
async fn test_not_found() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client
        .authorized(None)
        .await
        .unwrap()
        .get("api/missing")
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "expected not found, got: {err:?}");
}

#[tokio::test]
async fn test_server_error_keeps_status_and_body() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("POST"))
        .and(path("/api/sites.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client
        .authorized(None)
        .await
        .unwrap()
        .post("api/sites.json", &json!({"name": "x"}))
        .await
        .unwrap_err();

    match err {
        Error::Http { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_deserialization_error() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&server)
        .await;

    let err = client
        .authorized(None)
        .await
        .unwrap()
        .get("api/x")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Deserialization { .. }), "{err:?}");
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(100));
    let client = RestClient::new(
        Url::parse(&server.uri()).unwrap(),
        Credentials::Anonymous,
        &transport,
    )
    .unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .authorized(None)
        .await
        .unwrap()
        .get("api/slow")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout { .. }), "{err:?}");
    assert!(err.is_transient());
}

// ── Bodies ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_post_sends_json_and_accepts_empty_body() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("POST"))
        .and(path("/api/dataValueSets.json"))
        .and(body_json(json!({"dataSet": "495", "dataValues": []})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let body = client
        .authorized(None)
        .await
        .unwrap()
        .post(
            "api/dataValueSets.json",
            &json!({"dataSet": "495", "dataValues": []}),
        )
        .await
        .unwrap();

    assert_eq!(body, serde_json::Value::Null);
}

#[tokio::test]
async fn test_query_parameters_are_escaped() {
    let (server, client) = setup(Credentials::Anonymous).await;

    Mock::given(method("GET"))
        .and(path("/api/call"))
        .and(query_param("channel", "Channel 123"))
        .and(query_param("address", "123 456"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"call_id": 755_961, "state": "queued"})),
        )
        .mount(&server)
        .await;

    let body = client
        .authorized(None)
        .await
        .unwrap()
        .get_query(
            "api/call",
            &[
                ("channel", "Channel 123".to_owned()),
                ("address", "123 456".to_owned()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(body["state"], "queued");
}
