//! Session build, injection and teardown against a mock server.

mod common;

use common::*;
use integrations_zscaler::{
    SandboxClient, ServiceClient, SessionStatus, ZdxClient, ZiaClient, ZpaClient, ZscalerErrorKind,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use wiremock::matchers::{
    body_bytes, body_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_oauth_login_injects_bearer() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/signin"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("client_id=X"))
        .and(body_string_contains("client_secret=Y"))
        .respond_with(success_response(
            json!({"access_token": "Z", "token_type": "Bearer", "expires_in": 3600}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!(
            "/mgmtconfig/v1/admin/customers/{}/segmentGroup/7",
            CUSTOMER_ID
        )))
        .and(header("authorization", "Bearer Z"))
        .respond_with(success_response(json!({
            "id": "7",
            "name": "Engineering",
            "applications": [{"id": "1", "domainNames": ["a.example.com"]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let zpa = ZpaClient::new(zpa_config(&server)).unwrap();
    let group = zpa.segment_groups().get("7").await.unwrap();

    assert_eq!(group.str("name"), Some("Engineering"));
    assert_eq!(group.path("applications.0.domain_names.0"), "a.example.com");
}

#[tokio::test]
async fn test_hashed_key_login_body() {
    let server = setup_mock_server().await;
    mount_zdx_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .and(header("authorization", "Bearer T"))
        .respond_with(success_response(json!({"id": "u1", "email": "a@example.com"})))
        .mount(&server)
        .await;

    let zdx = ZdxClient::new(zdx_config(&server)).unwrap();
    let user = zdx.users().get("u1").await.unwrap();
    assert_eq!(user.str("email"), Some("a@example.com"));

    let requests = server.received_requests().await.unwrap();
    let login = requests
        .iter()
        .find(|r| r.url.path() == "/oauth/token")
        .expect("login request");
    let body: Value = serde_json::from_slice(&login.body).unwrap();

    let timestamp = body["timestamp"].as_i64().unwrap();
    let expected = hex::encode(Sha256::digest(format!("S:{}", timestamp).as_bytes()));
    assert_eq!(body["key_id"], "K");
    assert_eq!(body["key_secret"], expected.as_str());
}

#[tokio::test]
async fn test_session_token_uses_auth_token_header() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/login"))
        .and(body_json(json!({"apiKey": "id", "secretKey": "secret"})))
        .respond_with(success_response(json!({"jwtToken": "J"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public/v1/getDevices"))
        .and(header("auth-token", "J"))
        .respond_with(success_response(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServiceClient::new(zcc_config(&server)).unwrap();
    let devices = client.get("/public/v1/getDevices").await.unwrap();
    assert!(devices.items().is_empty());
}

#[tokio::test]
async fn test_legacy_login_replays_cookie_and_signs_out() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/authenticatedSession"))
        .and(body_string_contains("\"username\":\"admin@example.com\""))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=abc123; Path=/; Secure; HttpOnly")
                .set_body_json(json!({"authType": "ADMIN_LOGIN", "passwordExpiryTime": 0})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(header("cookie", "JSESSIONID=abc123"))
        .respond_with(success_response(json!({"id": 1, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/authenticatedSession"))
        .and(header("cookie", "JSESSIONID=abc123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let zia = ZiaClient::new(zia_config(&server)).unwrap();
    let user = zia.users().get(1).await.unwrap();
    assert_eq!(user.str("name"), Some("Ada"));

    let requests = server.received_requests().await.unwrap();
    let login: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let api_key = login["apiKey"].as_str().unwrap();
    assert_eq!(api_key.chars().count(), 12);
    assert!(api_key.chars().all(|c| "abcdef123456".contains(c)));
    assert!(login["timestamp"].as_u64().unwrap() > 1_600_000_000_000);

    zia.teardown().await.unwrap();
    zia.teardown().await.unwrap();
    assert!(zia.session_state().await.is_none());
}

#[tokio::test]
async fn test_login_failure_is_authentication_error_without_retry() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/login"))
        .respond_with(error_response(401, json!({"message": "invalid credentials"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ServiceClient::new(zcc_config(&server)).unwrap();
    let err = client.get("/public/v1/getDevices").await.unwrap_err();

    assert_eq!(err.kind(), ZscalerErrorKind::Authentication);
    assert_eq!(err.status_code(), Some(401));
    assert!(err.body().unwrap().contains("invalid credentials"));
    assert!(client.session_state().await.is_none());
}

#[tokio::test]
async fn test_login_missing_token_is_authentication_error() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/login"))
        .respond_with(success_response(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let client = ServiceClient::new(zcc_config(&server)).unwrap();
    let err = client.build_session().await.unwrap_err();
    assert_eq!(err.kind(), ZscalerErrorKind::Authentication);
    assert!(err.message().contains("jwt_token"));
}

#[tokio::test]
async fn test_teardown_forces_reauthentication() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/login"))
        .respond_with(success_response(json!({"jwtToken": "J"})))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(success_response(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let client = ServiceClient::new(zcc_config(&server)).unwrap();
    client.get("/ping").await.unwrap();
    client.teardown().await.unwrap();
    client.get("/ping").await.unwrap();
}

#[tokio::test]
async fn test_near_expiry_token_is_rebuilt() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(success_response(json!({"token": "T", "expires_in": 10})))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/devices/d1"))
        .respond_with(success_response(json!({"id": "d1"})))
        .expect(2)
        .mount(&server)
        .await;

    let zdx = ZdxClient::new(zdx_config(&server)).unwrap();
    zdx.devices().get("d1").await.unwrap();
    zdx.devices().get("d1").await.unwrap();
}

#[tokio::test]
async fn test_zdx_refresh_validates_before_rebuilding() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(success_response(json!({"token": "T", "expires_in": 3600})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth/validate"))
        .and(header("authorization", "Bearer T"))
        .respond_with(success_response(json!({"valid": true})))
        .expect(1)
        .mount(&server)
        .await;

    let zdx = ZdxClient::new(zdx_config(&server)).unwrap();
    zdx.build_session().await.unwrap();
    zdx.refresh_session().await.unwrap();
}

#[tokio::test]
async fn test_session_status() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/authenticatedSession"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=s1; Path=/")
                .set_body_json(json!({"authType": "ADMIN_LOGIN"})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/authenticatedSession"))
        .respond_with(success_response(json!({
            "authType": "ADMIN_LOGIN",
            "obfuscateApiKey": false
        })))
        .mount(&server)
        .await;

    let zia = ZiaClient::new(zia_config(&server)).unwrap();
    assert_eq!(zia.session_status().await.unwrap(), SessionStatus::Inactive);

    zia.build_session().await.unwrap();
    match zia.session_status().await.unwrap() {
        SessionStatus::Active(record) => {
            assert_eq!(record.str("auth_type"), Some("ADMIN_LOGIN"));
            assert_eq!(record.bool("obfuscate_api_key"), Some(false));
        }
        other => panic!("unexpected status: {:?}", other),
    }

    let zcc = ServiceClient::new(zcc_config(&server)).unwrap();
    assert_eq!(zcc.session_status().await.unwrap(), SessionStatus::Unknown);
}

#[tokio::test]
async fn test_with_session_tears_down_on_failure() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/authenticatedSession"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=w1; Path=/")
                .set_body_json(json!({})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/9"))
        .respond_with(error_response(404, json!({"code": "RESOURCE_NOT_FOUND"})))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/authenticatedSession"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let zia = ZiaClient::new(zia_config(&server)).unwrap();
    let err = zia
        .with_session(|client| async move { client.get("/users/9").await })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ZscalerErrorKind::Server);
    assert_eq!(err.status_code(), Some(404));
    assert!(zia.session_state().await.is_none());
}

#[tokio::test]
async fn test_with_session_keeps_result_when_session_already_expired() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/authenticatedSession"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=x1; Path=/")
                .set_body_json(json!({})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(success_response(json!({"id": 1, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/authenticatedSession"))
        .respond_with(error_response(401, json!({"code": "NOT_AUTHENTICATED"})))
        .expect(1)
        .mount(&server)
        .await;

    let zia = ZiaClient::new(zia_config(&server)).unwrap();
    let user = zia
        .with_session(|client| async move { client.get("/users/1").await })
        .await
        .unwrap();

    assert_eq!(user.str("name"), Some("Ada"));
    assert!(zia.session_state().await.is_none());
}

#[tokio::test]
async fn test_teardown_reports_unexpected_logout_failure() {
    let server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path("/authenticatedSession"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "JSESSIONID=x2; Path=/")
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/authenticatedSession"))
        .respond_with(error_response(400, json!({"code": "BAD_REQUEST"})))
        .expect(1)
        .mount(&server)
        .await;

    let zia = ZiaClient::new(zia_config(&server)).unwrap();
    zia.build_session().await.unwrap();

    let err = zia.teardown().await.unwrap_err();
    assert_eq!(err.status_code(), Some(400));
    assert!(zia.session_state().await.is_none());
    zia.teardown().await.unwrap();
}

#[tokio::test]
async fn test_sandbox_token_travels_as_query_parameter() {
    let server = setup_mock_server().await;
    let payload = b"MZ\x90\x00fake-binary".to_vec();

    Mock::given(method("POST"))
        .and(path("/zscsb/submit"))
        .and(query_param("api_token", "sbx"))
        .and(query_param("force", "1"))
        .and(header("content-type", "application/octet-stream"))
        .and(body_bytes(payload.clone()))
        .respond_with(success_response(json!({
            "code": 200,
            "message": "/submit response OK",
            "fileType": "exe",
            "md5": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = common::builder(integrations_zscaler::Service::Sandbox, &server)
        .sandbox_token("sbx")
        .override_url(format!("{}/zscsb/submit", server.uri()))
        .build_with_env(|_| None)
        .unwrap();
    let sandbox = SandboxClient::new(config).unwrap();

    let report = sandbox.submit_file(payload, true).await.unwrap();
    assert_eq!(report.str("file_type"), Some("exe"));
}

#[tokio::test]
async fn test_wrong_family_config_is_rejected() {
    let server = setup_mock_server().await;
    let err = ZiaClient::new(zcc_config(&server)).unwrap_err();
    assert_eq!(err.kind(), ZscalerErrorKind::Configuration);
}
