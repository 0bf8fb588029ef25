//! End-to-end tests of the client facade over real HTTP (wiremock)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use vkrelay_domain::{params, ClientConfig, VkRelayError};
use vkrelay_infra::VkClient;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.api.base_url = server.uri();
    config.rate_limit.enabled = false;
    config.long_poll.use_https = false;
    config
}

#[tokio::test]
async fn test_expired_token_is_renewed_through_code_flow() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    Mock::given(method("POST"))
        .and(path("/method/users.get"))
        .respond_with(move |req: &Request| -> ResponseTemplate {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let body = String::from_utf8_lossy(&req.body).to_string();
            if body.contains("access_token=fresh") {
                ResponseTemplate::new(200).set_body_json(json!({"response": [{"id": 1}]}))
            } else {
                ResponseTemplate::new(200).set_body_json(json!({
                    "error": {"error_code": 5, "error_msg": "User authorization failed", "request_params": []}
                }))
            }
        })
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/access_token"))
        .and(query_param("code", "one-time-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = VkClient::builder(config)
        .credential("stale")
        .reauthenticator(Arc::new(
            vkrelay_infra::AuthorizationCodeFlow::new(
                Arc::new(vkrelay_infra::HttpTransport::new().expect("transport")),
                "6000",
                "secret",
                "https://example.test/cb",
                "one-time-code",
            )
            .with_token_url(format!("{}/access_token", server.uri())),
        ))
        .build()
        .expect("client");

    let users = client.api().call("users.get", params! {"user_ids" => 1}).await.expect("users");
    assert_eq!(users, json!([{"id": 1}]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(client.session().credential().map(|c| c.expose().to_string()), Some("fresh".into()));

    client.close().await;
}

#[tokio::test]
async fn test_captcha_surfaces_without_solver() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/wall.post"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {
                "error_code": 14,
                "error_msg": "Captcha needed",
                "captcha_sid": "548",
                "captcha_img": "https://example.test/captcha.php?sid=548"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = VkClient::builder(config_for(&server)).credential("token").build().expect("client");

    match client.api().call("wall.post", params! {"message" => "hi"}).await {
        Err(VkRelayError::ChallengeRequired { challenge_id, challenge_url }) => {
            assert_eq!(challenge_id, "548");
            assert!(challenge_url.ends_with("sid=548"));
        }
        other => panic!("expected challenge, got {other:?}"),
    }
}

#[tokio::test]
async fn test_user_long_poll_streams_updates() {
    let server = MockServer::start().await;
    let host = server.uri().trim_start_matches("http://").to_string();

    Mock::given(method("POST"))
        .and(path("/method/messages.getLongPollServer"))
        .and(body_string_contains("lp_version=3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"server": format!("{host}/im1774"), "key": "k1", "ts": 100}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/im1774"))
        .and(query_param("ts", "100"))
        .and(query_param("key", "k1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ts": 101, "updates": [[4, 1], [4, 2]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/im1774"))
        .and(query_param("ts", "101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failed": 4})))
        .expect(1)
        .mount(&server)
        .await;

    let client = VkClient::builder(config_for(&server)).credential("token").build().expect("client");
    let events: Vec<_> = client.user_long_poll().events().collect().await;

    assert_eq!(events.len(), 3);
    assert_eq!(events[0].as_ref().expect("first"), &json!([4, 1]));
    assert_eq!(events[1].as_ref().expect("second"), &json!([4, 2]));
    assert!(matches!(events[2], Err(VkRelayError::LongPoll { code: 4, .. })));
}

#[tokio::test]
async fn test_execute_pool_batches_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/method/execute"))
        .and(body_string_contains("access_token=token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [[{"id": 1}], false],
            "execute_errors": [{"method": "users.get", "error_code": 113, "error_msg": "Invalid user id"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = VkClient::builder(config_for(&server)).build().expect("client");
    let mut pool = client.execute_pool();
    let ok = pool.register("users.get", "token", params! {"user_ids" => 1});
    let bad = pool.register("users.get", "token", params! {"user_ids" => -1});

    assert_eq!(pool.finish().await, 1);
    assert_eq!(ok.wait().await.expect("ok"), json!([{"id": 1}]));
    let err = bad.wait().await.unwrap_err();
    assert_eq!(err.code, 113);
}

#[tokio::test]
async fn test_rate_limited_client_paces_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": 1})))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_period = 2;
    config.rate_limit.period_ms = 300;
    let client = VkClient::builder(config).credential("token").build().expect("client");

    let started = tokio::time::Instant::now();
    for _ in 0..3 {
        client.api().call("utils.getServerTime", params! {}).await.expect("call");
    }
    assert!(started.elapsed() >= Duration::from_millis(250));

    client.close().await;
}
