use canvas_lms::{
    AuthMode, CanvasClient, CanvasError, Config, CredentialStore, OAuthClientConfig, OAuthToken,
    RequestDescriptor,
};
use chrono::{Duration, Utc};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const TOKEN_PATH: &str = "/login/oauth2/token";

fn oauth_client(server: &MockServer, token: OAuthToken) -> CanvasClient {
    let oauth = OAuthClientConfig::new("client-id", "client-secret")
        .with_token_url(server.url(TOKEN_PATH));
    let config = Config::new(server.base_url()).with_oauth_client(oauth);
    CanvasClient::with_oauth_token(config, token).expect("failed to build client")
}

fn expired(access: &str) -> OAuthToken {
    OAuthToken::new(access, "R1", Some(Utc::now() - Duration::minutes(5)))
}

fn valid(access: &str) -> OAuthToken {
    OAuthToken::new(access, "R1", Some(Utc::now() + Duration::hours(1)))
}

fn expired_token_response(then: httpmock::Then) {
    then.status(401)
        .header("www-authenticate", "Bearer realm=\"canvas-lms\"")
        .json_body(json!({"errors": [{"message": "Invalid access token."}]}));
}

#[test]
fn test_expired_token_is_refreshed_before_dispatch() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200).json_body(json!({
            "access_token": "A2",
            "token_type": "Bearer",
            "expires_in": 3600
        }));
    });
    let with_old = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A1");
        expired_token_response(then);
    });
    let with_new = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 42, "name": "Ada"}));
    });

    let client = oauth_client(&server, expired("A1"));
    let me: Value = client.get("users/self").unwrap();

    assert_eq!(me["id"], 42);
    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(with_old.calls(), 0);
    assert_eq!(with_new.calls(), 1);

    let stored = client.credentials().oauth_token().unwrap();
    assert_eq!(stored.access_token, "A2");
    assert_eq!(stored.refresh_token, "R1");
    assert!(!stored.is_expired());
}

#[test]
fn test_rejected_token_is_refreshed_and_retried() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200)
            .json_body(json!({"access_token": "A2", "expires_in": 3600}));
    });
    let with_old = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses/1")
            .header("authorization", "Bearer A1");
        expired_token_response(then);
    });
    let with_new = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses/1")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 1}));
    });

    let client = oauth_client(&server, valid("A1"));
    let course: Value = client.get("courses/1").unwrap();

    assert_eq!(course["id"], 1);
    assert_eq!(with_old.calls(), 1);
    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(with_new.calls(), 1);
}

#[test]
fn test_retry_happens_at_most_once() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200)
            .json_body(json!({"access_token": "A2", "expires_in": 3600}));
    });
    let with_old = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses/1")
            .header("authorization", "Bearer A1");
        expired_token_response(then);
    });
    let with_new = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses/1")
            .header("authorization", "Bearer A2");
        expired_token_response(then);
    });

    let client = oauth_client(&server, valid("A1"));
    let err = client.get::<Value>("courses/1").unwrap_err();

    assert!(matches!(err, CanvasError::OAuthTokenExpired));
    assert_eq!(with_old.calls(), 1);
    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(with_new.calls(), 1);
}

#[test]
fn test_failed_refresh_leaves_store_untouched() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(400).json_body(json!({
            "error": "invalid_grant",
            "error_description": "refresh token expired"
        }));
    });
    let api = server.mock(|when, then| {
        when.method(GET).path("/api/v1/users/self");
        then.status(200).json_body(json!({"id": 42}));
    });

    let client = oauth_client(&server, expired("A1"));
    let err = client.get::<Value>("users/self").unwrap_err();

    match err {
        CanvasError::OAuthRefreshFailed { status, message } => {
            assert_eq!(status, Some(400));
            assert_eq!(message, "refresh token expired");
        }
        other => panic!("expected OAuthRefreshFailed, got {:?}", other),
    }
    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(api.calls(), 0);
    assert_eq!(client.credentials().oauth_token().unwrap().access_token, "A1");
}

#[test]
fn test_rotated_refresh_token_is_stored() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200).json_body(json!({
            "access_token": "A2",
            "refresh_token": "R2",
            "expires_in": 3600
        }));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 42}));
    });

    let client = oauth_client(&server, expired("A1"));
    let _: Value = client.get("users/self").unwrap();

    let stored = client.credentials().oauth_token().unwrap();
    assert_eq!(stored.access_token, "A2");
    assert_eq!(stored.refresh_token, "R2");
}

#[test]
fn test_concurrent_requests_refresh_once() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200)
            .delay(std::time::Duration::from_millis(200))
            .json_body(json!({"access_token": "A2", "expires_in": 3600}));
    });
    let with_new = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 42}));
    });

    let client = oauth_client(&server, expired("A1"));
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let client = client.clone();
                scope.spawn(move || client.get::<Value>("users/self"))
            })
            .collect();
        for handle in handles {
            let me = handle.join().expect("request thread panicked").unwrap();
            assert_eq!(me["id"], 42);
        }
    });

    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(with_new.calls(), 4);
}

#[test]
fn test_refreshed_token_is_discarded_when_credential_changes() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200)
            .delay(std::time::Duration::from_millis(500))
            .json_body(json!({"access_token": "A2", "expires_in": 3600}));
    });
    let with_refreshed = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 42}));
    });
    let with_replacement = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer B1");
        then.status(200).json_body(json!({"id": 7}));
    });

    let client = oauth_client(&server, expired("A1"));
    std::thread::scope(|scope| {
        let request = scope.spawn(|| client.get::<Value>("users/self"));

        // swap the credential while the token endpoint is still answering
        std::thread::sleep(std::time::Duration::from_millis(150));
        client.credentials().set_oauth_token(valid("B1"));

        let me = request.join().expect("request thread panicked").unwrap();
        assert_eq!(me["id"], 7);
    });

    assert_eq!(token_endpoint.calls(), 1);
    assert_eq!(with_refreshed.calls(), 0);
    assert_eq!(with_replacement.calls(), 1);
    assert_eq!(client.credentials().oauth_token().unwrap().access_token, "B1");
}

#[test]
fn test_oauth_mode_without_token() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.any_request();
        then.status(200).body("{}");
    });

    let store = CredentialStore::with_api_key("key-123");
    store.set_auth_mode(AuthMode::OAuth);
    let client = CanvasClient::new(Config::new(server.base_url()), Arc::new(store)).unwrap();

    let err = client
        .execute(&RequestDescriptor::get("users/self"))
        .unwrap_err();
    assert!(matches!(err, CanvasError::MissingOAuthToken));
    assert_eq!(catch_all.calls(), 0);
}

#[test]
fn test_default_token_endpoint_below_base_url() {
    let server = MockServer::start();
    let token_endpoint = server.mock(|when, then| {
        when.method(POST).path(TOKEN_PATH);
        then.status(200).json_body(json!({"access_token": "A2"}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/users/self")
            .header("authorization", "Bearer A2");
        then.status(200).json_body(json!({"id": 42}));
    });

    let oauth = OAuthClientConfig::new("client-id", "client-secret");
    let config = Config::new(server.base_url()).with_oauth_client(oauth);
    let client = CanvasClient::with_oauth_token(config, expired("A1")).unwrap();
    let _: Value = client.get("users/self").unwrap();

    assert_eq!(token_endpoint.calls(), 1);
    // no expires_in means the new token never expires
    assert_eq!(client.credentials().oauth_token().unwrap().expires_at, None);
}
