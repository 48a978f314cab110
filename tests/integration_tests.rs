use canvas_lms::dto::{CreateSharedBrandConfigDto, UpdateSharedBrandConfigDto};
use canvas_lms::resources::{Course, SharedBrandConfig};
use canvas_lms::{CanvasClient, CanvasError, Config, CredentialStore, RequestDescriptor};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn key_client(server: &MockServer) -> CanvasClient {
    CanvasClient::with_api_key(Config::new(server.base_url()), "key-123")
        .expect("failed to build client")
}

#[test]
fn test_missing_base_url_does_no_io() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.any_request();
        then.status(200).body("{}");
    });

    let client = CanvasClient::with_api_key(Config::default(), "key-123").unwrap();
    let result = client.execute(&RequestDescriptor::get("courses"));

    assert!(matches!(result, Err(CanvasError::MissingBaseUrl)));
    assert_eq!(catch_all.calls(), 0);
}

#[test]
fn test_missing_api_key_does_no_io() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.any_request();
        then.status(200).body("{}");
    });

    let store = Arc::new(CredentialStore::new());
    let client = CanvasClient::new(Config::new(server.base_url()), store).unwrap();
    let result = client.execute(&RequestDescriptor::get("courses"));

    assert!(matches!(result, Err(CanvasError::MissingApiKey)));
    assert_eq!(catch_all.calls(), 0);
}

#[test]
fn test_fetch_course_with_api_key() -> anyhow::Result<()> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses/101")
            .header("authorization", "Bearer key-123");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":101,"name":"Biology","course_code":"BIO-101"}"#);
    });

    let course = Course::fetch(&key_client(&server), 101)?;

    mock.assert();
    assert_eq!(course.id, 101);
    assert_eq!(course.name.as_deref(), Some("Biology"));
    Ok(())
}

#[test]
fn test_json_hijacking_prefix_is_stripped() -> anyhow::Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/users/self");
        then.status(200).body(r#"while(1);{"id":7,"name":"Ada"}"#);
    });

    let me: serde_json::Value = key_client(&server).get("users/self")?;
    assert_eq!(me["name"], "Ada");
    Ok(())
}

#[test]
fn test_field_errors_are_surfaced() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/accounts/1/shared_brand_configs");
        then.status(400).json_body(json!({
            "errors": {
                "name": [{
                    "attribute": "name",
                    "type": "taken",
                    "message": "name is already in use"
                }]
            }
        }));
    });

    let dto = CreateSharedBrandConfigDto::new("Theme A", "a1f113321fa024e7a14cb0948597a2a4");
    let err = SharedBrandConfig::create(&key_client(&server), 1, &dto).unwrap_err();

    assert_eq!(err.status_code(), Some(400));
    assert_eq!(err.errors().len(), 1);
    assert_eq!(err.errors()[0].attribute.as_deref(), Some("name"));
    assert_eq!(err.errors()[0].error_type.as_deref(), Some("taken"));
}

#[test]
fn test_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/courses/999");
        then.status(404).json_body(json!({
            "errors": [{"message": "The specified resource does not exist."}]
        }));
    });

    let err = Course::fetch(&key_client(&server), 999).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        err.to_string(),
        "Canvas API error: The specified resource does not exist."
    );
}

#[test]
fn test_unauthorized_api_key_is_not_refreshed() {
    let server = MockServer::start();
    let api = server.mock(|when, then| {
        when.method(GET).path("/api/v1/courses/1");
        then.status(401)
            .header("www-authenticate", "Bearer realm=\"canvas-lms\"")
            .json_body(json!({"errors": [{"message": "Invalid access token."}]}));
    });
    let token = server.mock(|when, then| {
        when.method(POST).path("/login/oauth2/token");
        then.status(200).json_body(json!({"access_token": "never"}));
    });

    let err = Course::fetch(&key_client(&server), 1).unwrap_err();

    assert!(matches!(err, CanvasError::Api { status: Some(401), .. }));
    assert_eq!(api.calls(), 1);
    assert_eq!(token.calls(), 0);
}

#[test]
fn test_transport_failure_is_api_error_without_status() {
    // nothing listens on port 1
    let config = Config::new("http://127.0.0.1:1");
    let client = CanvasClient::with_api_key(config, "key-123").unwrap();
    let err = client
        .execute(&RequestDescriptor::get("courses"))
        .unwrap_err();

    match err {
        CanvasError::Api { status, errors, .. } => {
            assert_eq!(status, None);
            assert!(errors.is_empty());
        }
        other => panic!("expected CanvasError::Api, got {:?}", other),
    }
}

#[test]
fn test_absolute_url_on_another_host_gets_no_credentials() {
    let server = MockServer::start();
    let foreign = MockServer::start();
    let foreign_hits = foreign.mock(|when, then| {
        when.any_request();
        then.status(200).json_body(json!({"id": 1}));
    });

    let client = key_client(&server);
    let err = client
        .execute(&RequestDescriptor::get(foreign.url("/api/v1/courses/1")))
        .unwrap_err();

    assert!(matches!(err, CanvasError::InvalidArgument(_)));
    assert_eq!(foreign_hits.calls(), 0);
}

#[test]
fn test_per_page_and_include_query() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/courses")
            .query_param("include[]", "term")
            .query_param("per_page", "50");
        then.status(200).json_body(json!([{"id": 1}]));
    });

    let config = Config::new(server.base_url()).with_per_page(50);
    let client = CanvasClient::with_api_key(config, "key-123").unwrap();
    let courses = Course::list(&client, &["term"])
        .unwrap()
        .collect_all()
        .unwrap();

    mock.assert();
    assert_eq!(courses.len(), 1);
}

#[test]
fn test_json_body_update() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/accounts/1/shared_brand_configs/8")
            .json_body(json!({"shared_brand_config": {"name": "Theme B"}}));
        then.status(200)
            .json_body(json!({"id": 8, "name": "Theme B", "brand_config_md5": "abc"}));
    });

    let dto = UpdateSharedBrandConfigDto {
        name: Some("Theme B".to_string()),
        brand_config_md5: None,
    };
    let updated = SharedBrandConfig::update(&key_client(&server), 1, 8, &dto).unwrap();

    mock.assert();
    assert_eq!(updated.name.as_deref(), Some("Theme B"));
}

#[test]
fn test_invalid_dto_sends_nothing() {
    let server = MockServer::start();
    let catch_all = server.mock(|when, then| {
        when.any_request();
        then.status(200).body("{}");
    });

    let dto = CreateSharedBrandConfigDto {
        name: Some("Theme A".to_string()),
        brand_config_md5: None,
    };
    let err = SharedBrandConfig::create(&key_client(&server), 1, &dto).unwrap_err();

    assert!(matches!(err, CanvasError::InvalidArgument(_)));
    assert_eq!(catch_all.calls(), 0);
}
