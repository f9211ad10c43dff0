use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use auth_cell::router::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app(config: &TestConfig) -> Router {
    auth_routes(config.to_arc())
}

fn session_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/session");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn doctor_session_points_to_doctor_dashboard() {
    let config = TestConfig::default();
    let user = TestUser::doctor("asha@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let response = app(&config).oneshot(session_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], user.id);
    assert_eq!(body["role"], "doctor");
    assert_eq!(body["dashboard"], "/doctor-dashboard");
}

#[tokio::test]
async fn hosted_token_role_comes_from_app_metadata() {
    let config = TestConfig::default();
    let user = TestUser::receptionist("front@clinic.test");
    let token = JwtTestUtils::create_hosted_auth_token(&user, &config.jwt_secret);

    let response = app(&config).oneshot(session_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "receptionist");
    assert_eq!(body["dashboard"], "/receptionist-dashboard");
}

#[tokio::test]
async fn missing_token_is_401() {
    let config = TestConfig::default();

    let response = app(&config).oneshot(session_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Missing authorization header");
}

#[tokio::test]
async fn expired_and_forged_tokens_are_401() {
    let config = TestConfig::default();
    let user = TestUser::doctor("asha@clinic.test");

    for token in [
        JwtTestUtils::create_expired_token(&user, &config.jwt_secret),
        JwtTestUtils::create_invalid_signature_token(&user),
        JwtTestUtils::create_malformed_token(),
    ] {
        let response = app(&config).oneshot(session_request(Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn account_without_clinic_role_is_403() {
    let config = TestConfig::default();
    let user = TestUser::new("visitor@example.com", "authenticated");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let response = app(&config).oneshot(session_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
