use assert_matches::assert_matches;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::{patient_routes, Gender, PatientError, PatientService, UpsertPatient};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn staff_request(uri: &str, config: &TestConfig) -> Request<Body> {
    let user = TestUser::receptionist("front@clinic.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upsert_merges_on_email() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(query_param("on_conflict", "email"))
        .and(header_eq("Prefer", "resolution=merge-duplicates,return=representation"))
        .and(body_partial_json(json!({ "email": "meera@example.com", "gender": "female" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "meera@example.com", "Meera")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    let patient = PatientService::new(&config)
        .upsert_by_email(
            &UpsertPatient {
                name: "Meera".into(),
                email: "meera@example.com".into(),
                phone: "9123456780".into(),
                dob: NaiveDate::from_ymd_opt(1990, 5, 14).unwrap(),
                gender: Gender::Female,
                blood_group: None,
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(patient.id.to_string(), patient_id);
}

#[tokio::test]
async fn missing_patient_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    let result = PatientService::new(&config).get_patient(Uuid::new_v4(), "token").await;

    assert_matches!(result, Err(PatientError::NotFound));
}

#[tokio::test]
async fn reads_structured_medical_history() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let mut row = MockSupabaseResponses::patient_response(&patient_id.to_string(), "meera@example.com", "Meera");
    row["medical_history"] = json!({ "allergies": ["penicillin"], "conditions": [] });

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri()).to_app_config();
    let patient = PatientService::new(&config).get_patient(patient_id, "token").await.unwrap();

    let history = patient.medical_history.unwrap();
    assert_eq!(history["allergies"][0], "penicillin");
}

#[tokio::test]
async fn search_sends_or_filter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param(
            "or",
            "(name.ilike.*meera*,phone.ilike.*meera*,email.ilike.*meera*)",
        ))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&Uuid::new_v4().to_string(), "meera@example.com", "Meera")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri());
    let response = patient_routes(config.to_arc())
        .oneshot(staff_request("/?search=meera", &config))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["patients"][0]["name"], "Meera");
}

#[tokio::test]
async fn detail_includes_history_with_doctor_name() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "meera@example.com", "Meera")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(query_param("order", "date.desc,time.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "confirmation_id": "HCAB12CD",
            "date": "2026-10-20",
            "time": "10:00",
            "type": "General Check-up",
            "status": "completed",
            "notes": null,
            "doctor": { "name": "Dr. Asha Rao" }
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_supabase_url(server.uri());
    let response = patient_routes(config.to_arc())
        .oneshot(staff_request(&format!("/{}", patient_id), &config))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Meera");
    assert_eq!(body["appointments"][0]["doctor"]["name"], "Dr. Asha Rao");
}

#[tokio::test]
async fn patients_require_staff_role() {
    let server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(server.uri());
    let user = TestUser::new("someone@example.com", "authenticated");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .uri("/")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = patient_routes(config.to_arc()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
