use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

struct Clinic {
    server: MockServer,
    config: TestConfig,
    doctor_id: String,
    patient_id: String,
}

impl Clinic {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let config = TestConfig::with_supabase_url(server.uri());
        Self {
            server,
            config,
            doctor_id: Uuid::new_v4().to_string(),
            patient_id: Uuid::new_v4().to_string(),
        }
    }

    fn app(&self) -> Router {
        appointment_routes(self.config.to_arc())
    }

    fn staff_token(&self) -> String {
        let user = TestUser::receptionist("front@clinic.test");
        JwtTestUtils::create_test_token(&user, &self.config.jwt_secret, Some(1))
    }

    /// Primary doctor with the default weekly schedule and the given times booked.
    async fn mount_doctor(&self, date: NaiveDate, booked: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/doctors"))
            .and(query_param("order", "created_at.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::doctor_response(&self.doctor_id)
            ])))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/doctor_schedules"))
            .and(query_param("doctor_id", format!("eq.{}", self.doctor_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockSupabaseResponses::schedule_response(&self.doctor_id)
            ])))
            .mount(&self.server)
            .await;

        let rows: Vec<Value> = booked.iter().map(|t| json!({ "time": t })).collect();
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("doctor_id", format!("eq.{}", self.doctor_id)))
            .and(query_param("date", format!("eq.{}", date)))
            .and(query_param("status", "neq.cancelled"))
            .and(query_param("select", "time"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(rows)))
            .mount(&self.server)
            .await;
    }

    async fn mount_patient_upsert(&self) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/patients"))
            .and(query_param("on_conflict", "email"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                MockSupabaseResponses::patient_response(&self.patient_id, "meera@example.com", "Meera Nair")
            ])))
            .mount(&self.server)
            .await;
    }
}

fn next(weekday: Weekday) -> NaiveDate {
    let mut date = Utc::now().date_naive() + Duration::days(1);
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    date
}

fn booking_form(date: NaiveDate, time: &str) -> Value {
    json!({
        "name": "Meera Nair",
        "phone": "9123456780",
        "email": "meera@example.com",
        "dob": "1990-05-14",
        "gender": "female",
        "blood_group": "O+",
        "service": "General Check-up",
        "date": date,
        "time": time,
        "utr_number": "123456789012"
    })
}

fn post_json(uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn public_booking_creates_pending_appointment() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Tue);
    clinic.mount_doctor(date, &["09:00"]).await;
    clinic.mount_patient_upsert().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "patient_id": clinic.patient_id,
            "doctor_id": clinic.doctor_id,
            "time": "10:30",
            "type": "General Check-up",
            "status": "pending",
            "payment_status": false,
            "payment_details": { "method": "upi", "utr_number": "123456789012" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &clinic.patient_id,
                &clinic.doctor_id,
                &date.to_string(),
                "10:30",
                "pending",
            )
        ])))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "10:30 AM"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["confirmation_id"], "HCAB12CD");
    assert_eq!(body["doctor_name"], "Dr. Asha Rao");
    assert_eq!(body["appointment"]["status"], "pending");
}

#[tokio::test]
async fn booked_slot_is_rejected_before_insert() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Tue);
    clinic.mount_doctor(date, &["10:30:00"]).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "10:30"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "The selected time slot is not available");
}

#[tokio::test]
async fn lost_race_maps_unique_violation_to_conflict() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Wed);
    clinic.mount_doctor(date, &[]).await;
    clinic.mount_patient_upsert().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "duplicate key value violates unique constraint \"appointments_active_slot_idx\"",
            "23505",
        )))
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "11:00"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "This time slot has already been booked. Please choose another time"
    );
}

fn confirmation_collision() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
        "duplicate key value violates unique constraint \"appointments_confirmation_id_key\"",
        "23505",
    ))
}

async fn appointment_inserts(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/rest/v1/appointments")
        .count()
}

#[tokio::test]
async fn confirmation_id_collision_is_retried() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Thu);
    clinic.mount_doctor(date, &[]).await;
    clinic.mount_patient_upsert().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(confirmation_collision())
        .up_to_n_times(1)
        .mount(&clinic.server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &clinic.patient_id,
                &clinic.doctor_id,
                &date.to_string(),
                "11:30",
                "pending",
            )
        ])))
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "11:30"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(appointment_inserts(&clinic.server).await, 2);
}

#[tokio::test]
async fn repeated_confirmation_collisions_give_up() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Thu);
    clinic.mount_doctor(date, &[]).await;
    clinic.mount_patient_upsert().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(confirmation_collision())
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "11:30"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Failed to process appointment");
    assert_eq!(appointment_inserts(&clinic.server).await, 3);
}

#[tokio::test]
async fn closed_day_booking_returns_reason() {
    let clinic = Clinic::start().await;
    let date = next(Weekday::Sun);
    clinic.mount_doctor(date, &[]).await;

    let response = clinic
        .app()
        .oneshot(post_json("/book", &booking_form(date, "10:00"), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "The doctor doesn't work on Sundays");
}

#[tokio::test]
async fn invalid_form_never_reaches_the_store() {
    let clinic = Clinic::start().await;
    let mut form = booking_form(next(Weekday::Tue), "10:00");
    form["utr_number"] = json!("12345");

    let response = clinic.app().oneshot(post_json("/book", &form, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "UTR number must be exactly 12 digits");
    assert!(clinic.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn lookup_matches_confirmation_and_phone() {
    let clinic = Clinic::start().await;
    let mut row = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        &clinic.patient_id,
        &clinic.doctor_id,
        "2026-11-03",
        "09:30:00",
        "confirmed",
    );
    row["patient"] = json!({ "id": clinic.patient_id, "name": "Meera Nair", "phone": "9123456780" });
    row["doctor"] = json!({ "id": clinic.doctor_id, "name": "Dr. Asha Rao" });

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("confirmation_id", "eq.HCAB12CD"))
        .and(query_param("patient.phone", "eq.9123456780"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(post_json(
            "/lookup",
            &json!({ "confirmation_id": " hcab12cd ", "phone": "9123456780" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["time"], "09:30");
    assert_eq!(body["doctor_name"], "Dr. Asha Rao");
    assert_eq!(body["patient_name"], "Meera Nair");
}

#[tokio::test]
async fn lookup_mismatch_is_a_single_message() {
    let clinic = Clinic::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&clinic.server)
        .await;

    for body in [
        json!({ "confirmation_id": "HCAB12CD", "phone": "0000000000" }),
        json!({ "confirmation_id": "nonsense", "phone": "9123456780" }),
    ] {
        let response = clinic.app().oneshot(post_json("/lookup", &body, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Invalid confirmation ID or phone number");
    }
}

#[tokio::test]
async fn dashboard_requires_session() {
    let clinic = Clinic::start().await;
    let request = Request::builder()
        .uri("/?filter=today")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();

    let response = clinic.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn today_list_filters_and_searches() {
    let clinic = Clinic::start().await;
    let today = Utc::now().date_naive();

    let mut meera = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(), &clinic.patient_id, &clinic.doctor_id, &today.to_string(), "09:00", "pending",
    );
    meera["patient"] = json!({ "name": "Meera Nair", "phone": "9123456780" });
    let mut ravi = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(), &Uuid::new_v4().to_string(), &clinic.doctor_id, &today.to_string(), "09:30", "confirmed",
    );
    ravi["patient"] = json!({ "name": "Ravi Kumar", "phone": "9988776655" });
    ravi["confirmation_id"] = json!("HCZZ9999");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("date", format!("eq.{}", today)))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([meera, ravi])))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(authed("GET", "/?filter=today&search=ravi", &clinic.staff_token(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["confirmation_id"], "HCZZ9999");
}

#[tokio::test]
async fn confirming_a_pending_appointment() {
    let clinic = Clinic::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let pending = MockSupabaseResponses::appointment_response(
        &appointment_id, &clinic.patient_id, &clinic.doctor_id, "2026-11-03", "10:00", "pending",
    );
    let mut confirmed = pending.clone();
    confirmed["status"] = json!("confirmed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending])))
        .mount(&clinic.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(query_param("status", "eq.pending"))
        .and(body_partial_json(json!({ "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .expect(1)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(authed(
            "PATCH",
            &format!("/{}/status", appointment_id),
            &clinic.staff_token(),
            Some(json!({ "status": "confirmed" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "confirmed");
}

#[tokio::test]
async fn completed_appointment_cannot_be_cancelled() {
    let clinic = Clinic::start().await;
    let appointment_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &clinic.patient_id, &clinic.doctor_id, "2026-10-01", "10:00", "completed",
            )
        ])))
        .mount(&clinic.server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(authed(
            "PATCH",
            &format!("/{}/status", appointment_id),
            &clinic.staff_token(),
            Some(json!({ "status": "cancelled" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Cannot change appointment from completed to cancelled");
}

#[tokio::test]
async fn staff_booking_for_unknown_patient_is_404() {
    let clinic = Clinic::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&clinic.server)
        .await;

    let response = clinic
        .app()
        .oneshot(authed(
            "POST",
            "/",
            &clinic.staff_token(),
            Some(json!({
                "patient_id": clinic.patient_id,
                "date": next(Weekday::Tue),
                "time": "10:00",
                "type": "Specialized Care"
            })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Patient not found");
}
