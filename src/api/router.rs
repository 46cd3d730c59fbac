//! HTTP router.
//!
//! Every resource answers both at `/<resource>` and `/api/<resource>`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Access log

use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints::*;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the full API router over a shared core.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    let resources = resource_routes();

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    Router::new()
        .merge(resources.clone())
        .nest("/api", resources)
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::access::log_access))
        .layer(CorsLayer::permissive())
}

fn resource_routes() -> Router<ApiContext> {
    Router::new()
        .route("/health", get(health::check))
        .merge(auth_routes())
        .merge(people_routes())
        .merge(clinical_routes())
        .merge(prescription_routes())
        .merge(billing_routes())
        .merge(inventory_routes())
        .merge(activity_routes())
}

fn auth_routes() -> Router<ApiContext> {
    Router::new()
        .route("/auth/doctor/register", post(auth::register_doctor))
        .route("/auth/patient/register", post(auth::register_patient))
        .route("/auth/staff/register", post(auth::register_staff))
        .route("/auth/admin/register", post(auth::register_admin))
        .route("/auth/doctor/login", post(auth::login_doctor))
        .route("/auth/patient/login", post(auth::login_patient))
        .route("/auth/staff/login", post(auth::login_staff))
        .route("/auth/admin/login", post(auth::login_admin))
}

fn people_routes() -> Router<ApiContext> {
    Router::new()
        .route("/doctors", get(doctors::list))
        .route(
            "/doctors/:id",
            get(doctors::detail).put(doctors::update).delete(doctors::delete),
        )
        .route("/patients", get(patients::list))
        .route("/patients/search", get(patients::search))
        .route(
            "/patients/:id",
            get(patients::detail).put(patients::update).delete(patients::delete),
        )
        .route("/staff", get(staff::list))
        .route("/staff/profiles", get(staff::list))
        .route("/staff/create", post(staff::create))
        .route(
            "/staff/:id",
            get(staff::detail).put(staff::update).delete(staff::delete),
        )
        .route("/admins", get(staff::list_admins))
        .route(
            "/admins/:id",
            get(staff::admin_detail)
                .put(staff::update_admin)
                .delete(staff::delete_admin),
        )
        .route("/departments", get(departments::list).post(departments::create))
        .route(
            "/departments/:id",
            get(departments::detail)
                .put(departments::update)
                .delete(departments::delete),
        )
}

fn clinical_routes() -> Router<ApiContext> {
    Router::new()
        .route("/appointments", get(appointments::list).post(appointments::create))
        .route(
            "/appointments/:id",
            get(appointments::detail)
                .put(appointments::update)
                .delete(appointments::delete),
        )
        .route("/appointments/:id/status", patch(appointments::update_status))
        .route("/appointments/doctor/:id", get(appointments::by_doctor))
        .route("/appointments/patient/:id", get(appointments::by_patient))
        .route("/appointments/date/:date", get(appointments::by_date))
        .route("/appointments/date-range", get(appointments::by_date_range))
        .route("/appointments/status/:status", get(appointments::by_status))
        .route("/appointments/count/today", get(appointments::count_today))
        .route("/appointments/count/date/:date", get(appointments::count_on))
        .route(
            "/medical-records",
            get(medical_records::list).post(medical_records::create),
        )
        .route(
            "/medical-records/:id",
            get(medical_records::detail)
                .put(medical_records::update)
                .delete(medical_records::delete),
        )
        .route("/medical-records/patient/:id", get(medical_records::by_patient))
        .route(
            "/medical-records/patient/:id/type/:record_type",
            get(medical_records::by_patient_and_type),
        )
        .route(
            "/medical-records/patient/:id/diagnoses",
            get(medical_records::diagnoses),
        )
        .route(
            "/medical-records/patient/:id/count-by-type",
            get(medical_records::count_by_type),
        )
        .route("/medical-records/doctor/:id", get(medical_records::by_doctor))
        .route(
            "/medical-records/appointment/:id",
            get(medical_records::by_appointment),
        )
        .route("/medical-records/type/:record_type", get(medical_records::by_type))
        .route("/medical-records/date-range", get(medical_records::by_date_range))
}

fn prescription_routes() -> Router<ApiContext> {
    Router::new()
        .route("/prescriptions", get(prescriptions::list).post(prescriptions::create))
        .route(
            "/prescriptions/:id",
            get(prescriptions::detail)
                .put(prescriptions::update)
                .delete(prescriptions::delete),
        )
        .route(
            "/prescriptions/:id/status/:status",
            put(prescriptions::update_status),
        )
        .route("/prescriptions/:id/refill", post(prescriptions::refill))
        .route("/prescriptions/expired", get(prescriptions::expired))
        .route("/prescriptions/patient/:id", get(prescriptions::by_patient))
        .route(
            "/prescriptions/patient/:id/status/:status",
            get(prescriptions::by_patient_and_status),
        )
        .route(
            "/prescriptions/patient/:id/count/period",
            get(prescriptions::patient_count),
        )
        .route("/prescriptions/doctor/:id", get(prescriptions::by_doctor))
        .route(
            "/prescriptions/doctor/:id/status/:status",
            get(prescriptions::by_doctor_and_status),
        )
        .route(
            "/prescriptions/doctor/:id/count/date",
            get(prescriptions::doctor_count),
        )
        .route("/prescriptions/pharmacy/:id", get(prescriptions::by_pharmacy))
        .route("/prescriptions/status/:status", get(prescriptions::by_status))
        .route("/prescriptions/date-range", get(prescriptions::by_date_range))
}

fn billing_routes() -> Router<ApiContext> {
    Router::new()
        .route("/payments", get(payments::list).post(payments::create))
        .route(
            "/payments/:id",
            get(payments::detail).put(payments::update).delete(payments::delete),
        )
        .route("/payments/:id/status", patch(payments::update_status))
        .route("/payments/patient/:id", get(payments::by_patient))
        .route("/payments/appointment/:id", get(payments::by_appointment))
        .route("/payments/status/:status", get(payments::by_status))
        .route("/payments/type/:payment_type", get(payments::by_type))
        .route("/payments/date-range", get(payments::by_date_range))
        .route("/payments/revenue/period", get(payments::revenue_for_period))
        .route("/payments/revenue/monthly/:year", get(payments::monthly_revenue))
        .route(
            "/payments/revenue/monthly/:year/:month",
            get(payments::revenue_for_month),
        )
        .route("/payments/count/status/:status", get(payments::count_by_status))
        .route("/payments/dashboard/summary", get(payments::dashboard_summary))
}

fn inventory_routes() -> Router<ApiContext> {
    Router::new()
        .route("/medications", get(medications::list).post(medications::create))
        .route(
            "/medications/:id",
            get(medications::detail)
                .put(medications::update)
                .delete(medications::delete),
        )
        .route("/medications/:id/stock", put(medications::adjust_stock))
        .route("/medications/:id/available", get(medications::availability))
        .route("/medications/search", get(medications::search))
        .route("/medications/type/:medication_type", get(medications::by_type))
        .route("/medications/dosage-form/:form", get(medications::by_dosage_form))
        .route(
            "/medications/prescription-required/:required",
            get(medications::by_prescription_required),
        )
        .route("/medications/active/:active", get(medications::by_active))
        .route("/medications/expired", get(medications::expired))
        .route("/medications/expiring", get(medications::expiring))
        .route("/medications/to-reorder", get(medications::to_reorder))
        .route("/medications/out-of-stock", get(medications::out_of_stock))
        .route("/pharmacies", get(pharmacies::list).post(pharmacies::create))
        .route(
            "/pharmacies/:id",
            get(pharmacies::detail)
                .put(pharmacies::update)
                .delete(pharmacies::delete),
        )
        .route("/pharmacies/search", get(pharmacies::search))
        .route("/pharmacies/status", get(pharmacies::by_status))
        .route("/pharmacies/address", get(pharmacies::by_address))
        .route("/pharmacies/nearby", get(pharmacies::nearby))
}

fn activity_routes() -> Router<ApiContext> {
    Router::new()
        .route("/notifications", get(notifications::list).post(notifications::create))
        .route(
            "/notifications/:id",
            get(notifications::detail).delete(notifications::delete),
        )
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/notifications/recipient/:recipient_type/:recipient_id",
            get(notifications::by_recipient),
        )
        .route(
            "/notifications/unread/:recipient_type/:recipient_id",
            get(notifications::unread),
        )
        .route("/audit-logs", get(audit_logs::list).post(audit_logs::create))
        .route(
            "/audit-logs/:id",
            get(audit_logs::detail).delete(audit_logs::delete),
        )
        .route("/audit-logs/user/:username", get(audit_logs::by_user))
        .route("/audit-logs/action/:action", get(audit_logs::by_action))
        .route("/audit-logs/entity", get(audit_logs::by_entity))
        .route("/audit-logs/date-range", get(audit_logs::by_date_range))
        .route(
            "/login-history",
            get(login_history::list).post(login_history::create),
        )
        .route(
            "/login-history/:id",
            get(login_history::detail).delete(login_history::delete),
        )
        .route("/login-history/user/:username", get(login_history::by_user))
        .route("/login-history/failed", get(login_history::failed))
        .route("/login-history/date-range", get(login_history::by_date_range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::middleware::access::REQUEST_ID_HEADER;

    /// Router over a fresh database in a temp directory.
    /// The tempdir guard must be kept alive for the duration of the test.
    fn test_app() -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let core = CoreState::with_db_path(&tmp.path().join("hkare.db"), 1_000).unwrap();
        (api_router(Arc::new(core)), tmp)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, role: &str, email: &str, extra: Value) -> Value {
        let mut body = json!({
            "email": email,
            "password": "correct horse",
            "firstName": "Test",
            "lastName": "User",
        });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            target.extend(extra.clone());
        }
        let response = send(app, json_request("POST", &format!("/api/auth/{role}/register"), body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn health_answers_on_both_prefixes() {
        let (app, _tmp) = test_app();
        for uri in ["/health", "/api/health"] {
            let response = send(&app, empty_request("GET", uri)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["status"], "UP");
            assert_eq!(json["message"], "API is running");
        }
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let (app, _tmp) = test_app();
        let req = Request::builder()
            .uri("/health")
            .header(REQUEST_ID_HEADER, "req-42")
            .body(Body::empty())
            .unwrap();
        let response = send(&app, req).await;
        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-42");

        let response = send(&app, empty_request("GET", "/health")).await;
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn register_then_login() {
        let (app, _tmp) = test_app();
        let registered = register(&app, "patient", "ada@clinic.test", json!({"bloodGroup": "O+"})).await;
        let patient_id = registered["roleId"].as_str().unwrap().to_string();
        assert!(patient_id.starts_with('P'));
        assert_eq!(registered["userType"], "PATIENT");

        for identifier in [patient_id.as_str(), "ADA@clinic.test"] {
            let response = send(
                &app,
                json_request(
                    "POST",
                    "/auth/patient/login",
                    json!({"identifier": identifier, "password": "correct horse"}),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["authenticated"], true);
        }

        let response = send(
            &app,
            json_request(
                "POST",
                "/auth/patient/login",
                json!({"identifier": patient_id, "password": "wrong"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["authenticated"], false);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (app, _tmp) = test_app();
        register(&app, "doctor", "house@clinic.test", json!({})).await;
        let response = send(
            &app,
            json_request(
                "POST",
                "/auth/patient/register",
                json!({
                    "email": "House@Clinic.test",
                    "password": "pw",
                    "firstName": "G",
                    "lastName": "H",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "DUPLICATE_EMAIL");
    }

    #[tokio::test]
    async fn unknown_id_returns_404() {
        let (app, _tmp) = test_app();
        let response = send(&app, empty_request("GET", "/api/doctors/D99999")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["message"], "Doctor not found with id D99999");
    }

    #[tokio::test]
    async fn malformed_input_returns_400() {
        let (app, _tmp) = test_app();
        for uri in [
            "/appointments/status/SOMETIMES",
            "/appointments/date/yesterday",
            "/payments/not-a-number",
            "/appointments/date-range?startDate=2025-01-01",
        ] {
            let response = send(&app, empty_request("GET", uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
        }
    }

    #[tokio::test]
    async fn status_path_is_case_insensitive() {
        let (app, _tmp) = test_app();
        let response = send(&app, empty_request("GET", "/appointments/status/scheduled")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn payment_settles_appointment() {
        let (app, _tmp) = test_app();
        let doctor = register(&app, "doctor", "d@clinic.test", json!({"consultationFee": 120.0})).await;
        let patient = register(&app, "patient", "p@clinic.test", json!({})).await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/appointments",
                json!({
                    "patientId": patient["roleId"],
                    "doctorId": doctor["roleId"],
                    "appointmentDate": "2025-06-02",
                    "reason": "Follow-up",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let appointment = body_json(response).await;
        let appointment_id = appointment["appointmentId"].as_i64().unwrap();
        assert_eq!(appointment["isPaid"], false);
        assert_eq!(appointment["status"], "SCHEDULED");

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/payments",
                json!({
                    "patientId": patient["roleId"],
                    "appointmentId": appointment_id,
                    "amount": 120.0,
                    "type": "CONSULTATION",
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let payment_id = body_json(response).await["paymentId"].as_i64().unwrap();

        let uri = format!("/api/appointments/{appointment_id}");
        let json = body_json(send(&app, empty_request("GET", &uri)).await).await;
        assert_eq!(json["isPaid"], true);

        let response = send(&app, empty_request("DELETE", &format!("/api/payments/{payment_id}"))).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let json = body_json(send(&app, empty_request("GET", &uri)).await).await;
        assert_eq!(json["isPaid"], false);
    }

    #[tokio::test]
    async fn deleting_doctor_returns_204_then_404() {
        let (app, _tmp) = test_app();
        let doctor = register(&app, "doctor", "gone@clinic.test", json!({})).await;
        let uri = format!("/doctors/{}", doctor["roleId"].as_str().unwrap());

        let response = send(&app, empty_request("DELETE", &uri)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn department_with_staff_cannot_be_deleted() {
        let (app, _tmp) = test_app();
        let response = send(&app, json_request("POST", "/departments", json!({"name": "Radiology"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let department_id = body_json(response).await["departmentId"].as_i64().unwrap();

        register(&app, "staff", "nurse@clinic.test", json!({"departmentId": department_id})).await;

        let response = send(&app, empty_request("DELETE", &format!("/departments/{department_id}"))).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn refill_without_refills_is_distinguishable() {
        let (app, _tmp) = test_app();
        let doctor = register(&app, "doctor", "rx@clinic.test", json!({})).await;
        let patient = register(&app, "patient", "pt@clinic.test", json!({})).await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/prescriptions",
                json!({
                    "patientId": patient["roleId"],
                    "doctorId": doctor["roleId"],
                    "isRefillable": false,
                    "medications": [{"medicationName": "Amoxicillin", "dosage": "500mg"}],
                }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["prescriptionId"].as_i64().unwrap();

        let response = send(&app, empty_request("POST", &format!("/prescriptions/{id}/refill"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_REFILLABLE");
    }

    #[tokio::test]
    async fn empty_lists_and_missing_owners() {
        let (app, _tmp) = test_app();
        let response = send(&app, empty_request("GET", "/api/medications")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        let response = send(&app, empty_request("GET", "/api/appointments/patient/P00000")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
