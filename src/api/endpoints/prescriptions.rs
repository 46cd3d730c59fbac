//! Prescriptions and refills.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, DateRangeQuery};
use crate::db::PrescriptionFilter;
use crate::models::enums::PrescriptionStatus;
use crate::models::Prescription;
use crate::prescriptions::{self, PrescriptionRequest};

type PrescriptionList = Result<Json<Vec<Prescription>>, ApiError>;

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

fn list_by(ctx: &ApiContext, filter: &PrescriptionFilter<'_>) -> PrescriptionList {
    let conn = ctx.core.open_db()?;
    list_or_empty("prescriptions", prescriptions::prescriptions(&conn, filter))
}

/// `POST /prescriptions`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<PrescriptionRequest>,
) -> Result<(StatusCode, Json<Prescription>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(prescriptions::create_prescription(&conn, &req)?)))
}

/// `GET /prescriptions`
pub async fn list(State(ctx): State<ApiContext>) -> PrescriptionList {
    list_by(&ctx, &PrescriptionFilter::All)
}

/// `GET /prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<Json<Prescription>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::prescription(&conn, prescription_id)?))
}

/// `PUT /prescriptions/:id` (partial)
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(prescription_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PrescriptionRequest>,
) -> Result<Json<Prescription>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::update_prescription_details(&conn, prescription_id, &req)?))
}

/// `DELETE /prescriptions/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    prescriptions::delete_prescription(&conn, prescription_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /prescriptions/:id/status/:status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    ApiPath((prescription_id, status)): ApiPath<(i64, String)>,
) -> Result<Json<Prescription>, ApiError> {
    let status: PrescriptionStatus = status.parse()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::update_prescription_status(&conn, prescription_id, status)?))
}

/// `POST /prescriptions/:id/refill`
pub async fn refill(
    State(ctx): State<ApiContext>,
    ApiPath(prescription_id): ApiPath<i64>,
) -> Result<Json<Prescription>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::process_refill(&conn, prescription_id)?))
}

/// `GET /prescriptions/expired`: ACTIVE but past expiry, reported only.
pub async fn expired(State(ctx): State<ApiContext>) -> PrescriptionList {
    let conn = ctx.core.open_db()?;
    let today = Local::now().date_naive();
    list_or_empty("prescriptions", prescriptions::expired_prescriptions(&conn, today))
}

/// `GET /prescriptions/patient/:id`
pub async fn by_patient(State(ctx): State<ApiContext>, ApiPath(patient_id): ApiPath<String>) -> PrescriptionList {
    list_by(&ctx, &PrescriptionFilter::Patient(&patient_id))
}

/// `GET /prescriptions/doctor/:id`
pub async fn by_doctor(State(ctx): State<ApiContext>, ApiPath(doctor_id): ApiPath<String>) -> PrescriptionList {
    list_by(&ctx, &PrescriptionFilter::Doctor(&doctor_id))
}

/// `GET /prescriptions/pharmacy/:id`
pub async fn by_pharmacy(State(ctx): State<ApiContext>, ApiPath(pharmacy_id): ApiPath<i64>) -> PrescriptionList {
    list_by(&ctx, &PrescriptionFilter::Pharmacy(pharmacy_id))
}

/// `GET /prescriptions/status/:status`
pub async fn by_status(State(ctx): State<ApiContext>, ApiPath(status): ApiPath<String>) -> PrescriptionList {
    let status: PrescriptionStatus = status.parse()?;
    list_by(&ctx, &PrescriptionFilter::Status(status))
}

/// `GET /prescriptions/date-range?startDate=&endDate=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<DateRangeQuery>) -> PrescriptionList {
    list_by(&ctx, &PrescriptionFilter::DateRange(q.start_date, q.end_date))
}

/// `GET /prescriptions/patient/:id/status/:status`
pub async fn by_patient_and_status(
    State(ctx): State<ApiContext>,
    ApiPath((patient_id, status)): ApiPath<(String, String)>,
) -> PrescriptionList {
    let status: PrescriptionStatus = status.parse()?;
    list_by(&ctx, &PrescriptionFilter::PatientAndStatus(&patient_id, status))
}

/// `GET /prescriptions/doctor/:id/status/:status`
pub async fn by_doctor_and_status(
    State(ctx): State<ApiContext>,
    ApiPath((doctor_id, status)): ApiPath<(String, String)>,
) -> PrescriptionList {
    let status: PrescriptionStatus = status.parse()?;
    list_by(&ctx, &PrescriptionFilter::DoctorAndStatus(&doctor_id, status))
}

/// `GET /prescriptions/doctor/:id/count/date?date=`
pub async fn doctor_count(
    State(ctx): State<ApiContext>,
    ApiPath(doctor_id): ApiPath<String>,
    ApiQuery(q): ApiQuery<DateQuery>,
) -> Result<Json<i64>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::doctor_prescription_count(&conn, &doctor_id, q.date)?))
}

/// `GET /prescriptions/patient/:id/count/period?startDate=&endDate=`
pub async fn patient_count(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
    ApiQuery(q): ApiQuery<DateRangeQuery>,
) -> Result<Json<i64>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(prescriptions::patient_prescription_count(
        &conn,
        &patient_id,
        q.start_date,
        q.end_date,
    )?))
}
