//! Appointment scheduling.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, DateRangeQuery, StatusBody};
use crate::cascade;
use crate::clinical::{self, AppointmentRequest};
use crate::db::AppointmentFilter;
use crate::models::enums::AppointmentStatus;
use crate::models::Appointment;

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}

type AppointmentList = Result<Json<Vec<Appointment>>, ApiError>;

/// `POST /appointments`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<AppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(clinical::create_appointment(&conn, &req)?)))
}

/// `GET /appointments`
pub async fn list(State(ctx): State<ApiContext>) -> AppointmentList {
    let conn = ctx.core.open_db()?;
    list_or_empty("appointments", clinical::appointments(&conn, &AppointmentFilter::All))
}

/// `GET /appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::appointment(&conn, appointment_id)?))
}

/// `PUT /appointments/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(appointment_id): ApiPath<i64>,
    ApiJson(req): ApiJson<AppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::update_appointment_details(&conn, appointment_id, &req)?))
}

/// `PATCH /appointments/:id/status` with `{"status": "..."}`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    ApiPath(appointment_id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Appointment>, ApiError> {
    let status: AppointmentStatus = body.status.parse()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::update_appointment_status(&conn, appointment_id, status)?))
}

/// `DELETE /appointments/:id`: its medical records go with it.
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(appointment_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    cascade::delete_appointment(&conn, appointment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /appointments/doctor/:doctorId`
pub async fn by_doctor(State(ctx): State<ApiContext>, ApiPath(doctor_id): ApiPath<String>) -> AppointmentList {
    let conn = ctx.core.open_db()?;
    list_or_empty("appointments", clinical::appointments(&conn, &AppointmentFilter::Doctor(&doctor_id)))
}

/// `GET /appointments/patient/:patientId`
pub async fn by_patient(State(ctx): State<ApiContext>, ApiPath(patient_id): ApiPath<String>) -> AppointmentList {
    let conn = ctx.core.open_db()?;
    list_or_empty("appointments", clinical::appointments(&conn, &AppointmentFilter::Patient(&patient_id)))
}

/// `GET /appointments/date/:date`
pub async fn by_date(State(ctx): State<ApiContext>, ApiPath(date): ApiPath<NaiveDate>) -> AppointmentList {
    let conn = ctx.core.open_db()?;
    list_or_empty("appointments", clinical::appointments(&conn, &AppointmentFilter::Date(date)))
}

/// `GET /appointments/date-range?startDate=&endDate=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<DateRangeQuery>) -> AppointmentList {
    let conn = ctx.core.open_db()?;
    let filter = AppointmentFilter::DateRange(q.start_date, q.end_date);
    list_or_empty("appointments", clinical::appointments(&conn, &filter))
}

/// `GET /appointments/status/:status`
pub async fn by_status(State(ctx): State<ApiContext>, ApiPath(status): ApiPath<String>) -> AppointmentList {
    let status: AppointmentStatus = status.parse()?;
    let conn = ctx.core.open_db()?;
    list_or_empty("appointments", clinical::appointments(&conn, &AppointmentFilter::Status(status)))
}

/// `GET /appointments/count/today`
pub async fn count_today(State(ctx): State<ApiContext>) -> Result<Json<CountResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(CountResponse {
        count: clinical::appointments_today_count(&conn)?,
    }))
}

/// `GET /appointments/count/date/:date`
pub async fn count_on(
    State(ctx): State<ApiContext>,
    ApiPath(date): ApiPath<NaiveDate>,
) -> Result<Json<CountResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(CountResponse {
        count: clinical::appointments_count_on(&conn, date)?,
    }))
}
