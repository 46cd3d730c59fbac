//! Medical records.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, DateTimeRangeQuery};
use crate::clinical::{self, MedicalRecordRequest};
use crate::db::MedicalRecordFilter;
use crate::models::enums::RecordType;
use crate::models::MedicalRecord;

type RecordList = Result<Json<Vec<MedicalRecord>>, ApiError>;

/// `POST /medical-records`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<MedicalRecordRequest>,
) -> Result<(StatusCode, Json<MedicalRecord>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(clinical::create_medical_record(&conn, &req)?)))
}

/// `GET /medical-records`
pub async fn list(State(ctx): State<ApiContext>) -> RecordList {
    let conn = ctx.core.open_db()?;
    list_or_empty("medical_records", clinical::medical_records(&conn, &MedicalRecordFilter::All))
}

/// `GET /medical-records/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(record_id): ApiPath<i64>,
) -> Result<Json<MedicalRecord>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::medical_record(&conn, record_id)?))
}

/// `PUT /medical-records/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(record_id): ApiPath<i64>,
    ApiJson(req): ApiJson<MedicalRecordRequest>,
) -> Result<Json<MedicalRecord>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(clinical::update_medical_record_details(&conn, record_id, &req)?))
}

/// `DELETE /medical-records/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(record_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    clinical::delete_medical_record(&conn, record_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /medical-records/patient/:patientId`
pub async fn by_patient(State(ctx): State<ApiContext>, ApiPath(patient_id): ApiPath<String>) -> RecordList {
    let conn = ctx.core.open_db()?;
    list_or_empty("medical_records", clinical::medical_records(&conn, &MedicalRecordFilter::Patient(&patient_id)))
}

/// `GET /medical-records/doctor/:doctorId`
pub async fn by_doctor(State(ctx): State<ApiContext>, ApiPath(doctor_id): ApiPath<String>) -> RecordList {
    let conn = ctx.core.open_db()?;
    list_or_empty("medical_records", clinical::medical_records(&conn, &MedicalRecordFilter::Doctor(&doctor_id)))
}

/// `GET /medical-records/appointment/:appointmentId`
pub async fn by_appointment(State(ctx): State<ApiContext>, ApiPath(appointment_id): ApiPath<i64>) -> RecordList {
    let conn = ctx.core.open_db()?;
    let filter = MedicalRecordFilter::Appointment(appointment_id);
    list_or_empty("medical_records", clinical::medical_records(&conn, &filter))
}

/// `GET /medical-records/type/:recordType`
pub async fn by_type(State(ctx): State<ApiContext>, ApiPath(record_type): ApiPath<String>) -> RecordList {
    let record_type: RecordType = record_type.parse()?;
    let conn = ctx.core.open_db()?;
    list_or_empty("medical_records", clinical::medical_records(&conn, &MedicalRecordFilter::Type(record_type)))
}

/// `GET /medical-records/date-range?startDate=&endDate=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<DateTimeRangeQuery>) -> RecordList {
    let conn = ctx.core.open_db()?;
    let filter = MedicalRecordFilter::DateRange(q.start_date, q.end_date);
    list_or_empty("medical_records", clinical::medical_records(&conn, &filter))
}

/// `GET /medical-records/patient/:patientId/type/:recordType`
pub async fn by_patient_and_type(
    State(ctx): State<ApiContext>,
    ApiPath((patient_id, record_type)): ApiPath<(String, String)>,
) -> RecordList {
    let record_type: RecordType = record_type.parse()?;
    let conn = ctx.core.open_db()?;
    let filter = MedicalRecordFilter::PatientAndType(&patient_id, record_type);
    list_or_empty("medical_records", clinical::medical_records(&conn, &filter))
}

/// `GET /medical-records/patient/:patientId/diagnoses`
pub async fn diagnoses(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
) -> Result<Json<Vec<String>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty("diagnoses", clinical::patient_diagnoses(&conn, &patient_id))
}

/// `GET /medical-records/patient/:patientId/count-by-type` → `{"GENERAL_CHECKUP": 2, ...}`
pub async fn count_by_type(
    State(ctx): State<ApiContext>,
    ApiPath(patient_id): ApiPath<String>,
) -> Result<Json<BTreeMap<&'static str, i64>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let counts = clinical::patient_record_counts(&conn, &patient_id)?
        .into_iter()
        .map(|c| (c.record_type.as_str(), c.count))
        .collect();
    Ok(Json(counts))
}
