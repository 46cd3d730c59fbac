//! Payments and revenue.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, DateTimeRangeQuery, StatusBody};
use crate::billing::{self, PaymentRequest, RevenueSummary};
use crate::db::PaymentFilter;
use crate::models::enums::{PaymentStatus, PaymentType};
use crate::models::Payment;

type PaymentList = Result<Json<Vec<Payment>>, ApiError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueResponse {
    pub total_revenue: f64,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}

fn list_by(ctx: &ApiContext, filter: &PaymentFilter<'_>) -> PaymentList {
    let conn = ctx.core.open_db()?;
    list_or_empty("payments", billing::payments(&conn, filter))
}

/// `POST /payments`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(billing::create_payment(&conn, &req)?)))
}

/// `GET /payments`
pub async fn list(State(ctx): State<ApiContext>) -> PaymentList {
    list_by(&ctx, &PaymentFilter::All)
}

/// `GET /payments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(payment_id): ApiPath<i64>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(billing::payment(&conn, payment_id)?))
}

/// `PUT /payments/:id` (partial)
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(payment_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(billing::update_payment_details(&conn, payment_id, &req)?))
}

/// `PATCH /payments/:id/status` with `{"status": "..."}`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    ApiPath(payment_id): ApiPath<i64>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Payment>, ApiError> {
    let status: PaymentStatus = body.status.parse()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(billing::update_payment_status(&conn, payment_id, status)?))
}

/// `DELETE /payments/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(payment_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    billing::delete_payment(&conn, payment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /payments/patient/:id`
pub async fn by_patient(State(ctx): State<ApiContext>, ApiPath(patient_id): ApiPath<String>) -> PaymentList {
    list_by(&ctx, &PaymentFilter::Patient(&patient_id))
}

/// `GET /payments/appointment/:id`
pub async fn by_appointment(State(ctx): State<ApiContext>, ApiPath(appointment_id): ApiPath<i64>) -> PaymentList {
    list_by(&ctx, &PaymentFilter::Appointment(appointment_id))
}

/// `GET /payments/status/:status`
pub async fn by_status(State(ctx): State<ApiContext>, ApiPath(status): ApiPath<String>) -> PaymentList {
    let status: PaymentStatus = status.parse()?;
    list_by(&ctx, &PaymentFilter::Status(status))
}

/// `GET /payments/type/:type`
pub async fn by_type(State(ctx): State<ApiContext>, ApiPath(payment_type): ApiPath<String>) -> PaymentList {
    let payment_type: PaymentType = payment_type.parse()?;
    list_by(&ctx, &PaymentFilter::Type(payment_type))
}

/// `GET /payments/date-range?startDate=&endDate=`
pub async fn by_date_range(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<DateTimeRangeQuery>) -> PaymentList {
    list_by(&ctx, &PaymentFilter::DateRange(q.start_date, q.end_date))
}

/// `GET /payments/revenue/period?startDate=&endDate=`
pub async fn revenue_for_period(
    State(ctx): State<ApiContext>,
    ApiQuery(q): ApiQuery<DateTimeRangeQuery>,
) -> Result<Json<RevenueResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(RevenueResponse {
        total_revenue: billing::revenue_for_period(&conn, q.start_date, q.end_date)?,
    }))
}

/// `GET /payments/revenue/monthly/:year` → `{"1": 0.0, ..., "12": 0.0}`
pub async fn monthly_revenue(
    State(ctx): State<ApiContext>,
    ApiPath(year): ApiPath<i32>,
) -> Result<Json<BTreeMap<u32, f64>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let by_month = billing::monthly_revenue(&conn, year)?
        .into_iter()
        .map(|m| (m.month, m.revenue))
        .collect();
    Ok(Json(by_month))
}

/// `GET /payments/revenue/monthly/:year/:month`
pub async fn revenue_for_month(
    State(ctx): State<ApiContext>,
    ApiPath((year, month)): ApiPath<(i32, u32)>,
) -> Result<Json<RevenueResponse>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(RevenueResponse {
        total_revenue: billing::revenue_for_month(&conn, year, month)?,
    }))
}

/// `GET /payments/count/status/:status`
pub async fn count_by_status(
    State(ctx): State<ApiContext>,
    ApiPath(status): ApiPath<String>,
) -> Result<Json<CountResponse>, ApiError> {
    let status: PaymentStatus = status.parse()?;
    let conn = ctx.core.open_db()?;
    Ok(Json(CountResponse {
        count: billing::payment_count_by_status(&conn, status)?,
    }))
}

/// `GET /payments/dashboard/summary`
pub async fn dashboard_summary(State(ctx): State<ApiContext>) -> Result<Json<RevenueSummary>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(billing::current_revenue_summary(&conn)?))
}
