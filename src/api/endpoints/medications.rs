//! Medication catalogue and stock.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Local;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery, DateRangeQuery};
use crate::db::MedicationFilter;
use crate::inventory::{self, MedicationRequest};
use crate::models::enums::MedicationType;
use crate::models::Medication;

type MedicationList = Result<Json<Vec<Medication>>, ApiError>;

#[derive(Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}

/// Signed stock change; negative values dispense.
#[derive(Deserialize)]
pub struct QuantityQuery {
    pub quantity: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub required_quantity: i32,
}

fn list_by(ctx: &ApiContext, filter: &MedicationFilter<'_>) -> MedicationList {
    let conn = ctx.core.open_db()?;
    list_or_empty("medications", inventory::medications(&conn, filter))
}

/// `POST /medications`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<MedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(inventory::create_medication(&conn, &req)?)))
}

/// `GET /medications`
pub async fn list(State(ctx): State<ApiContext>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::All)
}

/// `GET /medications/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(medication_id): ApiPath<i64>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::medication(&conn, medication_id)?))
}

/// `PUT /medications/:id` (partial)
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(medication_id): ApiPath<i64>,
    ApiJson(req): ApiJson<MedicationRequest>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::update_medication_details(&conn, medication_id, &req)?))
}

/// `DELETE /medications/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(medication_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    inventory::delete_medication(&conn, medication_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /medications/:id/stock?quantity=`
pub async fn adjust_stock(
    State(ctx): State<ApiContext>,
    ApiPath(medication_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<QuantityQuery>,
) -> Result<Json<Medication>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::adjust_stock(&conn, medication_id, q.quantity)?))
}

/// `GET /medications/:id/available?requiredQuantity=`
pub async fn availability(
    State(ctx): State<ApiContext>,
    ApiPath(medication_id): ApiPath<i64>,
    ApiQuery(q): ApiQuery<AvailabilityQuery>,
) -> Result<Json<bool>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::check_availability(&conn, medication_id, q.required_quantity)?))
}

/// `GET /medications/search?keyword=`
pub async fn search(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<KeywordQuery>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::Search(q.keyword.trim()))
}

/// `GET /medications/type/:type`
pub async fn by_type(State(ctx): State<ApiContext>, ApiPath(medication_type): ApiPath<String>) -> MedicationList {
    let medication_type: MedicationType = medication_type.parse()?;
    list_by(&ctx, &MedicationFilter::Type(medication_type))
}

/// `GET /medications/dosage-form/:form`
pub async fn by_dosage_form(State(ctx): State<ApiContext>, ApiPath(form): ApiPath<String>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::DosageForm(&form))
}

/// `GET /medications/prescription-required/:required`
pub async fn by_prescription_required(
    State(ctx): State<ApiContext>,
    ApiPath(required): ApiPath<bool>,
) -> MedicationList {
    list_by(&ctx, &MedicationFilter::RequiresPrescription(required))
}

/// `GET /medications/active/:active`
pub async fn by_active(State(ctx): State<ApiContext>, ApiPath(active): ApiPath<bool>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::Active(active))
}

/// `GET /medications/expired`
pub async fn expired(State(ctx): State<ApiContext>) -> MedicationList {
    let conn = ctx.core.open_db()?;
    let today = Local::now().date_naive();
    list_or_empty("medications", inventory::expired_medications(&conn, today))
}

/// `GET /medications/expiring?startDate=&endDate=`
pub async fn expiring(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<DateRangeQuery>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::ExpiringBetween(q.start_date, q.end_date))
}

/// `GET /medications/to-reorder`
pub async fn to_reorder(State(ctx): State<ApiContext>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::ToReorder)
}

/// `GET /medications/out-of-stock`
pub async fn out_of_stock(State(ctx): State<ApiContext>) -> MedicationList {
    list_by(&ctx, &MedicationFilter::OutOfStock)
}
