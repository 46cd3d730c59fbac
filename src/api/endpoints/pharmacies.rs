//! Pharmacies and proximity search.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{list_or_empty, ApiContext, ApiJson, ApiPath, ApiQuery};
use crate::db::PharmacyFilter;
use crate::inventory::{self, NearbyPharmacy, PharmacyRequest};
use crate::models::Pharmacy;

type PharmacyList = Result<Json<Vec<Pharmacy>>, ApiError>;

#[derive(Deserialize)]
pub struct KeywordQuery {
    #[serde(default)]
    pub keyword: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuery {
    pub is_active: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressQuery {
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_in_km: Option<f64>,
}

fn list_by(ctx: &ApiContext, filter: &PharmacyFilter<'_>) -> PharmacyList {
    let conn = ctx.core.open_db()?;
    list_or_empty("pharmacies", inventory::pharmacies(&conn, filter))
}

/// `POST /pharmacies`
pub async fn create(
    State(ctx): State<ApiContext>,
    ApiJson(req): ApiJson<PharmacyRequest>,
) -> Result<(StatusCode, Json<Pharmacy>), ApiError> {
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(inventory::create_pharmacy(&conn, &req)?)))
}

/// `GET /pharmacies`
pub async fn list(State(ctx): State<ApiContext>) -> PharmacyList {
    list_by(&ctx, &PharmacyFilter::All)
}

/// `GET /pharmacies/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    ApiPath(pharmacy_id): ApiPath<i64>,
) -> Result<Json<Pharmacy>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::pharmacy(&conn, pharmacy_id)?))
}

/// `PUT /pharmacies/:id` (partial)
pub async fn update(
    State(ctx): State<ApiContext>,
    ApiPath(pharmacy_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PharmacyRequest>,
) -> Result<Json<Pharmacy>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(inventory::update_pharmacy_details(&conn, pharmacy_id, &req)?))
}

/// `DELETE /pharmacies/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    ApiPath(pharmacy_id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    inventory::delete_pharmacy(&conn, pharmacy_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /pharmacies/search?keyword=`
pub async fn search(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<KeywordQuery>) -> PharmacyList {
    list_by(&ctx, &PharmacyFilter::Search(q.keyword.trim()))
}

/// `GET /pharmacies/status?isActive=`
pub async fn by_status(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<ActiveQuery>) -> PharmacyList {
    list_by(&ctx, &PharmacyFilter::Active(q.is_active))
}

/// `GET /pharmacies/address?city=&state=&zipCode=`
pub async fn by_address(State(ctx): State<ApiContext>, ApiQuery(q): ApiQuery<AddressQuery>) -> PharmacyList {
    list_by(&ctx, &PharmacyFilter::Address {
        city: q.city.as_deref(),
        state: q.state.as_deref(),
        zip_code: q.zip_code.as_deref(),
    })
}

/// `GET /pharmacies/nearby?latitude=&longitude=&radiusInKm=`
pub async fn nearby(
    State(ctx): State<ApiContext>,
    ApiQuery(q): ApiQuery<NearbyQuery>,
) -> Result<Json<Vec<NearbyPharmacy>>, ApiError> {
    let conn = ctx.core.open_db()?;
    list_or_empty(
        "pharmacies",
        inventory::nearby_pharmacies(&conn, q.latitude, q.longitude, q.radius_in_km),
    )
}
