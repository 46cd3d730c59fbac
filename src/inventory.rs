//! Reference data: departments, the medication catalog and pharmacies.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::identity::resolve_doctor;
use crate::models::enums::{DosageUnit, MedicationType};
use crate::models::*;

/// Radius used by [`nearby_pharmacies`] when the caller gives none.
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 5.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

fn require_name(name: Option<&str>, entity: &str) -> Result<String, DatabaseError> {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => Ok(name.to_string()),
        None => Err(DatabaseError::Validation(format!("{entity} name is required"))),
    }
}

// ─── Departments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub head_doctor_id: Option<String>,
}

fn fetch_department(conn: &Connection, department_id: i64) -> Result<Department, DatabaseError> {
    get_department(conn, department_id)?.ok_or_else(|| DatabaseError::not_found("Department", department_id))
}

/// Create a department. An unknown head doctor is dropped, not rejected.
pub fn create_department(conn: &Connection, req: &DepartmentRequest) -> Result<Department, DatabaseError> {
    let name = require_name(req.name.as_deref(), "Department")?;
    let head = resolve_doctor(conn, req.head_doctor_id.as_deref())?;
    let id = insert_department(conn, &name, req.description.as_deref(), head.as_deref())?;
    tracing::info!(department_id = id, %name, "Department created");
    fetch_department(conn, id)
}

/// Replace name and description. The head changes only when `headDoctorId` is
/// sent, with the same lenient resolution as create.
pub fn update_department_details(
    conn: &Connection,
    department_id: i64,
    req: &DepartmentRequest,
) -> Result<Department, DatabaseError> {
    let current = fetch_department(conn, department_id)?;
    let name = match req.name.as_deref() {
        Some(_) => require_name(req.name.as_deref(), "Department")?,
        None => current.name,
    };
    let head = match req.head_doctor_id.as_deref() {
        Some(requested) => resolve_doctor(conn, Some(requested))?,
        None => current.head_doctor_id,
    };
    update_department(conn, department_id, &name, req.description.as_deref(), head.as_deref())?;
    fetch_department(conn, department_id)
}

pub fn department(conn: &Connection, department_id: i64) -> Result<Department, DatabaseError> {
    fetch_department(conn, department_id)
}

pub fn departments(conn: &Connection) -> Result<Vec<Department>, DatabaseError> {
    list_departments(conn)
}

// ─── Medications ──────────────────────────────────────────────────────────────

/// Create body (name required) and partial update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRequest {
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    pub medication_type: Option<MedicationType>,
    pub description: Option<String>,
    pub dosage_form: Option<String>,
    pub strength: Option<String>,
    pub dosage_unit: Option<DosageUnit>,
    pub side_effects: Option<String>,
    pub contraindications: Option<String>,
    pub storage: Option<String>,
    pub requires_prescription: Option<bool>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i32>,
    pub reorder_level: Option<i32>,
    pub batch_number: Option<String>,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub barcode: Option<String>,
    pub ndc_code: Option<String>,
    pub is_active: Option<bool>,
}

macro_rules! overlay {
    ($target:expr, $req:expr; $($field:ident),+ $(,)?) => {
        $( if $req.$field.is_some() { $target.$field = $req.$field.clone(); } )+
    };
}

impl MedicationRequest {
    fn validate(&self) -> Result<(), DatabaseError> {
        if self.stock_quantity.is_some_and(|q| q < 0) {
            return Err(DatabaseError::Validation("stockQuantity cannot be negative".into()));
        }
        if self.price.is_some_and(|p| !p.is_finite() || p < 0.0) {
            return Err(DatabaseError::Validation("price must be a non-negative number".into()));
        }
        Ok(())
    }

    fn apply(&self, med: &mut Medication) -> Result<(), DatabaseError> {
        if self.name.is_some() {
            med.name = require_name(self.name.as_deref(), "Medication")?;
        }
        overlay!(med, self;
            generic_name, brand, manufacturer, medication_type, description, dosage_form,
            strength, dosage_unit, side_effects, contraindications, storage, price,
            reorder_level, batch_number, manufacture_date, expiry_date, barcode, ndc_code,
        );
        if let Some(flag) = self.requires_prescription {
            med.requires_prescription = flag;
        }
        if let Some(quantity) = self.stock_quantity {
            med.stock_quantity = quantity;
        }
        if let Some(flag) = self.is_active {
            med.is_active = flag;
        }
        Ok(())
    }
}

fn fetch_medication(conn: &Connection, medication_id: i64) -> Result<Medication, DatabaseError> {
    get_medication(conn, medication_id)?.ok_or_else(|| DatabaseError::not_found("Medication", medication_id))
}

/// Add a catalog item. New items are active and need a prescription unless told otherwise.
pub fn create_medication(conn: &Connection, req: &MedicationRequest) -> Result<Medication, DatabaseError> {
    req.validate()?;
    let now = now_timestamp();
    let mut med = Medication {
        medication_id: 0,
        name: require_name(req.name.as_deref(), "Medication")?,
        generic_name: None,
        brand: None,
        manufacturer: None,
        medication_type: None,
        description: None,
        dosage_form: None,
        strength: None,
        dosage_unit: None,
        side_effects: None,
        contraindications: None,
        storage: None,
        requires_prescription: true,
        price: None,
        stock_quantity: 0,
        reorder_level: None,
        batch_number: None,
        manufacture_date: None,
        expiry_date: None,
        barcode: None,
        ndc_code: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    req.apply(&mut med)?;
    let id = insert_medication(conn, &med)?;
    tracing::info!(medication_id = id, name = %med.name, stock = med.stock_quantity, "Medication added");
    fetch_medication(conn, id)
}

pub fn update_medication_details(
    conn: &Connection,
    medication_id: i64,
    req: &MedicationRequest,
) -> Result<Medication, DatabaseError> {
    req.validate()?;
    let mut med = fetch_medication(conn, medication_id)?;
    req.apply(&mut med)?;
    update_medication(conn, &med)?;
    fetch_medication(conn, medication_id)
}

pub fn medication(conn: &Connection, medication_id: i64) -> Result<Medication, DatabaseError> {
    fetch_medication(conn, medication_id)
}

pub fn medications(conn: &Connection, filter: &MedicationFilter<'_>) -> Result<Vec<Medication>, DatabaseError> {
    list_medications(conn, filter)
}

/// Items whose expiry date has passed as of `today`.
pub fn expired_medications(conn: &Connection, today: NaiveDate) -> Result<Vec<Medication>, DatabaseError> {
    list_medications(conn, &MedicationFilter::ExpiredBefore(today))
}

pub fn delete_medication(conn: &Connection, medication_id: i64) -> Result<(), DatabaseError> {
    if delete_medication_row(conn, medication_id)? == 0 {
        return Err(DatabaseError::not_found("Medication", medication_id));
    }
    tracing::info!(medication_id, "Medication deleted");
    Ok(())
}

/// Apply a signed stock delta. The stock never goes below zero.
pub fn adjust_stock(conn: &Connection, medication_id: i64, delta: i32) -> Result<Medication, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let med = fetch_medication(&tx, medication_id)?;
    let quantity = med
        .stock_quantity
        .checked_add(delta)
        .filter(|q| *q >= 0)
        .ok_or_else(|| {
            DatabaseError::Validation(format!(
                "Insufficient stock: {} on hand, adjustment {delta}",
                med.stock_quantity
            ))
        })?;
    set_medication_stock(&tx, medication_id, quantity)?;
    let updated = fetch_medication(&tx, medication_id)?;
    tx.commit()?;

    tracing::info!(medication_id, from = med.stock_quantity, to = quantity, "Stock adjusted");
    Ok(updated)
}

/// Whether `quantity` units of an active item are on hand.
pub fn check_availability(conn: &Connection, medication_id: i64, quantity: i32) -> Result<bool, DatabaseError> {
    let med = fetch_medication(conn, medication_id)?;
    Ok(med.is_active && med.stock_quantity >= quantity)
}

// ─── Pharmacies ───────────────────────────────────────────────────────────────

/// Create body (name required) and partial update body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub license_number: Option<String>,
    pub is_active: Option<bool>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub operating_hours: Option<String>,
}

impl PharmacyRequest {
    fn apply(&self, pharmacy: &mut Pharmacy) -> Result<(), DatabaseError> {
        if self.name.is_some() {
            pharmacy.name = require_name(self.name.as_deref(), "Pharmacy")?;
        }
        overlay!(pharmacy, self;
            address, city, state, zip_code, country, phone_number, email, website,
            license_number, latitude, longitude, operating_hours,
        );
        if let Some(flag) = self.is_active {
            pharmacy.is_active = flag;
        }
        if let Some(lat) = pharmacy.latitude {
            check_coordinates(lat, pharmacy.longitude.unwrap_or_default())?;
        }
        if let Some(lon) = pharmacy.longitude {
            check_coordinates(pharmacy.latitude.unwrap_or_default(), lon)?;
        }
        Ok(())
    }
}

/// A pharmacy with its distance from the search point.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyPharmacy {
    #[serde(flatten)]
    pub pharmacy: Pharmacy,
    pub distance_km: f64,
}

fn fetch_pharmacy(conn: &Connection, pharmacy_id: i64) -> Result<Pharmacy, DatabaseError> {
    get_pharmacy(conn, pharmacy_id)?.ok_or_else(|| DatabaseError::not_found("Pharmacy", pharmacy_id))
}

fn check_coordinates(latitude: f64, longitude: f64) -> Result<(), DatabaseError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(DatabaseError::Validation(format!(
            "Coordinates out of range: {latitude}, {longitude}"
        )));
    }
    Ok(())
}

pub fn create_pharmacy(conn: &Connection, req: &PharmacyRequest) -> Result<Pharmacy, DatabaseError> {
    let now = now_timestamp();
    let mut pharmacy = Pharmacy {
        pharmacy_id: 0,
        name: require_name(req.name.as_deref(), "Pharmacy")?,
        address: None,
        city: None,
        state: None,
        zip_code: None,
        country: None,
        phone_number: None,
        email: None,
        website: None,
        license_number: None,
        is_active: true,
        latitude: None,
        longitude: None,
        operating_hours: None,
        created_at: now,
        updated_at: now,
    };
    req.apply(&mut pharmacy)?;
    let id = insert_pharmacy(conn, &pharmacy)?;
    tracing::info!(pharmacy_id = id, name = %pharmacy.name, "Pharmacy created");
    fetch_pharmacy(conn, id)
}

pub fn update_pharmacy_details(
    conn: &Connection,
    pharmacy_id: i64,
    req: &PharmacyRequest,
) -> Result<Pharmacy, DatabaseError> {
    let mut pharmacy = fetch_pharmacy(conn, pharmacy_id)?;
    req.apply(&mut pharmacy)?;
    update_pharmacy(conn, &pharmacy)?;
    fetch_pharmacy(conn, pharmacy_id)
}

pub fn pharmacy(conn: &Connection, pharmacy_id: i64) -> Result<Pharmacy, DatabaseError> {
    fetch_pharmacy(conn, pharmacy_id)
}

pub fn pharmacies(conn: &Connection, filter: &PharmacyFilter<'_>) -> Result<Vec<Pharmacy>, DatabaseError> {
    list_pharmacies(conn, filter)
}

/// Delete a pharmacy. Prescriptions that named it keep existing without one.
pub fn delete_pharmacy(conn: &Connection, pharmacy_id: i64) -> Result<(), DatabaseError> {
    if delete_pharmacy_row(conn, pharmacy_id)? == 0 {
        return Err(DatabaseError::not_found("Pharmacy", pharmacy_id));
    }
    tracing::info!(pharmacy_id, "Pharmacy deleted");
    Ok(())
}

/// Great-circle distance in kilometres (haversine).
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Active pharmacies with coordinates within `radius_km`, nearest first.
pub fn nearby_pharmacies(
    conn: &Connection,
    latitude: f64,
    longitude: f64,
    radius_km: Option<f64>,
) -> Result<Vec<NearbyPharmacy>, DatabaseError> {
    check_coordinates(latitude, longitude)?;
    let radius = radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
    if !radius.is_finite() || radius <= 0.0 {
        return Err(DatabaseError::Validation("radius must be positive".into()));
    }

    let mut found: Vec<NearbyPharmacy> = list_pharmacies(conn, &PharmacyFilter::Active(true))?
        .into_iter()
        .filter_map(|pharmacy| {
            let (lat, lon) = (pharmacy.latitude?, pharmacy.longitude?);
            let distance_km = distance_km(latitude, longitude, lat, lon);
            (distance_km <= radius).then_some(NearbyPharmacy { pharmacy, distance_km })
        })
        .collect();
    found.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn medication_req(name: &str, stock: i32) -> MedicationRequest {
        MedicationRequest {
            name: Some(name.into()),
            generic_name: Some(format!("{name} generic")),
            medication_type: Some(MedicationType::Analgesic),
            dosage_form: Some("Tablet".into()),
            stock_quantity: Some(stock),
            reorder_level: Some(10),
            ..Default::default()
        }
    }

    fn pharmacy_req(name: &str, lat: f64, lon: f64) -> PharmacyRequest {
        PharmacyRequest {
            name: Some(name.into()),
            address: Some("1 Market Street".into()),
            city: Some("Lyon".into()),
            zip_code: Some("69002".into()),
            latitude: Some(lat),
            longitude: Some(lon),
            ..Default::default()
        }
    }

    #[test]
    fn department_head_resolution_is_lenient() {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "D40000");

        let dept = create_department(&conn, &DepartmentRequest {
            name: Some("Cardiology".into()),
            description: None,
            head_doctor_id: Some("D40000".into()),
        })
        .unwrap();
        assert_eq!(dept.head_doctor_id.as_deref(), Some("D40000"));
        assert_eq!(dept.head_doctor_name.as_deref(), Some("Dr. Gregory House"));

        let updated = update_department_details(&conn, dept.department_id, &DepartmentRequest {
            name: None,
            description: Some("Heart".into()),
            head_doctor_id: Some("D99999".into()),
        })
        .unwrap();
        assert_eq!(updated.name, "Cardiology");
        assert_eq!(updated.head_doctor_id, None);
        assert_eq!(departments(&conn).unwrap().len(), 1);
    }

    #[test]
    fn renaming_department_keeps_head() {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "D40000");
        let dept = create_department(&conn, &DepartmentRequest {
            name: Some("Cardiology".into()),
            head_doctor_id: Some("D40000".into()),
            ..Default::default()
        })
        .unwrap();

        let renamed = update_department_details(&conn, dept.department_id, &DepartmentRequest {
            name: Some("Cardiology & Vascular".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(renamed.name, "Cardiology & Vascular");
        assert_eq!(renamed.head_doctor_id.as_deref(), Some("D40000"));
    }

    #[test]
    fn department_requires_name() {
        let conn = open_memory_database().unwrap();
        let err = create_department(&conn, &DepartmentRequest::default()).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[test]
    fn deleting_head_doctor_keeps_department() {
        let conn = open_memory_database().unwrap();
        fixtures::doctor(&conn, "D40001");
        let dept = create_department(&conn, &DepartmentRequest {
            name: Some("Neurology".into()),
            head_doctor_id: Some("D40001".into()),
            ..Default::default()
        })
        .unwrap();

        cascade::delete_doctor(&conn, "D40001").unwrap();
        let after = department(&conn, dept.department_id).unwrap();
        assert_eq!(after.head_doctor_id, None);
    }

    #[test]
    fn medication_defaults_and_partial_update() {
        let conn = open_memory_database().unwrap();
        let med = create_medication(&conn, &medication_req("Paracetamol", 40)).unwrap();
        assert!(med.is_active);
        assert!(med.requires_prescription);
        assert_eq!(med.stock_quantity, 40);

        let updated = update_medication_details(&conn, med.medication_id, &MedicationRequest {
            price: Some(3.5),
            requires_prescription: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(updated.name, "Paracetamol");
        assert_eq!(updated.price, Some(3.5));
        assert!(!updated.requires_prescription);
        assert_eq!(updated.generic_name.as_deref(), Some("Paracetamol generic"));
    }

    #[test]
    fn stock_never_goes_negative() {
        let conn = open_memory_database().unwrap();
        let med = create_medication(&conn, &medication_req("Ibuprofen", 5)).unwrap();

        assert_eq!(adjust_stock(&conn, med.medication_id, -3).unwrap().stock_quantity, 2);
        let err = adjust_stock(&conn, med.medication_id, -3).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
        assert_eq!(medication(&conn, med.medication_id).unwrap().stock_quantity, 2);
        assert_eq!(adjust_stock(&conn, med.medication_id, 8).unwrap().stock_quantity, 10);
    }

    #[test]
    fn availability_requires_active_and_stock() {
        let conn = open_memory_database().unwrap();
        let med = create_medication(&conn, &medication_req("Amoxicillin", 4)).unwrap();
        assert!(check_availability(&conn, med.medication_id, 4).unwrap());
        assert!(!check_availability(&conn, med.medication_id, 5).unwrap());

        update_medication_details(&conn, med.medication_id, &MedicationRequest {
            is_active: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert!(!check_availability(&conn, med.medication_id, 1).unwrap());
        assert!(matches!(
            check_availability(&conn, 999, 1),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn medication_filters() {
        let conn = open_memory_database().unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut expired = medication_req("Aspirin", 0);
        expired.expiry_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        create_medication(&conn, &expired).unwrap();
        create_medication(&conn, &medication_req("Cetirizine", 100)).unwrap();

        let found = medications(&conn, &MedicationFilter::Search("ceti")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(expired_medications(&conn, today).unwrap()[0].name, "Aspirin");
        assert_eq!(medications(&conn, &MedicationFilter::OutOfStock).unwrap().len(), 1);
        assert_eq!(medications(&conn, &MedicationFilter::ToReorder).unwrap().len(), 1);
    }

    #[test]
    fn negative_initial_stock_rejected() {
        let conn = open_memory_database().unwrap();
        let err = create_medication(&conn, &medication_req("Bad", -1)).unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[test]
    fn haversine_known_distance() {
        // Paris to Lyon, roughly 392 km.
        let d = distance_km(48.8566, 2.3522, 45.7640, 4.8357);
        assert!((d - 392.0).abs() < 3.0, "got {d}");
        assert_eq!(distance_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn nearby_uses_default_radius_and_sorts() {
        let conn = open_memory_database().unwrap();
        create_pharmacy(&conn, &pharmacy_req("Far", 45.835, 4.84)).unwrap();
        create_pharmacy(&conn, &pharmacy_req("Close", 45.765, 4.836)).unwrap();
        create_pharmacy(&conn, &pharmacy_req("Closer", 45.764, 4.8358)).unwrap();
        let mut inactive = pharmacy_req("Closed", 45.764, 4.8357);
        inactive.is_active = Some(false);
        create_pharmacy(&conn, &inactive).unwrap();

        let found = nearby_pharmacies(&conn, 45.7640, 4.8357, None).unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.pharmacy.name.as_str()).collect();
        assert_eq!(names, ["Closer", "Close"]);

        let wide = nearby_pharmacies(&conn, 45.7640, 4.8357, Some(10.0)).unwrap();
        assert_eq!(wide.len(), 3);
    }

    #[test]
    fn nearby_rejects_bad_input() {
        let conn = open_memory_database().unwrap();
        assert!(nearby_pharmacies(&conn, 91.0, 0.0, None).is_err());
        assert!(nearby_pharmacies(&conn, 0.0, 0.0, Some(0.0)).is_err());
    }

    #[test]
    fn pharmacy_search_and_address_filter() {
        let conn = open_memory_database().unwrap();
        let p = create_pharmacy(&conn, &pharmacy_req("Pharmacie Centrale", 45.0, 4.0)).unwrap();
        assert_eq!(pharmacies(&conn, &PharmacyFilter::Search("market")).unwrap().len(), 1);
        let by_city = pharmacies(&conn, &PharmacyFilter::Address {
            city: Some("lyo"),
            state: None,
            zip_code: None,
        })
        .unwrap();
        assert_eq!(by_city[0].pharmacy_id, p.pharmacy_id);

        delete_pharmacy(&conn, p.pharmacy_id).unwrap();
        assert!(matches!(
            delete_pharmacy(&conn, p.pharmacy_id),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
