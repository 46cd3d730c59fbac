//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per table family. Every function takes a `&Connection`
//! (a `Transaction` derefs to one) so callers decide the transaction scope.
//! All public functions are re-exported here.

mod admin;
mod appointment;
mod audit;
mod department;
mod doctor;
mod login_history;
mod medical_record;
mod medication;
mod notification;
mod patient;
mod payment;
mod pharmacy;
mod prescription;
mod staff;
mod user;

use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

use super::DatabaseError;

pub use admin::*;
pub use appointment::*;
pub use audit::*;
pub use department::*;
pub use doctor::*;
pub use login_history::*;
pub use medical_record::*;
pub use medication::*;
pub use notification::*;
pub use patient::*;
pub use payment::*;
pub use pharmacy::*;
pub use prescription::*;
pub use staff::*;
pub use user::*;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Current local time truncated to whole seconds.
pub fn now_timestamp() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Collect mapped rows, logging and skipping any row that fails to convert.
pub(crate) fn collect_lenient<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
    entity: &str,
) -> Vec<T> {
    let mut out = Vec::new();
    for row in rows {
        match row {
            Ok(item) => out.push(item),
            Err(e) => tracing::warn!(entity, error = %e, "Skipping unreadable row"),
        }
    }
    out
}

/// AND-joined WHERE conditions with positional `?` parameters.
#[derive(Default)]
pub(crate) struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a clause containing exactly one `?` placeholder.
    pub(crate) fn push(&mut self, clause: &str, value: impl Into<Value>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.push(value.into());
        self
    }

    /// Add a clause with no placeholder.
    pub(crate) fn push_raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Run `select` with the given conditions and map rows leniently.
pub(crate) fn query_list<T, F>(
    conn: &Connection,
    select: &str,
    conditions: &Conditions,
    order_by: &str,
    map: F,
    entity: &str,
) -> Result<Vec<T>, DatabaseError>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let sql = format!("{select}{} ORDER BY {order_by}", conditions.where_sql());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(conditions.values.iter()), map)?;
    Ok(collect_lenient(rows, entity))
}

/// Run a `SELECT COUNT(*) ...` with the given conditions.
pub(crate) fn query_count(
    conn: &Connection,
    select: &str,
    conditions: &Conditions,
) -> Result<i64, DatabaseError> {
    let sql = format!("{select}{}", conditions.where_sql());
    let count = conn.query_row(&sql, params_from_iter(conditions.values.iter()), |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal rows for repository and domain tests.

    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::*;
    use crate::models::enums::*;
    use crate::models::*;

    pub fn user(conn: &Connection, email: &str, user_type: UserType) -> i64 {
        insert_user(conn, email, "hash", &ContactDetails::default(), user_type).unwrap()
    }

    pub fn doctor(conn: &Connection, doctor_id: &str) -> String {
        let user_id = user(conn, &format!("{}@clinic.test", doctor_id.to_lowercase()), UserType::Doctor);
        let now = now_timestamp();
        insert_doctor(conn, &Doctor {
            doctor_id: doctor_id.into(),
            user_id,
            first_name: "Gregory".into(),
            last_name: "House".into(),
            specialization: Some("Diagnostics".into()),
            qualification: None,
            experience_years: Some(20),
            license_number: None,
            consultation_fee: Some(150.0),
            bio: None,
            rating: None,
            department_id: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        doctor_id.into()
    }

    pub fn patient(conn: &Connection, patient_id: &str) -> String {
        let user_id = user(conn, &format!("{}@clinic.test", patient_id.to_lowercase()), UserType::Patient);
        let now = now_timestamp();
        insert_patient(conn, &Patient {
            patient_id: patient_id.into(),
            user_id,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            blood_group: Some("O+".into()),
            height: None,
            weight: None,
            allergies: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            insurance_provider: None,
            insurance_id: None,
            primary_doctor_id: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        patient_id.into()
    }

    pub fn staff(conn: &Connection, staff_id: &str) -> String {
        let user_id = user(conn, &format!("{}@clinic.test", staff_id.to_lowercase()), UserType::Staff);
        let now = now_timestamp();
        insert_staff(conn, &Staff {
            staff_id: staff_id.into(),
            user_id,
            first_name: "Nina".into(),
            last_name: "Reyes".into(),
            position: Some("Cashier".into()),
            hire_date: None,
            department_id: None,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        staff_id.into()
    }

    pub fn appointment(conn: &Connection, patient_id: &str, doctor_id: &str, date: NaiveDate) -> i64 {
        let now = now_timestamp();
        insert_appointment(conn, &Appointment {
            appointment_id: 0,
            patient_id: Some(patient_id.into()),
            doctor_id: Some(doctor_id.into()),
            department_id: None,
            appointment_date: date,
            start_time: None,
            end_time: None,
            status: AppointmentStatus::Scheduled,
            reason: Some("Checkup".into()),
            notes: None,
            appointment_fee: Some(80.0),
            is_paid: false,
            created_at: now,
            updated_at: now,
            patient_name: None,
            patient_email: None,
            patient_phone: None,
            doctor_name: None,
            doctor_specialization: None,
            department_name: None,
        })
        .unwrap()
    }

    pub fn record(conn: &Connection, patient_id: &str, doctor_id: Option<&str>, appointment_id: Option<i64>) -> i64 {
        let now = now_timestamp();
        insert_medical_record(conn, &MedicalRecord {
            record_id: 0,
            patient_id: Some(patient_id.into()),
            doctor_id: doctor_id.map(Into::into),
            appointment_id,
            record_type: Some(RecordType::Consultation),
            diagnosis: Some("Migraine".into()),
            symptoms: None,
            treatment: None,
            notes: None,
            prescription: None,
            test_results: None,
            medical_history: None,
            record_date: now,
            next_appointment: None,
            created_at: now,
            updated_at: now,
            patient_name: None,
            doctor_name: None,
            doctor_specialization: None,
        })
        .unwrap()
    }

    pub fn prescription(conn: &Connection, patient_id: &str, doctor_id: &str, total_refills: i32) -> i64 {
        let now = now_timestamp();
        insert_prescription(conn, &Prescription {
            prescription_id: 0,
            patient_id: Some(patient_id.into()),
            doctor_id: Some(doctor_id.into()),
            medical_record_id: None,
            pharmacy_id: None,
            prescription_date: now.date(),
            expiry_date: None,
            status: PrescriptionStatus::Active,
            notes: None,
            is_refillable: total_refills > 0,
            total_refills,
            refills_remaining: total_refills,
            medications: vec![MedicationLine {
                medication_name: "Ibuprofen".into(),
                dosage: Some("400mg".into()),
                ..Default::default()
            }],
            created_at: now,
            updated_at: now,
            patient_name: None,
            doctor_name: None,
            pharmacy_name: None,
            pharmacy_address: None,
            pharmacy_phone: None,
        })
        .unwrap()
    }

    pub fn payment(conn: &Connection, patient_id: &str, appointment_id: Option<i64>, amount: f64, status: PaymentStatus) -> i64 {
        let now = now_timestamp();
        insert_payment(conn, &Payment {
            payment_id: 0,
            patient_id: Some(patient_id.into()),
            appointment_id,
            received_by: None,
            amount,
            payment_type: PaymentType::Consultation,
            status,
            payment_method: Some("CASH".into()),
            transaction_id: None,
            notes: None,
            payment_date: now,
            created_at: now,
            updated_at: now,
            patient_name: None,
            doctor_name: None,
            staff_name: None,
        })
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rusqlite::Connection;

    use super::fixtures;
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::*;
    use crate::models::*;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timestamp_format_round_trips_through_sqlite() {
        let conn = test_db();
        let ts = now_timestamp();
        let stored: NaiveDateTime = conn
            .query_row("SELECT ?1", [format_timestamp(&ts)], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, ts);
    }

    #[test]
    fn user_email_is_unique_ignoring_case() {
        let conn = test_db();
        fixtures::user(&conn, "ana@clinic.test", UserType::Patient);
        let err = insert_user(&conn, "ANA@clinic.test", "h", &ContactDetails::default(), UserType::Doctor)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail(_)));
        assert!(email_exists(&conn, "Ana@Clinic.test").unwrap());
    }

    #[test]
    fn doctor_profile_joins_account_and_department() {
        let conn = test_db();
        let dept = insert_department(&conn, "Cardiology", Some("Heart"), None).unwrap();
        fixtures::doctor(&conn, "D10001");
        let mut doctor = get_doctor(&conn, "D10001").unwrap().unwrap();
        doctor.department_id = Some(dept);
        update_doctor(&conn, &doctor).unwrap();

        let profile = get_doctor_profile(&conn, "D10001").unwrap().unwrap();
        assert_eq!(profile.account.email, "d10001@clinic.test");
        assert_eq!(profile.account.user_type, UserType::Doctor);
        assert_eq!(profile.department_name.as_deref(), Some("Cardiology"));
    }

    #[test]
    fn department_head_name_resolved() {
        let conn = test_db();
        fixtures::doctor(&conn, "D20002");
        let id = insert_department(&conn, "Neurology", None, Some("D20002")).unwrap();
        let dept = get_department(&conn, id).unwrap().unwrap();
        assert_eq!(dept.head_doctor_name.as_deref(), Some("Dr. Gregory House"));
    }

    #[test]
    fn appointment_projection_embeds_doctor_display_name() {
        let conn = test_db();
        fixtures::doctor(&conn, "D30003");
        fixtures::patient(&conn, "P30003");
        let id = fixtures::appointment(&conn, "P30003", "D30003", day(2025, 3, 1));

        let appt = get_appointment(&conn, id).unwrap().unwrap();
        assert_eq!(appt.doctor_name.as_deref(), Some("Dr. Gregory House"));
        assert_eq!(appt.doctor_specialization.as_deref(), Some("Diagnostics"));
        assert_eq!(appt.patient_name.as_deref(), Some("Ada Lovelace"));
        assert!(!appt.is_paid);
    }

    #[test]
    fn appointment_filters() {
        let conn = test_db();
        fixtures::doctor(&conn, "D40004");
        fixtures::patient(&conn, "P40004");
        fixtures::appointment(&conn, "P40004", "D40004", day(2025, 1, 10));
        let second = fixtures::appointment(&conn, "P40004", "D40004", day(2025, 2, 10));
        set_appointment_status(&conn, second, AppointmentStatus::Completed).unwrap();

        let in_range = list_appointments(&conn, &AppointmentFilter::DateRange(day(2025, 1, 1), day(2025, 1, 31))).unwrap();
        assert_eq!(in_range.len(), 1);

        let completed = list_appointments(&conn, &AppointmentFilter::Status(AppointmentStatus::Completed)).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].appointment_id, second);

        assert_eq!(count_appointments_on(&conn, day(2025, 2, 10)).unwrap(), 1);
    }

    #[test]
    fn unreadable_rows_are_skipped_in_lists() {
        let conn = test_db();
        fixtures::doctor(&conn, "D50005");
        fixtures::patient(&conn, "P50005");
        fixtures::appointment(&conn, "P50005", "D50005", day(2025, 1, 10));
        let broken = fixtures::appointment(&conn, "P50005", "D50005", day(2025, 1, 11));
        conn.execute(
            "UPDATE appointments SET appointment_date = 'not-a-date' WHERE appointment_id = ?1",
            [broken],
        )
        .unwrap();

        let all = list_appointments(&conn, &AppointmentFilter::All).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn medical_records_deleted_for_appointment() {
        let conn = test_db();
        fixtures::doctor(&conn, "D60006");
        fixtures::patient(&conn, "P60006");
        let appt = fixtures::appointment(&conn, "P60006", "D60006", day(2025, 1, 10));
        fixtures::record(&conn, "P60006", Some("D60006"), Some(appt));
        fixtures::record(&conn, "P60006", Some("D60006"), Some(appt));
        fixtures::record(&conn, "P60006", None, None);

        assert_eq!(delete_medical_records_for_appointment(&conn, appt).unwrap(), 2);
        let remaining = list_medical_records(&conn, &MedicalRecordFilter::Patient("P60006")).unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn medical_record_aggregates() {
        let conn = test_db();
        fixtures::patient(&conn, "P70007");
        fixtures::record(&conn, "P70007", None, None);
        fixtures::record(&conn, "P70007", None, None);

        assert_eq!(distinct_diagnoses(&conn, "P70007").unwrap(), vec!["Migraine".to_string()]);
        let counts = count_records_by_type(&conn, "P70007").unwrap();
        assert_eq!(counts, vec![RecordTypeCount { record_type: RecordType::Consultation, count: 2 }]);
    }

    #[test]
    fn prescription_lines_keep_order() {
        let conn = test_db();
        fixtures::doctor(&conn, "D80008");
        fixtures::patient(&conn, "P80008");
        let id = fixtures::prescription(&conn, "P80008", "D80008", 1);
        let lines = vec![
            MedicationLine { medication_name: "B".into(), ..Default::default() },
            MedicationLine { medication_name: "A".into(), ..Default::default() },
        ];
        replace_medication_lines(&conn, id, &lines).unwrap();

        let rx = get_prescription(&conn, id).unwrap().unwrap();
        let names: Vec<_> = rx.medications.iter().map(|l| l.medication_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn prescription_refill_counter_check_constraint() {
        let conn = test_db();
        fixtures::doctor(&conn, "D90009");
        fixtures::patient(&conn, "P90009");
        let id = fixtures::prescription(&conn, "P90009", "D90009", 2);
        assert!(set_prescription_state(&conn, id, PrescriptionStatus::Active, 3).is_err());
        assert!(set_prescription_state(&conn, id, PrescriptionStatus::Active, -1).is_err());
    }

    #[test]
    fn payment_counts_and_revenue() {
        let conn = test_db();
        fixtures::doctor(&conn, "D11111");
        fixtures::patient(&conn, "P11111");
        let appt = fixtures::appointment(&conn, "P11111", "D11111", day(2025, 1, 10));
        fixtures::payment(&conn, "P11111", Some(appt), 100.0, PaymentStatus::Completed);
        fixtures::payment(&conn, "P11111", Some(appt), 40.0, PaymentStatus::Pending);

        assert_eq!(count_payments_for_appointment(&conn, appt).unwrap(), 2);
        assert_eq!(count_payments_by_status(&conn, PaymentStatus::Pending).unwrap(), 1);

        let now = now_timestamp();
        let from = now - chrono::Duration::days(1);
        let to = now + chrono::Duration::days(1);
        assert_eq!(sum_completed_payments(&conn, &from, &to).unwrap(), 100.0);
    }

    #[test]
    fn medication_stock_filters() {
        let conn = test_db();
        let now = now_timestamp();
        let base = Medication {
            medication_id: 0,
            name: "Amoxicillin".into(),
            generic_name: Some("amoxicillin".into()),
            brand: None,
            manufacturer: None,
            medication_type: Some(MedicationType::Antibiotic),
            description: None,
            dosage_form: Some("Capsule".into()),
            strength: Some("500".into()),
            dosage_unit: Some(DosageUnit::Mg),
            side_effects: None,
            contraindications: None,
            storage: None,
            requires_prescription: true,
            price: Some(4.5),
            stock_quantity: 0,
            reorder_level: Some(10),
            batch_number: None,
            manufacture_date: None,
            expiry_date: Some(day(2020, 1, 1)),
            barcode: None,
            ndc_code: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let empty = insert_medication(&conn, &base).unwrap();
        insert_medication(&conn, &Medication {
            name: "Paracetamol".into(),
            generic_name: None,
            medication_type: Some(MedicationType::Analgesic),
            stock_quantity: 50,
            expiry_date: None,
            requires_prescription: false,
            ..base.clone()
        })
        .unwrap();

        let out = list_medications(&conn, &MedicationFilter::OutOfStock).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].medication_id, empty);
        assert_eq!(list_medications(&conn, &MedicationFilter::ToReorder).unwrap().len(), 1);
        assert_eq!(list_medications(&conn, &MedicationFilter::ExpiredBefore(day(2024, 1, 1))).unwrap().len(), 1);
        assert_eq!(list_medications(&conn, &MedicationFilter::Search("para")).unwrap().len(), 1);
        assert_eq!(list_medications(&conn, &MedicationFilter::RequiresPrescription(false)).unwrap().len(), 1);
        assert_eq!(list_medications(&conn, &MedicationFilter::Type(MedicationType::Antibiotic)).unwrap().len(), 1);
    }

    #[test]
    fn pharmacy_address_filter_ignores_missing_parts() {
        let conn = test_db();
        let now = now_timestamp();
        let base = Pharmacy {
            pharmacy_id: 0,
            name: "Central".into(),
            address: Some("1 Main St".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            zip_code: Some("62701".into()),
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
        insert_pharmacy(&conn, &base).unwrap();
        insert_pharmacy(&conn, &Pharmacy { name: "North".into(), city: Some("Chicago".into()), ..base.clone() }).unwrap();

        let by_state = list_pharmacies(&conn, &PharmacyFilter::Address { city: None, state: Some("IL"), zip_code: None }).unwrap();
        assert_eq!(by_state.len(), 2);
        let by_city = list_pharmacies(&conn, &PharmacyFilter::Address { city: Some("spring"), state: Some("IL"), zip_code: None }).unwrap();
        assert_eq!(by_city.len(), 1);
    }

    #[test]
    fn notification_mark_read_sets_timestamp() {
        let conn = test_db();
        let id = insert_notification(&conn, RecipientType::Patient, Some("P12345"), None, "Reminder", "Tomorrow 9am", NotificationPriority::Normal).unwrap();
        assert_eq!(unread_notifications(&conn, RecipientType::Patient, "P12345").unwrap().len(), 1);

        assert!(mark_notification_read(&conn, id).unwrap());
        let all = notifications_for_recipient(&conn, RecipientType::Patient, "P12345").unwrap();
        assert!(all[0].is_read);
        assert!(all[0].read_at.is_some());
        assert!(unread_notifications(&conn, RecipientType::Patient, "P12345").unwrap().is_empty());
    }

    #[test]
    fn audit_and_login_history_filters() {
        let conn = test_db();
        insert_audit_log(&conn, "admin", "DELETE", "Doctor", "D00001", None, "10.0.0.1").unwrap();
        insert_audit_log(&conn, "nurse", "UPDATE", "Patient", "P00001", Some("allergies"), "10.0.0.2").unwrap();
        assert_eq!(list_audit_logs(&conn, &AuditFilter::User("admin")).unwrap().len(), 1);
        assert_eq!(list_audit_logs(&conn, &AuditFilter::Entity("Patient", "P00001")).unwrap().len(), 1);

        insert_login_history(&conn, "D00001", "10.0.0.1", "curl", true, None).unwrap();
        insert_login_history(&conn, "D00001", "10.0.0.1", "curl", false, Some("bad password")).unwrap();
        let failed = list_login_history(&conn, &LoginHistoryFilter::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].failure_reason.as_deref(), Some("bad password"));
    }
}
