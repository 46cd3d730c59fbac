use crate::db::DatabaseError;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Values are stored and serialized as their upper-case wire names.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let s = value.as_str()?;
                s.parse().map_err(|e: DatabaseError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

str_enum!(UserType {
    Doctor => "DOCTOR",
    Patient => "PATIENT",
    Staff => "STAFF",
    Admin => "ADMIN",
});

str_enum!(Gender {
    Male => "MALE",
    Female => "FEMALE",
    Other => "OTHER",
});

str_enum!(AppointmentStatus {
    Scheduled => "SCHEDULED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Cancelled => "CANCELLED",
    NoShow => "NO_SHOW",
});

str_enum!(RecordType {
    GeneralCheckup => "GENERAL_CHECKUP",
    Emergency => "EMERGENCY",
    FollowUp => "FOLLOW_UP",
    Surgery => "SURGERY",
    LabTest => "LAB_TEST",
    Imaging => "IMAGING",
    Vaccination => "VACCINATION",
    Consultation => "CONSULTATION",
});

str_enum!(PrescriptionStatus {
    Active => "ACTIVE",
    Completed => "COMPLETED",
    Expired => "EXPIRED",
    Cancelled => "CANCELLED",
});

impl PrescriptionStatus {
    /// COMPLETED, EXPIRED and CANCELLED admit no further refills.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

str_enum!(PaymentType {
    Consultation => "CONSULTATION",
    Procedure => "PROCEDURE",
    Medication => "MEDICATION",
    Laboratory => "LABORATORY",
    Imaging => "IMAGING",
    Other => "OTHER",
});

str_enum!(PaymentStatus {
    Pending => "PENDING",
    Completed => "COMPLETED",
    Refunded => "REFUNDED",
    Failed => "FAILED",
    Cancelled => "CANCELLED",
});

str_enum!(PaymentMethod {
    Cash => "CASH",
    CreditCard => "CREDIT_CARD",
    DebitCard => "DEBIT_CARD",
    Insurance => "INSURANCE",
    BankTransfer => "BANK_TRANSFER",
    Other => "OTHER",
});

str_enum!(MedicationType {
    Antibiotic => "ANTIBIOTIC",
    Analgesic => "ANALGESIC",
    AntiInflammatory => "ANTI_INFLAMMATORY",
    Antihistamine => "ANTIHISTAMINE",
    Antidepressant => "ANTIDEPRESSANT",
    Antihypertensive => "ANTIHYPERTENSIVE",
    Antidiabetic => "ANTIDIABETIC",
    Diuretic => "DIURETIC",
    Steroid => "STEROID",
    Vaccine => "VACCINE",
    Vitamin => "VITAMIN",
    Anticonvulsant => "ANTICONVULSANT",
    Antipsychotic => "ANTIPSYCHOTIC",
    Anticoagulant => "ANTICOAGULANT",
    Bronchodilator => "BRONCHODILATOR",
    Sedative => "SEDATIVE",
    Laxative => "LAXATIVE",
    Antacid => "ANTACID",
    Antiviral => "ANTIVIRAL",
    Antifungal => "ANTIFUNGAL",
    Other => "OTHER",
});

str_enum!(DosageUnit {
    Mg => "MG",
    Ml => "ML",
    G => "G",
    Mcg => "MCG",
    Percent => "PERCENT",
    Iu => "IU",
    Meq => "MEQ",
    Unit => "UNIT",
    Other => "OTHER",
});

str_enum!(RecipientType {
    Doctor => "DOCTOR",
    Patient => "PATIENT",
    Staff => "STAFF",
    Admin => "ADMIN",
    All => "ALL",
});

str_enum!(NotificationPriority {
    Low => "LOW",
    Normal => "NORMAL",
    High => "HIGH",
    Urgent => "URGENT",
});
