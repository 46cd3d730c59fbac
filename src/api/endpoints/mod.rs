//! HTTP handlers, one module per resource.
//!
//! Handlers stay thin: open a connection, call the domain function, wrap the
//! result. All rules live in the domain modules.

pub mod appointments;
pub mod audit_logs;
pub mod auth;
pub mod departments;
pub mod doctors;
pub mod health;
pub mod login_history;
pub mod medical_records;
pub mod medications;
pub mod notifications;
pub mod patients;
pub mod payments;
pub mod pharmacies;
pub mod prescriptions;
pub mod staff;
