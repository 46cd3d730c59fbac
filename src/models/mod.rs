pub mod enums;

mod activity;
mod appointment;
mod department;
mod identity;
mod medical_record;
mod medication;
mod payment;
mod pharmacy;
mod prescription;

pub use activity::*;
pub use appointment::*;
pub use department::*;
pub use identity::*;
pub use medical_record::*;
pub use medication::*;
pub use payment::*;
pub use pharmacy::*;
pub use prescription::*;
