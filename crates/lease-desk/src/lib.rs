//! Contract lifecycle and e-signature pipeline for landlord rental management.

pub mod config;
pub mod contracts;
pub mod error;
pub mod telemetry;
