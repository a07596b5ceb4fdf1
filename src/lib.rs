//! # campusdesk
//!
//! Tenant-scoped data access for a multi-tenant administrative backend:
//! units of work, composable query processors and a generic repository,
//! with the campus drive service as the reference consumer.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;
pub mod telemetry;
pub use migration;
