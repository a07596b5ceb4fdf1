//! # Domain Services
//!
//! Services own unit-of-work policy. Each operation comes in two forms:
//! `*_in` runs inside a caller's [`UnitOfWork`](crate::repositories::UnitOfWork),
//! and the plain form opens, runs and finishes its own.

pub mod campus_drive;

pub use campus_drive::{
    CampusDriveAggregate, CampusDriveFilter, CampusDriveService, CreateCampusDrive,
    DriveFaculties, DriveMetrics, NewCompanyRequirement, RequirementWithBranch,
    UpdateCampusDrive,
};

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}
