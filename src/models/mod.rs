//! # Data Models
//!
//! SeaORM entities for the tenant registry and the campus drive domain.

pub mod branch;
pub mod campus_drive;
pub mod campus_drive_faculty;
pub mod company_requirement;
pub mod faculty;
pub mod tenant;

pub use branch::Entity as Branch;
pub use campus_drive::Entity as CampusDrive;
pub use campus_drive_faculty::Entity as CampusDriveFaculty;
pub use company_requirement::Entity as CompanyRequirement;
pub use faculty::Entity as Faculty;
pub use tenant::Entity as Tenant;
