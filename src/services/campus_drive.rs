//! # Campus Drive Service
//!
//! Campus drives are the reference aggregate: a drive row, its coordinating
//! faculties (many-to-many) and its company requirements (has-many, each
//! optionally tied to a branch).

use std::collections::HashMap;

use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{JoinType, Order};
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, IntoActiveModel, QueryFilter, RelationTrait,
    Set, Value,
};
use url::Url;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError, UniqueCodeConfig};
use crate::error::RepositoryError;
use crate::models::{
    Branch, CampusDrive, CampusDriveFaculty, CompanyRequirement, Faculty, branch, campus_drive,
    campus_drive_faculty, company_requirement, faculty,
};
use crate::repositories::preload;
use crate::repositories::{
    Association, Preloadable, QueryProcessor, Repository, TotalCount, UnitOfWork,
};
use crate::services::Page;

const FACULTIES: &str = "faculties";
const COMPANY_REQUIREMENTS: &str = "company_requirements";
const REQUIREMENT_BRANCH: &str = "company_requirements.branch";

/// Faculty members coordinating a drive.
pub struct DriveFaculties;

impl Association for DriveFaculties {
    type Parent = CampusDrive;
    type Target = Faculty;
    type Link = CampusDriveFaculty;

    fn parent_column() -> campus_drive_faculty::Column {
        campus_drive_faculty::Column::CampusDriveId
    }

    fn target_column() -> campus_drive_faculty::Column {
        campus_drive_faculty::Column::FacultyId
    }

    fn new_link(tenant: Uuid, parent: Uuid, target: Uuid) -> campus_drive_faculty::ActiveModel {
        campus_drive_faculty::ActiveModel {
            campus_drive_id: Set(parent),
            faculty_id: Set(target),
            tenant_id: Set(tenant),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}

/// A company requirement with its branch, when one was requested and exists.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementWithBranch {
    pub requirement: company_requirement::Model,
    pub branch: Option<branch::Model>,
}

/// A drive with whichever associations were preloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CampusDriveAggregate {
    pub drive: campus_drive::Model,
    pub faculties: Vec<faculty::Model>,
    pub company_requirements: Vec<RequirementWithBranch>,
}

#[async_trait::async_trait]
impl Preloadable for CampusDrive {
    type Loaded = CampusDriveAggregate;

    const PATHS: &'static [&'static str] = &[FACULTIES, COMPANY_REQUIREMENTS, REQUIREMENT_BRANCH];

    async fn preload(
        uow: &UnitOfWork,
        models: Vec<campus_drive::Model>,
        paths: &[String],
    ) -> Result<Vec<CampusDriveAggregate>, RepositoryError> {
        let drive_ids: Vec<Uuid> = models.iter().map(|drive| drive.id).collect();

        let mut faculties: HashMap<Uuid, Vec<faculty::Model>> = HashMap::new();
        if preload::wants(paths, FACULTIES) && !drive_ids.is_empty() {
            let links = CampusDriveFaculty::find()
                .filter(campus_drive_faculty::Column::CampusDriveId.is_in(drive_ids.iter().copied()))
                .all(uow)
                .await
                .map_err(RepositoryError::database_error)?;

            let faculty_ids: Vec<Uuid> = links.iter().map(|link| link.faculty_id).collect();
            let by_id: HashMap<Uuid, faculty::Model> =
                preload::load_live::<Faculty>(uow, faculty::Column::Id, &faculty_ids)
                    .await?
                    .into_iter()
                    .map(|faculty| (faculty.id, faculty))
                    .collect();

            for link in links {
                if let Some(faculty) = by_id.get(&link.faculty_id) {
                    faculties
                        .entry(link.campus_drive_id)
                        .or_default()
                        .push(faculty.clone());
                }
            }
            for members in faculties.values_mut() {
                members.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }

        let mut requirements: HashMap<Uuid, Vec<RequirementWithBranch>> = HashMap::new();
        if preload::wants(paths, COMPANY_REQUIREMENTS) {
            let rows = preload::load_live::<CompanyRequirement>(
                uow,
                company_requirement::Column::CampusDriveId,
                &drive_ids,
            )
            .await?;

            let mut branches: HashMap<Uuid, branch::Model> = HashMap::new();
            if preload::wants(paths, REQUIREMENT_BRANCH) {
                let branch_ids: Vec<Uuid> = rows.iter().filter_map(|row| row.branch_id).collect();
                branches = preload::load_live::<Branch>(uow, branch::Column::Id, &branch_ids)
                    .await?
                    .into_iter()
                    .map(|branch| (branch.id, branch))
                    .collect();
            }

            for row in rows {
                let branch = row.branch_id.and_then(|id| branches.get(&id).cloned());
                requirements
                    .entry(row.campus_drive_id)
                    .or_default()
                    .push(RequirementWithBranch {
                        requirement: row,
                        branch,
                    });
            }
            for rows in requirements.values_mut() {
                rows.sort_by(|a, b| a.requirement.company_name.cmp(&b.requirement.company_name));
            }
        }

        let mut aggregates = Vec::with_capacity(models.len());
        for drive in models {
            aggregates.push(CampusDriveAggregate {
                faculties: faculties.remove(&drive.id).unwrap_or_default(),
                company_requirements: requirements.remove(&drive.id).unwrap_or_default(),
                drive,
            });
        }
        Ok(aggregates)
    }
}

/// Aggregate vacancy figures over live company requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromQueryResult)]
pub struct DriveMetrics {
    pub total_vacancy: i64,
    pub company_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCompanyRequirement {
    pub company_name: String,
    pub vacancy: i32,
    pub branch_id: Option<Uuid>,
}

/// Input for [`CampusDriveService::add`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateCampusDrive {
    pub campus_name: String,
    pub location: Option<String>,
    pub drive_date: Option<DateTimeWithTimeZone>,
    pub faculty_ids: Vec<Uuid>,
    pub company_requirements: Vec<NewCompanyRequirement>,
}

/// Input for [`CampusDriveService::update`]. `faculty_ids: None` keeps the
/// current faculty set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateCampusDrive {
    pub campus_name: String,
    pub location: Option<String>,
    pub drive_date: Option<DateTimeWithTimeZone>,
    pub faculty_ids: Option<Vec<Uuid>>,
}

/// Search criteria for [`CampusDriveService::list`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampusDriveFilter {
    /// Substring matched against campus name, code and location
    pub search: Option<String>,
    pub location: Option<String>,
    /// Only drives this faculty member coordinates
    pub faculty_id: Option<Uuid>,
    /// Page size; the configured default when unset, everything when `<= 0`
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Campus drive use cases over the generic repository.
#[derive(Debug, Clone)]
pub struct CampusDriveService {
    repo: Repository,
    registration_base: Url,
    unique_codes: UniqueCodeConfig,
    default_page_size: u64,
}

impl CampusDriveService {
    pub fn new(repo: Repository, config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            repo,
            registration_base: config.registration_base()?,
            unique_codes: config.unique_codes.clone(),
            default_page_size: config.default_page_size,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Create a drive with a fresh code, its registration link, faculties
    /// and company requirements.
    pub async fn add(
        &self,
        tenant: Uuid,
        actor: Option<Uuid>,
        input: CreateCampusDrive,
    ) -> Result<CampusDriveAggregate, RepositoryError> {
        let uow = self.repo.begin().await?;
        let result = self.add_in(&uow, tenant, actor, input).await;
        uow.finish(result).await
    }

    pub async fn add_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        input: CreateCampusDrive,
    ) -> Result<CampusDriveAggregate, RepositoryError> {
        let campus_name = required(&input.campus_name, "campus name")?;
        for requirement in &input.company_requirements {
            validate_requirement(requirement)?;
        }
        self.ensure_campus_name_free(uow, tenant, &campus_name, None)
            .await?;

        let code = self
            .repo
            .generate_unique_code::<CampusDrive>(
                uow,
                tenant,
                campus_drive::Column::Code,
                &self.unique_codes,
            )
            .await?;

        let drive = campus_drive::ActiveModel {
            code: Set(code.clone()),
            campus_name: Set(campus_name),
            location: Set(optional(input.location)),
            drive_date: Set(input.drive_date),
            student_registration_link: Set(self.registration_link(&code)?),
            tenant_id: Set(tenant),
            created_by: Set(actor),
            updated_by: Set(actor),
            ..Default::default()
        };
        let drive = self.repo.add::<CampusDrive>(uow, drive).await?;

        self.repo
            .replace_associations::<DriveFaculties>(uow, tenant, drive.id, &input.faculty_ids)
            .await?;
        self.add_requirements(uow, tenant, actor, drive.id, input.company_requirements)
            .await?;

        tracing::info!(parent: uow.span(), %tenant, drive_id = %drive.id, %code, "Campus drive added");
        self.get_in(uow, tenant, drive.id).await
    }

    /// A live drive with faculties, requirements and their branches.
    pub async fn get(&self, tenant: Uuid, id: Uuid) -> Result<CampusDriveAggregate, RepositoryError> {
        let uow = self.repo.read_only().await?;
        let result = self.get_in(&uow, tenant, id).await;
        uow.finish(result).await
    }

    pub async fn get_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        id: Uuid,
    ) -> Result<CampusDriveAggregate, RepositoryError> {
        self.repo
            .get_all_preloaded_for_tenant::<CampusDrive>(
                uow,
                tenant,
                &[],
                &[
                    QueryProcessor::filter(campus_drive::Column::Id.eq(id)),
                    QueryProcessor::preload([FACULTIES, REQUIREMENT_BRANCH]),
                ],
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound("campus drive not found".to_string()))
    }

    /// One page of drives, newest first, with the total matching count.
    pub async fn list(
        &self,
        tenant: Uuid,
        filter: &CampusDriveFilter,
    ) -> Result<Page<campus_drive::Model>, RepositoryError> {
        let uow = self.repo.read_only().await?;
        let result = self.list_in(&uow, tenant, filter).await;
        uow.finish(result).await
    }

    pub async fn list_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        filter: &CampusDriveFilter,
    ) -> Result<Page<campus_drive::Model>, RepositoryError> {
        let total = TotalCount::new();
        let mut processors = Vec::new();

        if let Some(search) = filter.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            let pattern = Value::from(format!("%{search}%"));
            processors.push(QueryProcessor::filter_with_operator(
                &[
                    "campus_drives.campus_name",
                    "campus_drives.code",
                    "campus_drives.location",
                ],
                &["LIKE", "LIKE", "LIKE"],
                &["OR", "OR"],
                vec![pattern; 3],
            )?);
        }
        if let Some(location) = &filter.location {
            processors.push(QueryProcessor::filter(
                campus_drive::Column::Location.eq(location.as_str()),
            ));
        }
        if let Some(faculty_id) = filter.faculty_id {
            processors.push(QueryProcessor::join_related(
                JoinType::InnerJoin,
                campus_drive::Relation::CampusDriveFaculties.def(),
            ));
            processors.push(QueryProcessor::filter(
                campus_drive_faculty::Column::FacultyId.eq(faculty_id),
            ));
            processors.push(QueryProcessor::group_by("campus_drives.id"));
        }

        let limit = filter
            .limit
            .unwrap_or(i64::try_from(self.default_page_size).unwrap_or(i64::MAX));
        processors.push(QueryProcessor::paginate(limit, filter.offset, &total));

        let items = self
            .repo
            .get_all_in_order_for_tenant::<CampusDrive>(
                uow,
                tenant,
                &[
                    (campus_drive::Column::CreatedAt, Order::Desc),
                    (campus_drive::Column::Code, Order::Asc),
                ],
                &processors,
            )
            .await?;

        Ok(Page {
            items,
            total: total.get(),
        })
    }

    /// Replace a drive's editable fields, and its faculties when given.
    pub async fn update(
        &self,
        tenant: Uuid,
        actor: Option<Uuid>,
        id: Uuid,
        input: UpdateCampusDrive,
    ) -> Result<CampusDriveAggregate, RepositoryError> {
        let uow = self.repo.begin().await?;
        let result = self.update_in(&uow, tenant, actor, id, input).await;
        uow.finish(result).await
    }

    pub async fn update_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        id: Uuid,
        input: UpdateCampusDrive,
    ) -> Result<CampusDriveAggregate, RepositoryError> {
        let campus_name = required(&input.campus_name, "campus name")?;
        let existing = self
            .repo
            .get_for_tenant::<CampusDrive>(uow, tenant, id, &[])
            .await?;
        self.ensure_campus_name_free(uow, tenant, &campus_name, Some(id))
            .await?;

        let mut drive = existing.into_active_model();
        drive.campus_name = Set(campus_name);
        drive.location = Set(optional(input.location));
        drive.drive_date = Set(input.drive_date);
        drive.updated_by = Set(actor);
        self.repo.update::<CampusDrive>(uow, tenant, drive).await?;

        if let Some(faculty_ids) = &input.faculty_ids {
            self.repo
                .replace_associations::<DriveFaculties>(uow, tenant, id, faculty_ids)
                .await?;
        }

        tracing::info!(parent: uow.span(), %tenant, drive_id = %id, "Campus drive updated");
        self.get_in(uow, tenant, id).await
    }

    /// Soft delete a drive and its company requirements.
    pub async fn delete(
        &self,
        tenant: Uuid,
        actor: Option<Uuid>,
        id: Uuid,
    ) -> Result<(), RepositoryError> {
        let uow = self.repo.begin().await?;
        let result = self.delete_in(&uow, tenant, actor, id).await;
        uow.finish(result).await
    }

    pub async fn delete_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        id: Uuid,
    ) -> Result<(), RepositoryError> {
        let deleted = self
            .repo
            .soft_delete_for_tenant::<CampusDrive>(
                uow,
                tenant,
                actor,
                &[QueryProcessor::filter(campus_drive::Column::Id.eq(id))],
            )
            .await?;
        if deleted == 0 {
            return Err(RepositoryError::NotFound(
                "campus drive not found".to_string(),
            ));
        }

        let requirements = self
            .repo
            .cascade_soft_delete::<CompanyRequirement>(
                uow,
                tenant,
                actor,
                company_requirement::Column::CampusDriveId,
                id,
            )
            .await?;

        tracing::info!(parent: uow.span(), %tenant, drive_id = %id, requirements, "Campus drive deleted");
        Ok(())
    }

    /// Total vacancies and distinct companies, for one drive or the tenant.
    pub async fn vacancy_metrics(
        &self,
        tenant: Uuid,
        drive_id: Option<Uuid>,
    ) -> Result<DriveMetrics, RepositoryError> {
        let uow = self.repo.read_only().await?;
        let result = self.vacancy_metrics_in(&uow, tenant, drive_id).await;
        uow.finish(result).await
    }

    pub async fn vacancy_metrics_in(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        drive_id: Option<Uuid>,
    ) -> Result<DriveMetrics, RepositoryError> {
        let mut processors = vec![QueryProcessor::select([
            "COALESCE(SUM(vacancy), 0) AS total_vacancy",
            "COUNT(DISTINCT company_name) AS company_count",
        ])];
        if let Some(id) = drive_id {
            processors.push(QueryProcessor::filter(
                company_requirement::Column::CampusDriveId.eq(id),
            ));
        }

        let rows = self
            .repo
            .scan_for_tenant::<CompanyRequirement, DriveMetrics>(uow, tenant, &processors)
            .await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    fn registration_link(&self, code: &str) -> Result<String, RepositoryError> {
        self.registration_base
            .join(code)
            .map(|url| url.to_string())
            .map_err(|err| {
                RepositoryError::validation_error(format!(
                    "cannot build registration link for '{code}': {err}"
                ))
            })
    }

    async fn ensure_campus_name_free(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        campus_name: &str,
        except: Option<Uuid>,
    ) -> Result<(), RepositoryError> {
        let mut processors = vec![QueryProcessor::filter(
            campus_drive::Column::CampusName.eq(campus_name),
        )];
        if let Some(id) = except {
            processors.push(QueryProcessor::filter(campus_drive::Column::Id.ne(id)));
        }

        if self
            .repo
            .does_record_exist_for_tenant::<CampusDrive>(uow, tenant, &processors)
            .await?
        {
            return Err(RepositoryError::ConstraintViolation(format!(
                "a campus drive for '{campus_name}' already exists"
            )));
        }
        Ok(())
    }

    async fn add_requirements(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        drive_id: Uuid,
        requirements: Vec<NewCompanyRequirement>,
    ) -> Result<(), RepositoryError> {
        for requirement in requirements {
            if let Some(branch_id) = requirement.branch_id
                && !self
                    .repo
                    .does_record_exist_for_tenant::<Branch>(
                        uow,
                        tenant,
                        &[QueryProcessor::filter(branch::Column::Id.eq(branch_id))],
                    )
                    .await?
            {
                return Err(RepositoryError::NotFound(format!(
                    "branch {branch_id} not found"
                )));
            }

            let row = company_requirement::ActiveModel {
                campus_drive_id: Set(drive_id),
                branch_id: Set(requirement.branch_id),
                company_name: Set(requirement.company_name.trim().to_string()),
                vacancy: Set(requirement.vacancy),
                tenant_id: Set(tenant),
                created_by: Set(actor),
                updated_by: Set(actor),
                ..Default::default()
            };
            self.repo.add::<CompanyRequirement>(uow, row).await?;
        }
        Ok(())
    }
}

fn required(value: &str, field: &str) -> Result<String, RepositoryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(RepositoryError::validation_error(format!(
            "{field} is required"
        )));
    }
    if value.len() > 255 {
        return Err(RepositoryError::validation_error(format!(
            "{field} cannot exceed 255 characters"
        )));
    }
    Ok(value.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_requirement(requirement: &NewCompanyRequirement) -> Result<(), RepositoryError> {
    required(&requirement.company_name, "company name")?;
    if requirement.vacancy < 0 {
        return Err(RepositoryError::validation_error(
            "vacancy cannot be negative",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_bounds() {
        assert_eq!(required("  North Campus ", "campus name").unwrap(), "North Campus");
        assert!(required("   ", "campus name").is_err());
        assert!(required(&"x".repeat(256), "campus name").is_err());
    }

    #[test]
    fn test_optional_drops_blank_values() {
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(Some(" Pune ".to_string())), Some("Pune".to_string()));
        assert_eq!(optional(None), None);
    }

    #[test]
    fn test_negative_vacancy_rejected() {
        let requirement = NewCompanyRequirement {
            company_name: "Acme".to_string(),
            vacancy: -1,
            branch_id: None,
        };
        assert!(validate_requirement(&requirement).is_err());
    }

    #[tokio::test]
    async fn test_registration_link_appends_code() {
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        for base in ["https://campus.example.edu/register", "https://campus.example.edu/register/"] {
            let config = AppConfig {
                registration_base_url: base.to_string(),
                ..Default::default()
            };
            let service = CampusDriveService::new(Repository::new(db.clone()), &config).unwrap();
            assert_eq!(
                service.registration_link("AB12CD34").unwrap(),
                "https://campus.example.edu/register/AB12CD34"
            );
        }

        let config = AppConfig {
            registration_base_url: "https://".to_string(),
            ..Default::default()
        };
        assert!(CampusDriveService::new(Repository::new(db), &config).is_err());
    }

    #[test]
    fn test_preload_paths_known() {
        assert!(preload::validate_paths::<CampusDrive>(&[REQUIREMENT_BRANCH.to_string()]).is_ok());
        assert!(preload::validate_paths::<CampusDrive>(&["students".to_string()]).is_err());
    }
}
