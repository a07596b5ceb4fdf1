mod test_utils;

use campusdesk::error::ErrorKind;
use campusdesk::models::{
    CampusDrive, CampusDriveFaculty, CompanyRequirement, campus_drive, company_requirement,
};
use campusdesk::repositories::{QueryProcessor, Repository};
use campusdesk::services::DriveFaculties;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, Set};
use test_utils::{create_faculty, create_test_tenant, setup_test_db};
use uuid::Uuid;

async fn create_drive(repo: &Repository, tenant: Uuid, campus: &str) -> campus_drive::Model {
    let code = campus.to_uppercase().replace(' ', "");
    let uow = repo.begin().await.unwrap();
    let result = repo
        .add::<CampusDrive>(
            &uow,
            campus_drive::ActiveModel {
                code: Set(code.clone()),
                campus_name: Set(campus.to_string()),
                student_registration_link: Set(format!("https://campus.example.edu/register/{code}")),
                tenant_id: Set(tenant),
                ..Default::default()
            },
        )
        .await;
    uow.finish(result).await.unwrap()
}

#[tokio::test]
async fn replace_diffs_against_current_links() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let drive = create_drive(&repo, tenant, "North").await;
    let rao = create_faculty(&repo, tenant, "Dr. Rao").await.unwrap().id;
    let iyer = create_faculty(&repo, tenant, "Dr. Iyer").await.unwrap().id;
    let menon = create_faculty(&repo, tenant, "Dr. Menon").await.unwrap().id;

    let uow = repo.begin().await.unwrap();

    let change = repo
        .replace_associations::<DriveFaculties>(&uow, tenant, drive.id, &[rao, iyer, rao])
        .await
        .unwrap();
    assert_eq!(change.added, vec![rao, iyer]);
    assert!(change.removed.is_empty());

    // same set again: nothing to do
    let change = repo
        .replace_associations::<DriveFaculties>(&uow, tenant, drive.id, &[iyer, rao])
        .await
        .unwrap();
    assert!(change.is_empty());
    assert_eq!(CampusDriveFaculty::find().count(&uow).await.unwrap(), 2);

    let change = repo
        .replace_associations::<DriveFaculties>(&uow, tenant, drive.id, &[iyer, menon])
        .await
        .unwrap();
    assert_eq!(change.added, vec![menon]);
    assert_eq!(change.removed, vec![rao]);

    let change = repo
        .replace_associations::<DriveFaculties>(&uow, tenant, drive.id, &[])
        .await
        .unwrap();
    assert!(change.added.is_empty());
    assert_eq!(change.removed.len(), 2);
    assert_eq!(CampusDriveFaculty::find().count(&uow).await.unwrap(), 0);

    uow.finish(Ok(())).await.unwrap();
}

#[tokio::test]
async fn replace_rejects_targets_outside_the_tenant() {
    let db = setup_test_db().await.unwrap();
    let tenant_a = create_test_tenant(&db, "Tenant A").await.unwrap();
    let tenant_b = create_test_tenant(&db, "Tenant B").await.unwrap();
    let repo = Repository::new(db);

    let drive = create_drive(&repo, tenant_a, "North").await;
    let own = create_faculty(&repo, tenant_a, "Dr. Rao").await.unwrap().id;
    let foreign = create_faculty(&repo, tenant_b, "Dr. Iyer").await.unwrap().id;

    let uow = repo.begin().await.unwrap();
    repo.replace_associations::<DriveFaculties>(&uow, tenant_a, drive.id, &[own])
        .await
        .unwrap();

    let err = repo
        .replace_associations::<DriveFaculties>(&uow, tenant_a, drive.id, &[own, foreign])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // the failed call changed nothing
    let change = repo
        .replace_associations::<DriveFaculties>(&uow, tenant_a, drive.id, &[own])
        .await
        .unwrap();
    assert!(change.is_empty());

    // the parent must belong to the calling tenant as well
    let err = repo
        .replace_associations::<DriveFaculties>(&uow, tenant_b, drive.id, &[foreign])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    uow.finish(Ok(())).await.unwrap();
}

#[tokio::test]
async fn replace_rejects_soft_deleted_targets() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let drive = create_drive(&repo, tenant, "North").await;
    let faculty = create_faculty(&repo, tenant, "Dr. Rao").await.unwrap();

    let uow = repo.begin().await.unwrap();
    repo.soft_delete_for_tenant::<campusdesk::models::Faculty>(
        &uow,
        tenant,
        None,
        &[QueryProcessor::filter(
            campusdesk::models::faculty::Column::Id.eq(faculty.id),
        )],
    )
    .await
    .unwrap();

    let err = repo
        .replace_associations::<DriveFaculties>(&uow, tenant, drive.id, &[faculty.id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    uow.finish(Ok(())).await.unwrap();
}

#[tokio::test]
async fn cascade_soft_delete_marks_children() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);
    let actor = Uuid::new_v4();

    let north = create_drive(&repo, tenant, "North").await;
    let south = create_drive(&repo, tenant, "South Campus").await;

    let uow = repo.begin().await.unwrap();
    for (drive, company) in [(north.id, "Acme"), (north.id, "Globex"), (south.id, "Initech")] {
        repo.add::<CompanyRequirement>(
            &uow,
            company_requirement::ActiveModel {
                campus_drive_id: Set(drive),
                company_name: Set(company.to_string()),
                vacancy: Set(5),
                tenant_id: Set(tenant),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    let deleted = repo
        .cascade_soft_delete::<CompanyRequirement>(
            &uow,
            tenant,
            Some(actor),
            company_requirement::Column::CampusDriveId,
            north.id,
        )
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining = repo
        .get_all_in_order_for_tenant::<CompanyRequirement>(&uow, tenant, &[], &[])
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].company_name, "Initech");
    uow.finish(Ok(())).await.unwrap();
}
