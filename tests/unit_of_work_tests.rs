mod test_utils;

use campusdesk::error::{ErrorKind, RepositoryError};
use campusdesk::models::{Faculty, faculty};
use campusdesk::repositories::{Repository, UnitOfWork, UnitOfWorkState};
use sea_orm::{ConnectionTrait, Set};
use test_utils::{create_test_tenant, setup_test_db};
use uuid::Uuid;

async fn add_faculty(
    repo: &Repository,
    uow: &UnitOfWork,
    tenant: Uuid,
    name: &str,
) -> Result<faculty::Model, RepositoryError> {
    repo.add::<Faculty>(
        uow,
        faculty::ActiveModel {
            name: Set(name.to_string()),
            tenant_id: Set(tenant),
            ..Default::default()
        },
    )
    .await
}

async fn faculty_count(repo: &Repository, tenant: Uuid) -> u64 {
    let uow = repo.read_only().await.unwrap();
    let count = repo.get_count_for_tenant::<Faculty>(&uow, tenant, &[]).await;
    uow.finish(count).await.unwrap()
}

#[tokio::test]
async fn commit_persists_writes() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let mut uow = repo.begin().await.unwrap();
    assert_eq!(uow.state(), UnitOfWorkState::Active);
    add_faculty(&repo, &uow, tenant, "Dr. Rao").await.unwrap();
    uow.commit().await.unwrap();
    assert_eq!(uow.state(), UnitOfWorkState::Committed);

    assert_eq!(faculty_count(&repo, tenant).await, 1);
}

#[tokio::test]
async fn rollback_discards_writes_and_is_idempotent() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let mut uow = repo.begin().await.unwrap();
    add_faculty(&repo, &uow, tenant, "Dr. Rao").await.unwrap();
    uow.rollback().await.unwrap();
    uow.rollback().await.unwrap();
    assert_eq!(uow.state(), UnitOfWorkState::RolledBack);

    let err = uow.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUnitOfWorkState);
    drop(uow);

    assert_eq!(faculty_count(&repo, tenant).await, 0);
}

#[tokio::test]
async fn second_commit_fails() {
    let db = setup_test_db().await.unwrap();
    let repo = Repository::new(db);

    let mut uow = repo.begin().await.unwrap();
    uow.commit().await.unwrap();

    let err = uow.commit().await.unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidUnitOfWorkState(_)));
    // rollback after commit is a no-op
    uow.rollback().await.unwrap();
    assert_eq!(uow.state(), UnitOfWorkState::Committed);
}

#[tokio::test]
async fn dropping_active_unit_of_work_rolls_back() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    {
        let uow = repo.begin().await.unwrap();
        add_faculty(&repo, &uow, tenant, "Dr. Rao").await.unwrap();
    }

    assert_eq!(faculty_count(&repo, tenant).await, 0);
}

#[tokio::test]
async fn finish_rolls_back_on_error() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let uow = repo.begin().await.unwrap();
    let result = async {
        add_faculty(&repo, &uow, tenant, "Dr. Rao").await?;
        add_faculty(&repo, &uow, tenant, "Dr. Iyer").await?;
        Err::<(), _>(RepositoryError::validation_error("second step failed"))
    }
    .await;

    let err = uow.finish(result).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert_eq!(faculty_count(&repo, tenant).await, 0);
}

#[tokio::test]
async fn read_only_unit_of_work_rejects_writes() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let uow = repo.read_only().await.unwrap();
    assert!(uow.is_read_only());

    let err = add_faculty(&repo, &uow, tenant, "Dr. Rao")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUnitOfWorkState);

    let raw = uow
        .execute_unprepared("DELETE FROM faculties")
        .await
        .unwrap_err();
    assert_eq!(
        RepositoryError::database_error(raw).kind(),
        ErrorKind::InvalidUnitOfWorkState
    );

    // reads are fine
    assert_eq!(
        repo.get_count_for_tenant::<Faculty>(&uow, tenant, &[])
            .await
            .unwrap(),
        0
    );
    uow.finish(Ok(())).await.unwrap();
}

#[tokio::test]
async fn completed_unit_of_work_rejects_statements() {
    let db = setup_test_db().await.unwrap();
    let tenant = create_test_tenant(&db, "Tenant A").await.unwrap();
    let repo = Repository::new(db);

    let mut uow = repo.begin().await.unwrap();
    uow.commit().await.unwrap();

    let err = repo
        .get_count_for_tenant::<Faculty>(&uow, tenant, &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUnitOfWorkState);

    let err = add_faculty(&repo, &uow, tenant, "Dr. Rao")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidUnitOfWorkState);
}
