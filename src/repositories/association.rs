//! # Association Management
//!
//! Many-to-many replacement and has-many cascading soft deletes. Both run
//! inside the caller's unit of work so they commit or roll back with the
//! aggregate update that triggered them.

use std::collections::HashSet;

use sea_orm::{ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QuerySelect};
use uuid::Uuid;

use super::{QueryProcessor, Record, Repository, UnitOfWork};
use crate::error::RepositoryError;

/// A many-to-many relation stored in a link table.
///
/// Link rows are relation state: they carry no soft-delete marker and are
/// inserted and physically deleted by [`Repository::replace_associations`].
pub trait Association {
    type Parent: Record;
    type Target: Record;
    type Link: EntityTrait;

    /// Link column holding the parent id
    fn parent_column() -> <Self::Link as EntityTrait>::Column;

    /// Link column holding the target id
    fn target_column() -> <Self::Link as EntityTrait>::Column;

    fn new_link(
        tenant: Uuid,
        parent: Uuid,
        target: Uuid,
    ) -> <Self::Link as EntityTrait>::ActiveModel;
}

/// Targets linked and unlinked by one replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationChange {
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

impl AssociationChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl Repository {
    /// Make `parent`'s linked targets exactly `targets`.
    ///
    /// The parent and every target must be live rows of `tenant`, otherwise
    /// nothing changes and `NotFound` is returned. Duplicate ids collapse to
    /// one link. Replacing with the current set is a no-op.
    pub async fn replace_associations<A>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        parent: Uuid,
        targets: &[Uuid],
    ) -> Result<AssociationChange, RepositoryError>
    where
        A: Association,
        <A::Link as EntityTrait>::Model:
            IntoActiveModel<<A::Link as EntityTrait>::ActiveModel>,
    {
        uow.ensure_writable()?;

        let parent_filter =
            QueryProcessor::filter(<A::Parent as super::Auditable>::id_column().eq(parent));
        if !self
            .does_record_exist_for_tenant::<A::Parent>(uow, tenant, &[parent_filter])
            .await?
        {
            return Err(RepositoryError::NotFound(format!(
                "parent record {parent} not found"
            )));
        }

        let mut seen = HashSet::new();
        let desired: Vec<Uuid> = targets
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if !desired.is_empty() {
            let target_filter = QueryProcessor::filter(
                <A::Target as super::Auditable>::id_column().is_in(desired.iter().copied()),
            );
            let found = self
                .get_count_for_tenant::<A::Target>(uow, tenant, &[target_filter])
                .await?;
            if found != desired.len() as u64 {
                return Err(RepositoryError::NotFound(format!(
                    "{} of {} associated records not found",
                    desired.len() as u64 - found.min(desired.len() as u64),
                    desired.len()
                )));
            }
        }

        let current: Vec<Uuid> = A::Link::find()
            .select_only()
            .column(A::target_column())
            .filter(A::parent_column().eq(parent))
            .into_tuple::<Uuid>()
            .all(uow)
            .await
            .map_err(RepositoryError::database_error)?;

        let current_set: HashSet<Uuid> = current.iter().copied().collect();
        let desired_set: HashSet<Uuid> = desired.iter().copied().collect();

        let removed: Vec<Uuid> = current
            .into_iter()
            .filter(|id| !desired_set.contains(id))
            .collect();
        let added: Vec<Uuid> = desired
            .into_iter()
            .filter(|id| !current_set.contains(id))
            .collect();

        if !removed.is_empty() {
            A::Link::delete_many()
                .filter(A::parent_column().eq(parent))
                .filter(A::target_column().is_in(removed.iter().copied()))
                .exec(uow)
                .await
                .map_err(RepositoryError::database_error)?;
        }

        if !added.is_empty() {
            let links = added
                .iter()
                .map(|target| A::new_link(tenant, parent, *target));
            A::Link::insert_many(links)
                .exec_without_returning(uow)
                .await
                .map_err(RepositoryError::database_error)?;
        }

        tracing::debug!(
            parent: &self.span,
            %tenant,
            parent_id = %parent,
            added = added.len(),
            removed = removed.len(),
            "Associations replaced"
        );

        Ok(AssociationChange { added, removed })
    }

    /// Soft delete every live child of `tenant` whose `foreign_key` is `parent`.
    pub async fn cascade_soft_delete<C>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        foreign_key: C::Column,
        parent: Uuid,
    ) -> Result<u64, RepositoryError>
    where
        C: Record,
    {
        self.soft_delete_for_tenant::<C>(
            uow,
            tenant,
            actor,
            &[QueryProcessor::filter(foreign_key.eq(parent))],
        )
        .await
    }
}
