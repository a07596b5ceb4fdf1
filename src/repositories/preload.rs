//! Eager loading of named associations.
//!
//! Each path segment costs one batched `IN (...)` query over the ids of the
//! rows already loaded; results are mapped back onto the parents in memory.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use super::{SoftDeletable, UnitOfWork};
use crate::error::RepositoryError;

/// Entity whose rows can be returned as aggregates with associations loaded.
#[async_trait::async_trait]
pub trait Preloadable: EntityTrait {
    /// Aggregate type produced by [`Preloadable::preload`]
    type Loaded: Send;

    /// Association paths this entity understands; nested segments are
    /// dot-separated (`company_requirements.branch`).
    const PATHS: &'static [&'static str];

    /// Wrap `models` and load the requested `paths` onto them, preserving order.
    async fn preload(
        uow: &UnitOfWork,
        models: Vec<Self::Model>,
        paths: &[String],
    ) -> Result<Vec<Self::Loaded>, RepositoryError>;
}

/// Reject paths the entity does not know before any query runs.
pub(crate) fn validate_paths<E: Preloadable>(paths: &[String]) -> Result<(), RepositoryError> {
    match paths.iter().find(|path| !E::PATHS.contains(&path.as_str())) {
        Some(unknown) => Err(RepositoryError::validation_error(format!(
            "unknown association '{unknown}'"
        ))),
        None => Ok(()),
    }
}

/// True if `path` or any path nested under it was requested.
pub fn wants(paths: &[String], path: &str) -> bool {
    paths.iter().any(|requested| {
        requested == path
            || requested
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

/// Live rows of `T` whose `column` is one of `ids`, in one query.
pub async fn load_live<T>(
    uow: &UnitOfWork,
    column: T::Column,
    ids: &[Uuid],
) -> Result<Vec<T::Model>, RepositoryError>
where
    T: SoftDeletable,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    T::find()
        .filter(column.is_in(ids.iter().copied()))
        .filter(T::deleted_at_column().is_null())
        .all(uow)
        .await
        .map_err(RepositoryError::database_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_nested_path_implies_parent_segment() {
        let requested = paths(&["company_requirements.branch"]);
        assert!(wants(&requested, "company_requirements"));
        assert!(wants(&requested, "company_requirements.branch"));
        assert!(!wants(&requested, "faculties"));
    }

    #[test]
    fn test_prefix_without_separator_does_not_match() {
        let requested = paths(&["faculties_archive"]);
        assert!(!wants(&requested, "faculties"));
    }
}
