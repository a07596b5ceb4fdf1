//! Per-tenant unique code generation.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sea_orm::ColumnTrait;
use uuid::Uuid;

use super::{QueryProcessor, Record, Repository, UnitOfWork};
use crate::config::UniqueCodeConfig;
use crate::error::RepositoryError;

/// Random uppercase alphanumeric code of `length` characters.
pub fn random_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|byte| char::from(byte).to_ascii_uppercase())
        .collect()
}

impl Repository {
    /// Draw codes until one is unused by any of `tenant`'s rows in `column`,
    /// soft-deleted rows included.
    ///
    /// A concurrent writer can still claim the same code before commit; the
    /// unique index on `(tenant_id, code)` then fails the insert with
    /// `ConstraintViolation`.
    pub async fn generate_unique_code<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        column: E::Column,
        config: &UniqueCodeConfig,
    ) -> Result<String, RepositoryError>
    where
        E: Record,
    {
        for attempt in 1..=config.max_attempts {
            let code = random_code(config.length);
            let taken = self
                .does_record_exist_for_tenant::<E>(
                    uow,
                    tenant,
                    &[
                        QueryProcessor::filter(column.eq(code.as_str())),
                        QueryProcessor::include_deleted(),
                    ],
                )
                .await?;

            if !taken {
                metrics::histogram!("unique_code_attempts").record(f64::from(attempt));
                return Ok(code);
            }
            tracing::debug!(parent: &self.span, %tenant, attempt, "Generated code already taken");
        }

        metrics::histogram!("unique_code_attempts").record(f64::from(config.max_attempts));
        tracing::warn!(
            parent: &self.span,
            %tenant,
            attempts = config.max_attempts,
            "Unique code generation exhausted"
        );
        Err(RepositoryError::ConstraintViolation(format!(
            "no unused code found after {} attempts",
            config.max_attempts
        )))
    }
}
