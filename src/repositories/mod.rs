//! # Repository Layer
//!
//! The generic data-access facade. Every operation borrows a [`UnitOfWork`],
//! scopes rows to a tenant where asked, hides soft-deleted rows unless a
//! caller passes `QueryProcessor::IncludeDeleted`, and applies the caller's
//! processors. Repositories never commit or roll back; services own that.

pub mod association;
pub mod preload;
pub mod query;
pub mod record;
pub mod tenant;
pub mod unique_code;
pub mod unit_of_work;

pub use association::{Association, AssociationChange};
pub use preload::Preloadable;
pub use query::{ProcessorKind, QueryProcessor, TotalCount};
pub use record::{Auditable, Record, SoftDeletable, TenantScoped};
pub use tenant::{CreateTenantRequest, TenantRepository};
pub use unit_of_work::{UnitOfWork, UnitOfWorkState};

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Alias, Expr, Order, Query, ValueType};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, FromQueryResult, IdenStatic, IntoActiveModel, QueryFilter, QueryOrder,
    QueryTrait, Select, Value,
};
use tracing::Span;
use uuid::Uuid;

use crate::error::RepositoryError;
use query::{Pipeline, accepts, count_rows};

/// Generic repository over any entity implementing the record contracts.
#[derive(Debug, Clone)]
pub struct Repository {
    db: DatabaseConnection,
    span: Span,
}

impl Repository {
    /// Create a repository over the given connection pool
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            span: tracing::debug_span!("repository"),
        }
    }

    /// Emit this repository's events (and its units of work) under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Begin a write-mode unit of work (a database transaction).
    pub async fn begin(&self) -> Result<UnitOfWork, RepositoryError> {
        UnitOfWork::begin(&self.db, false, &self.span).await
    }

    /// Begin a read-only unit of work over the shared pool.
    pub async fn read_only(&self) -> Result<UnitOfWork, RepositoryError> {
        UnitOfWork::begin(&self.db, true, &self.span).await
    }

    /// Insert a record, generating its id when unset and stamping
    /// `created_at`/`updated_at`. Returns the stored row.
    pub async fn add<E>(
        &self,
        uow: &UnitOfWork,
        mut model: E::ActiveModel,
    ) -> Result<E::Model, RepositoryError>
    where
        E: Auditable,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        uow.ensure_writable()?;

        let id = match model.get(E::id_column()) {
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => uuid_value(value)?,
            ActiveValue::NotSet => {
                let id = Uuid::new_v4();
                model.set(E::id_column(), id.into());
                id
            }
        };

        let now = now();
        model.set(E::created_at_column(), now.into());
        model.set(E::updated_at_column(), now.into());

        E::insert(model)
            .exec_without_returning(uow)
            .await
            .map_err(RepositoryError::database_error)?;

        tracing::debug!(parent: &self.span, table = table_name::<E>(), %id, "Record added");

        E::find()
            .filter(E::id_column().eq(id))
            .one(uow)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(RepositoryError::not_found)
    }

    /// Full-row update by primary key, limited to `tenant`'s live rows.
    ///
    /// Creation stamps and the soft-delete marker are never overwritten;
    /// moving a row to another tenant is rejected.
    pub async fn update<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        model: E::ActiveModel,
    ) -> Result<E::Model, RepositoryError>
    where
        E: Record,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        uow.ensure_writable()?;

        if let ActiveValue::Set(value) | ActiveValue::Unchanged(value) =
            model.get(E::tenant_column())
            && uuid_value(value)? != tenant
        {
            return Err(RepositoryError::validation_error(
                "a record cannot be moved to another tenant",
            ));
        }

        let mut model = model.reset_all();
        for column in [
            E::tenant_column(),
            E::created_at_column(),
            E::created_by_column(),
            E::deleted_at_column(),
            E::deleted_by_column(),
        ] {
            model.not_set(column);
        }
        model.set(E::updated_at_column(), now().into());

        let updated = E::update(model)
            .filter(E::tenant_column().eq(tenant))
            .filter(E::deleted_at_column().is_null())
            .exec(uow)
            .await
            .map_err(|err| match RepositoryError::database_error(err) {
                RepositoryError::NotFound(_) => RepositoryError::not_found(),
                other => other,
            })?;

        tracing::debug!(parent: &self.span, table = table_name::<E>(), %tenant, "Record updated");
        Ok(updated)
    }

    /// Insert when the primary key is unset, otherwise update the tenant's
    /// row, inserting if no row with that id exists at all. Associations
    /// are untouched; they change only through `replace_associations`.
    pub async fn save<E>(
        &self,
        uow: &UnitOfWork,
        model: E::ActiveModel,
    ) -> Result<E::Model, RepositoryError>
    where
        E: Record,
        E::Model: IntoActiveModel<E::ActiveModel>,
    {
        let id = match model.get(E::id_column()) {
            ActiveValue::NotSet => return self.add::<E>(uow, model).await,
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => uuid_value(value)?,
        };
        let tenant = match model.get(E::tenant_column()) {
            ActiveValue::Set(value) | ActiveValue::Unchanged(value) => uuid_value(value)?,
            ActiveValue::NotSet => {
                return Err(RepositoryError::validation_error(
                    "tenant must be set to save a record",
                ));
            }
        };

        match self.update::<E>(uow, tenant, model.clone()).await {
            Err(RepositoryError::NotFound(_)) => {
                let existing = E::find()
                    .filter(E::id_column().eq(id))
                    .one(uow)
                    .await
                    .map_err(RepositoryError::database_error)?;
                match existing {
                    None => self.add::<E>(uow, model).await,
                    Some(row) if E::tenant_id(&row) != tenant => Err(RepositoryError::not_found()),
                    Some(row) if E::is_deleted(&row) => Err(RepositoryError::NotFound(format!(
                        "record {id} is deleted"
                    ))),
                    Some(_) => Err(RepositoryError::not_found()),
                }
            }
            result => result,
        }
    }

    /// Set `fields` on every live row matching the filters; returns rows affected.
    pub async fn update_with_map<E>(
        &self,
        uow: &UnitOfWork,
        fields: &[(E::Column, Value)],
        processors: &[QueryProcessor],
    ) -> Result<u64, RepositoryError>
    where
        E: Auditable + SoftDeletable,
    {
        self.update_columns::<E>(uow, None, fields, processors, "update_with_map")
            .await
    }

    /// [`Repository::update_with_map`] limited to `tenant`'s rows.
    pub async fn update_with_map_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        fields: &[(E::Column, Value)],
        processors: &[QueryProcessor],
    ) -> Result<u64, RepositoryError>
    where
        E: Record,
    {
        let scope = Condition::all().add(E::tenant_column().eq(tenant));
        self.update_columns::<E>(
            uow,
            Some(scope),
            fields,
            processors,
            "update_with_map_for_tenant",
        )
        .await
    }

    /// Stamp `deleted_at`/`deleted_by` on the tenant's rows matching the
    /// filters. At least one non-empty filter is required.
    pub async fn soft_delete_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        actor: Option<Uuid>,
        processors: &[QueryProcessor],
    ) -> Result<u64, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::WRITE, "soft_delete_for_tenant")?;
        if !pipeline.restricts_rows() {
            return Err(RepositoryError::validation_error(
                "soft delete requires at least one filter",
            ));
        }

        let fields = [
            (E::deleted_at_column(), Value::from(now())),
            (E::deleted_by_column(), Value::from(actor)),
            (E::updated_by_column(), Value::from(actor)),
        ];
        let affected = self
            .update_with_map_for_tenant::<E>(uow, tenant, &fields, processors)
            .await?;

        tracing::debug!(
            parent: &self.span,
            table = table_name::<E>(),
            %tenant,
            affected,
            "Records soft deleted"
        );
        Ok(affected)
    }

    /// Exactly one live row of `tenant` with primary key `id`.
    pub async fn get_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<E::Model, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::SINGLE, "get_for_tenant")?;
        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline)
            .add(E::id_column().eq(id));
        self.fetch_one::<E>(uow, scope, &pipeline).await
    }

    /// The first live row of `tenant` matching the filters.
    pub async fn get_record_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<E::Model, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::SINGLE, "get_record_for_tenant")?;
        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline);
        self.fetch_one::<E>(uow, scope, &pipeline).await
    }

    /// Live rows across tenants, ordered, with every processor applied.
    pub async fn get_all_in_order<E>(
        &self,
        uow: &UnitOfWork,
        order: &[(E::Column, Order)],
        processors: &[QueryProcessor],
    ) -> Result<Vec<E::Model>, RepositoryError>
    where
        E: SoftDeletable,
    {
        let pipeline = Pipeline::new(processors, accepts::LIST, "get_all_in_order")?;
        let scope = soft_delete_scope::<E>(&entity_alias::<E>(), &pipeline);
        self.fetch_all::<E>(uow, scope, order, &pipeline).await
    }

    /// [`Repository::get_all_in_order`] limited to `tenant`.
    pub async fn get_all_in_order_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        order: &[(E::Column, Order)],
        processors: &[QueryProcessor],
    ) -> Result<Vec<E::Model>, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::LIST, "get_all_in_order_for_tenant")?;
        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline);
        self.fetch_all::<E>(uow, scope, order, &pipeline).await
    }

    /// Tenant rows with the associations named by `QueryProcessor::Preload` loaded.
    pub async fn get_all_preloaded_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        order: &[(E::Column, Order)],
        processors: &[QueryProcessor],
    ) -> Result<Vec<E::Loaded>, RepositoryError>
    where
        E: Record + Preloadable,
    {
        let pipeline = Pipeline::new(
            processors,
            accepts::PRELOADED_LIST,
            "get_all_preloaded_for_tenant",
        )?;
        let paths = pipeline.preload_paths();
        preload::validate_paths::<E>(&paths)?;

        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline);
        let models = self.fetch_all::<E>(uow, scope, order, &pipeline).await?;
        E::preload(uow, models, &paths).await
    }

    /// Number of live rows matching the filters, across tenants.
    pub async fn get_count<E>(
        &self,
        uow: &UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<u64, RepositoryError>
    where
        E: SoftDeletable,
    {
        let pipeline = Pipeline::new(processors, accepts::COUNT, "get_count")?;
        let scope = soft_delete_scope::<E>(&entity_alias::<E>(), &pipeline);
        let select = self.scoped_select::<E>(uow, scope, &pipeline)?;
        count_rows(uow, select.into_query()).await
    }

    /// [`Repository::get_count`] limited to `tenant`.
    pub async fn get_count_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<u64, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::COUNT, "get_count_for_tenant")?;
        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline);
        let select = self.scoped_select::<E>(uow, scope, &pipeline)?;
        count_rows(uow, select.into_query()).await
    }

    /// True iff `get_count` with the same processors is positive.
    pub async fn does_record_exist<E>(
        &self,
        uow: &UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<bool, RepositoryError>
    where
        E: SoftDeletable,
    {
        let pipeline = Pipeline::new(processors, accepts::COUNT, "does_record_exist")?;
        let scope = soft_delete_scope::<E>(&entity_alias::<E>(), &pipeline);
        let select = self.scoped_select::<E>(uow, scope, &pipeline)?;
        exists(uow, select).await
    }

    /// [`Repository::does_record_exist`] limited to `tenant`.
    pub async fn does_record_exist_for_tenant<E>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<bool, RepositoryError>
    where
        E: Record,
    {
        let pipeline = Pipeline::new(processors, accepts::COUNT, "does_record_exist_for_tenant")?;
        let scope = tenant_scope::<E>(&entity_alias::<E>(), tenant, &pipeline);
        let select = self.scoped_select::<E>(uow, scope, &pipeline)?;
        exists(uow, select).await
    }

    /// Aggregate query over `E`'s table (or a `Table` override) mapped into `M`.
    pub async fn scan<E, M>(
        &self,
        uow: &UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<Vec<M>, RepositoryError>
    where
        E: SoftDeletable,
        M: FromQueryResult,
    {
        let pipeline = Pipeline::new(processors, accepts::SCAN, "scan")?;
        let table = scan_table::<E>(&pipeline)?;
        let scope = soft_delete_scope::<E>(&table, &pipeline);
        self.run_scan::<M>(uow, table, scope, &pipeline).await
    }

    /// [`Repository::scan`] limited to `tenant`.
    pub async fn scan_for_tenant<E, M>(
        &self,
        uow: &UnitOfWork,
        tenant: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<Vec<M>, RepositoryError>
    where
        E: Record,
        M: FromQueryResult,
    {
        let pipeline = Pipeline::new(processors, accepts::SCAN, "scan_for_tenant")?;
        let table = scan_table::<E>(&pipeline)?;
        let scope = tenant_scope::<E>(&table, tenant, &pipeline);
        self.run_scan::<M>(uow, table, scope, &pipeline).await
    }

    async fn update_columns<E>(
        &self,
        uow: &UnitOfWork,
        scope: Option<Condition>,
        fields: &[(E::Column, Value)],
        processors: &[QueryProcessor],
        operation: &str,
    ) -> Result<u64, RepositoryError>
    where
        E: Auditable + SoftDeletable,
    {
        uow.ensure_writable()?;
        if fields.is_empty() {
            return Err(RepositoryError::validation_error(format!(
                "{operation} needs at least one field"
            )));
        }

        let pipeline = Pipeline::new(processors, accepts::WRITE, operation)?;
        let mut condition = pipeline.condition(uow.get_database_backend())?;
        if !pipeline.include_deleted() {
            condition = condition.add(E::deleted_at_column().is_null());
        }
        if let Some(scope) = scope {
            condition = condition.add(scope);
        }

        let updated_at = E::updated_at_column();
        let mut update = E::update_many();
        for (column, value) in fields {
            update = update.col_expr(*column, Expr::value(value.clone()));
        }
        if !fields
            .iter()
            .any(|(column, _)| column.as_str() == updated_at.as_str())
        {
            update = update.col_expr(updated_at, Expr::value(now()));
        }

        let result = update
            .filter(condition)
            .exec(uow)
            .await
            .map_err(RepositoryError::database_error)?;
        Ok(result.rows_affected)
    }

    fn scoped_select<E>(
        &self,
        uow: &UnitOfWork,
        scope: Condition,
        pipeline: &Pipeline<'_>,
    ) -> Result<Select<E>, RepositoryError>
    where
        E: EntityTrait,
    {
        uow.ensure_active()?;
        let mut select = E::find().filter(scope);
        pipeline.apply(QueryTrait::query(&mut select), uow.get_database_backend())?;
        Ok(select)
    }

    async fn fetch_one<E>(
        &self,
        uow: &UnitOfWork,
        scope: Condition,
        pipeline: &Pipeline<'_>,
    ) -> Result<E::Model, RepositoryError>
    where
        E: EntityTrait,
    {
        self.scoped_select::<E>(uow, scope, pipeline)?
            .one(uow)
            .await
            .map_err(RepositoryError::database_error)?
            .ok_or_else(RepositoryError::not_found)
    }

    async fn fetch_all<E>(
        &self,
        uow: &UnitOfWork,
        scope: Condition,
        order: &[(E::Column, Order)],
        pipeline: &Pipeline<'_>,
    ) -> Result<Vec<E::Model>, RepositoryError>
    where
        E: EntityTrait,
    {
        let mut select = self.scoped_select::<E>(uow, scope, pipeline)?;
        for (column, direction) in order {
            select = select.order_by(*column, direction.clone());
        }
        pipeline
            .paginate(uow, QueryTrait::query(&mut select))
            .await?;

        select
            .all(uow)
            .await
            .map_err(RepositoryError::database_error)
    }

    async fn run_scan<M>(
        &self,
        uow: &UnitOfWork,
        table: Alias,
        scope: Condition,
        pipeline: &Pipeline<'_>,
    ) -> Result<Vec<M>, RepositoryError>
    where
        M: FromQueryResult,
    {
        uow.ensure_active()?;
        let backend = uow.get_database_backend();

        let mut stmt = Query::select();
        stmt.expr(Expr::cust("*")).from(table).cond_where(scope);
        pipeline.apply(&mut stmt, backend)?;

        M::find_by_statement(backend.build(&stmt))
            .all(uow)
            .await
            .map_err(RepositoryError::database_error)
    }
}

async fn exists<E: EntityTrait>(uow: &UnitOfWork, mut select: Select<E>) -> Result<bool, RepositoryError> {
    QueryTrait::query(&mut select).limit(1);
    Ok(count_rows(uow, select.into_query()).await? > 0)
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn uuid_value(value: Value) -> Result<Uuid, RepositoryError> {
    <Uuid as ValueType>::try_from(value)
        .map_err(|_| RepositoryError::validation_error("identifier must be a UUID"))
}

fn table_name<E: EntityTrait>() -> String {
    E::default().table_name().to_string()
}

fn entity_alias<E: EntityTrait>() -> Alias {
    Alias::new(table_name::<E>())
}

fn scan_table<E: EntityTrait>(pipeline: &Pipeline<'_>) -> Result<Alias, RepositoryError> {
    match pipeline.table_override() {
        Some(name) if query::is_identifier(name) => Ok(Alias::new(name)),
        Some(name) => Err(RepositoryError::validation_error(format!(
            "invalid table name '{name}'"
        ))),
        None => Ok(entity_alias::<E>()),
    }
}

/// `deleted_at IS NULL` on `table` unless the pipeline includes deleted rows.
fn soft_delete_scope<E: SoftDeletable>(table: &Alias, pipeline: &Pipeline<'_>) -> Condition {
    let condition = Condition::all();
    if pipeline.include_deleted() {
        condition
    } else {
        condition.add(Expr::col((table.clone(), E::deleted_at_column())).is_null())
    }
}

fn tenant_scope<E: Record>(table: &Alias, tenant: Uuid, pipeline: &Pipeline<'_>) -> Condition {
    soft_delete_scope::<E>(table, pipeline)
        .add(Expr::col((table.clone(), E::tenant_column())).eq(tenant))
}
