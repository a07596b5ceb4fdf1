//! # Query Processors
//!
//! Composable, deferred query modifications. Callers build a slice of
//! [`QueryProcessor`]s inline and hand it to a repository operation, which
//! validates the kinds it accepts and applies them to its statement in order.
//! `Paginate` always runs last, after every filter and join is in place.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use sea_orm::sea_query::{
    Alias, ColumnRef, DynIden, Expr, IntoCondition, JoinType, Query,
    SelectStatement, SimpleExpr, TableRef,
};
use sea_orm::{Condition, ConnectionTrait, DbBackend, Identity, RelationDef, Value};

use crate::error::RepositoryError;
use crate::repositories::unit_of_work::UnitOfWork;

/// Shared output slot `Paginate` writes the unpaginated row count into.
#[derive(Debug, Clone, Default)]
pub struct TotalCount(Arc<AtomicU64>);

impl TotalCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total written by the last paginated query (0 before any query ran)
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, total: u64) {
        self.0.store(total, Ordering::SeqCst);
    }
}

/// The kinds of processor an operation can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorKind {
    Filter,
    Join,
    Paginate,
    GroupBy,
    Select,
    Table,
    Preload,
    IncludeDeleted,
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessorKind::Filter => "Filter",
            ProcessorKind::Join => "Join",
            ProcessorKind::Paginate => "Paginate",
            ProcessorKind::GroupBy => "GroupBy",
            ProcessorKind::Select => "Select",
            ProcessorKind::Table => "Table",
            ProcessorKind::Preload => "PreloadAssociations",
            ProcessorKind::IncludeDeleted => "IncludeDeleted",
        };
        f.write_str(name)
    }
}

/// One piece of query intent.
#[derive(Debug)]
pub enum QueryProcessor {
    /// Typed WHERE condition, ANDed with the rest
    Filter(Condition),
    /// Raw WHERE fragment with `?` placeholders bound to `values`
    RawFilter { sql: String, values: Vec<Value> },
    /// JOIN against `table` with a raw ON clause
    Join {
        join_type: JoinType,
        table: String,
        on: String,
    },
    /// JOIN along a typed entity relation
    JoinRelated {
        join_type: JoinType,
        relation: RelationDef,
    },
    /// LIMIT/OFFSET after counting every matching row into `total`
    Paginate {
        limit: i64,
        offset: i64,
        total: TotalCount,
    },
    GroupBy(String),
    /// Replace the selected columns (aggregate scans)
    Select(Vec<String>),
    /// Replace the source table (aggregate scans)
    Table(String),
    /// Association paths to load eagerly, dotted for nested relations
    Preload(Vec<String>),
    /// Opt out of the soft-delete filter
    IncludeDeleted,
    /// No-op
    Identity,
}

impl QueryProcessor {
    pub fn filter<C: IntoCondition>(condition: C) -> Self {
        Self::Filter(condition.into_condition())
    }

    /// Raw WHERE fragment. Placeholders are `?`; they are renumbered for
    /// backends that need it and must match `values` one to one.
    pub fn raw_filter<S, I, V>(sql: S, values: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::RawFilter {
            sql: sql.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// One composite clause: `columns[i] conditions[i] ?` bound to
    /// `values[i]`, joined to clause `i + 1` by `operators[i]`.
    ///
    /// `operators` may hold one entry per clause (the last is ignored) or one
    /// fewer. Empty input yields [`QueryProcessor::Identity`].
    pub fn filter_with_operator(
        columns: &[&str],
        conditions: &[&str],
        operators: &[&str],
        values: Vec<Value>,
    ) -> Result<Self, RepositoryError> {
        if columns.is_empty() && conditions.is_empty() && values.is_empty() {
            return Ok(Self::Identity);
        }

        let clauses = columns.len();
        if conditions.len() != clauses || values.len() != clauses {
            return Err(RepositoryError::validation_error(format!(
                "filter has {} columns, {} conditions and {} values",
                clauses,
                conditions.len(),
                values.len()
            )));
        }
        if operators.len() != clauses && operators.len() + 1 != clauses {
            return Err(RepositoryError::validation_error(format!(
                "filter with {} clauses needs {} or {} operators, got {}",
                clauses,
                clauses.saturating_sub(1),
                clauses,
                operators.len()
            )));
        }

        let mut sql = String::from("(");
        for (index, (column, condition)) in columns.iter().zip(conditions).enumerate() {
            if !is_identifier(column) {
                return Err(RepositoryError::validation_error(format!(
                    "invalid column name '{column}'"
                )));
            }
            let condition = normalize_condition(condition)?;
            sql.push_str(&format!("{column} {condition} ?"));

            if index + 1 < clauses {
                let operator = operators[index].trim().to_ascii_uppercase();
                if operator != "AND" && operator != "OR" {
                    return Err(RepositoryError::validation_error(format!(
                        "unknown operator '{}'",
                        operators[index]
                    )));
                }
                sql.push_str(&format!(" {operator} "));
            }
        }
        sql.push(')');

        Ok(Self::RawFilter { sql, values })
    }

    pub fn join<T: Into<String>, O: Into<String>>(join_type: JoinType, table: T, on: O) -> Self {
        Self::Join {
            join_type,
            table: table.into(),
            on: on.into(),
        }
    }

    pub fn join_related(join_type: JoinType, relation: RelationDef) -> Self {
        Self::JoinRelated {
            join_type,
            relation,
        }
    }

    /// `limit <= 0` skips LIMIT/OFFSET; `total` is written either way.
    pub fn paginate(limit: i64, offset: i64, total: &TotalCount) -> Self {
        Self::Paginate {
            limit,
            offset,
            total: total.clone(),
        }
    }

    pub fn group_by<S: Into<String>>(expr: S) -> Self {
        Self::GroupBy(expr.into())
    }

    pub fn select<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Select(columns.into_iter().map(Into::into).collect())
    }

    pub fn table<S: Into<String>>(name: S) -> Self {
        Self::Table(name.into())
    }

    pub fn preload<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Preload(paths.into_iter().map(Into::into).collect())
    }

    pub fn include_deleted() -> Self {
        Self::IncludeDeleted
    }

    /// Kind used for per-operation validation; `None` for the identity.
    pub fn kind(&self) -> Option<ProcessorKind> {
        match self {
            Self::Filter(_) | Self::RawFilter { .. } => Some(ProcessorKind::Filter),
            Self::Join { .. } | Self::JoinRelated { .. } => Some(ProcessorKind::Join),
            Self::Paginate { .. } => Some(ProcessorKind::Paginate),
            Self::GroupBy(_) => Some(ProcessorKind::GroupBy),
            Self::Select(_) => Some(ProcessorKind::Select),
            Self::Table(_) => Some(ProcessorKind::Table),
            Self::Preload(_) => Some(ProcessorKind::Preload),
            Self::IncludeDeleted => Some(ProcessorKind::IncludeDeleted),
            Self::Identity => None,
        }
    }
}

/// Processor kinds accepted by each family of repository operations.
pub(crate) mod accepts {
    use super::ProcessorKind::{self, *};

    pub const WRITE: &[ProcessorKind] = &[Filter, IncludeDeleted];
    pub const SINGLE: &[ProcessorKind] = &[Filter, Join, GroupBy, IncludeDeleted];
    pub const COUNT: &[ProcessorKind] = &[Filter, Join, GroupBy, IncludeDeleted];
    pub const LIST: &[ProcessorKind] = &[Filter, Join, GroupBy, Paginate, IncludeDeleted];
    pub const PRELOADED_LIST: &[ProcessorKind] =
        &[Filter, Join, GroupBy, Paginate, Preload, IncludeDeleted];
    pub const SCAN: &[ProcessorKind] = &[Filter, Join, GroupBy, Select, Table, IncludeDeleted];
}

/// A validated processor slice, ready to apply to one operation's statement.
pub(crate) struct Pipeline<'a> {
    processors: &'a [QueryProcessor],
}

impl<'a> Pipeline<'a> {
    /// Reject processor kinds `operation` does not accept and a second `Paginate`.
    pub fn new(
        processors: &'a [QueryProcessor],
        accepted: &[ProcessorKind],
        operation: &str,
    ) -> Result<Self, RepositoryError> {
        let mut paginations = 0;
        for processor in processors {
            let Some(kind) = processor.kind() else {
                continue;
            };
            if !accepted.contains(&kind) {
                return Err(RepositoryError::validation_error(format!(
                    "{kind} is not supported by {operation}"
                )));
            }
            if kind == ProcessorKind::Paginate {
                paginations += 1;
            }
        }
        if paginations > 1 {
            return Err(RepositoryError::validation_error(format!(
                "{operation} accepts at most one Paginate"
            )));
        }
        Ok(Self { processors })
    }

    /// Whether some filter actually narrows the rows. Empty conditions
    /// such as `Condition::all()` do not count.
    pub fn restricts_rows(&self) -> bool {
        self.processors.iter().any(|processor| match processor {
            QueryProcessor::Filter(condition) => !condition.is_empty(),
            QueryProcessor::RawFilter { sql, .. } => !sql.trim().is_empty(),
            _ => false,
        })
    }

    pub fn include_deleted(&self) -> bool {
        self.processors
            .iter()
            .any(|p| matches!(p, QueryProcessor::IncludeDeleted))
    }

    /// Source table override; the last `Table` wins.
    pub fn table_override(&self) -> Option<&'a str> {
        self.processors.iter().rev().find_map(|p| match p {
            QueryProcessor::Table(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Requested association paths, deduplicated in request order.
    pub fn preload_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for processor in self.processors {
            if let QueryProcessor::Preload(requested) = processor {
                for path in requested {
                    let path = path.trim();
                    if !path.is_empty() && !paths.iter().any(|p| p == path) {
                        paths.push(path.to_string());
                    }
                }
            }
        }
        paths
    }

    /// AND of every filter, for statements that only take a WHERE clause.
    pub fn condition(&self, backend: DbBackend) -> Result<Condition, RepositoryError> {
        let mut condition = Condition::all();
        for processor in self.processors {
            match processor {
                QueryProcessor::Filter(filter) => condition = condition.add(filter.clone()),
                QueryProcessor::RawFilter { sql, values } => {
                    condition = condition.add(raw_expr(sql, values, backend)?)
                }
                _ => {}
            }
        }
        Ok(condition)
    }

    /// Apply every processor except `Paginate`, in order.
    pub fn apply(&self, stmt: &mut SelectStatement, backend: DbBackend) -> Result<(), RepositoryError> {
        for processor in self.processors {
            match processor {
                QueryProcessor::Filter(filter) => {
                    stmt.cond_where(filter.clone());
                }
                QueryProcessor::RawFilter { sql, values } => {
                    stmt.and_where(raw_expr(sql, values, backend)?);
                }
                QueryProcessor::Join {
                    join_type,
                    table,
                    on,
                } => {
                    stmt.join(*join_type, Alias::new(table.as_str()), Expr::cust(on.as_str()));
                }
                QueryProcessor::JoinRelated {
                    join_type,
                    relation,
                } => {
                    let (table, on) = relation_join(relation)?;
                    stmt.join(*join_type, table, on);
                }
                QueryProcessor::GroupBy(expr) => {
                    stmt.add_group_by([Expr::cust(expr.as_str())]);
                }
                QueryProcessor::Select(columns) => {
                    stmt.clear_selects();
                    for column in columns {
                        stmt.expr(Expr::cust(column.as_str()));
                    }
                }
                QueryProcessor::Paginate { .. }
                | QueryProcessor::Table(_)
                | QueryProcessor::Preload(_)
                | QueryProcessor::IncludeDeleted
                | QueryProcessor::Identity => {}
            }
        }
        Ok(())
    }

    /// Count rows under the statement's full filter/join state, write the
    /// total, then apply LIMIT/OFFSET when `limit > 0`.
    pub async fn paginate(
        &self,
        uow: &UnitOfWork,
        stmt: &mut SelectStatement,
    ) -> Result<(), RepositoryError> {
        let Some((limit, offset, total)) = self.processors.iter().find_map(|p| match p {
            QueryProcessor::Paginate {
                limit,
                offset,
                total,
            } => Some((*limit, *offset, total)),
            _ => None,
        }) else {
            return Ok(());
        };

        let mut counted = stmt.clone();
        counted.clear_order_by();
        total.set(count_rows(uow, counted).await?);

        if limit > 0 {
            stmt.limit(limit as u64).offset(offset.max(0) as u64);
        }
        Ok(())
    }
}

/// `SELECT COUNT(*)` over `inner` as a subquery.
pub(crate) async fn count_rows(
    uow: &UnitOfWork,
    inner: SelectStatement,
) -> Result<u64, RepositoryError> {
    let stmt = Query::select()
        .expr_as(Expr::cust("COUNT(*)"), Alias::new("num_items"))
        .from_subquery(inner, Alias::new("sub_query"))
        .to_owned();

    let row = uow
        .query_one(uow.get_database_backend().build(&stmt))
        .await
        .map_err(RepositoryError::database_error)?;

    let count = match row {
        Some(row) => row
            .try_get::<i64>("", "num_items")
            .map_err(RepositoryError::database_error)?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

fn raw_expr(sql: &str, values: &[Value], backend: DbBackend) -> Result<SimpleExpr, RepositoryError> {
    let (placeholders, numbered) = scan_placeholders(sql);
    if placeholders != values.len() {
        return Err(RepositoryError::validation_error(format!(
            "filter `{sql}` has {placeholders} placeholders but {} arguments",
            values.len()
        )));
    }

    let sql = match backend {
        DbBackend::Postgres => numbered,
        _ => sql.to_string(),
    };
    Ok(Expr::cust_with_values(sql, values.iter().cloned()))
}

/// Count `?` placeholders outside quoted literals and produce the `$n`
/// numbered rendering Postgres expects.
fn scan_placeholders(sql: &str) -> (usize, String) {
    let mut count = 0;
    let mut numbered = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match (quote, ch) {
            (Some(open), c) if c == open => {
                quote = None;
                numbered.push(c);
            }
            (Some(_), c) => numbered.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                numbered.push(ch);
            }
            (None, '?') => {
                count += 1;
                numbered.push_str(&format!("${count}"));
            }
            (None, c) => numbered.push(c),
        }
    }
    (count, numbered)
}

fn relation_join(relation: &RelationDef) -> Result<(TableRef, Condition), RepositoryError> {
    let (Identity::Unary(from_col), Identity::Unary(to_col)) = (&relation.from_col, &relation.to_col)
    else {
        return Err(RepositoryError::validation_error(
            "only single-column relations can be joined",
        ));
    };
    let (Some(from_tbl), Some(to_tbl)) = (table_iden(&relation.from_tbl), table_iden(&relation.to_tbl))
    else {
        return Err(RepositoryError::validation_error(
            "relation tables must be plain table references",
        ));
    };

    let on = Expr::col(ColumnRef::TableColumn(from_tbl, from_col.clone()))
        .equals(ColumnRef::TableColumn(to_tbl, to_col.clone()));
    Ok((relation.to_tbl.clone(), on.into_condition()))
}

fn table_iden(table: &TableRef) -> Option<DynIden> {
    match table {
        TableRef::Table(iden) | TableRef::SchemaTable(_, iden) => Some(iden.clone()),
        _ => None,
    }
}

pub(crate) fn is_identifier(column: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(column))
}

fn normalize_condition(condition: &str) -> Result<String, RepositoryError> {
    const ALLOWED: &[&str] = &[
        "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "ILIKE", "NOT ILIKE",
    ];

    let normalized = condition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    if ALLOWED.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(RepositoryError::validation_error(format!(
            "unknown condition '{condition}'"
        )))
    }
}
