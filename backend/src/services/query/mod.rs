//! # Filter / Order / Paginate Query Builder
//!
//! Turns the request model from `common::requests` into parameterised SQL over one of
//! the execution tables, without any query shape fixed at compile time.
//!
//! ## How a query is built
//!
//! 1.  **Whitelist**: every queryable record type implements `Record`, which lists its
//!     `Column`s: the public camelCase name a caller uses, the SQL expression behind it
//!     and the kind of value it holds. A filter or sort on any other name fails with
//!     `Error::InvalidFilter` before SQL is generated, so column names never reach the
//!     database unchecked.
//!
//! 2.  **Filters**: each `ColumnFilter` is validated (operator arity), its values are
//!     coerced to the column kind and it becomes one `?`-parameterised predicate. All
//!     predicates are ANDed; an empty list matches every row.
//!
//! 3.  **Order**: sort directives are applied left to right. The record key is always
//!     appended as a final tie-breaker so that consecutive windows over a static data
//!     set neither overlap nor skip rows.
//!
//! 4.  **Window**: `LIMIT`/`OFFSET`. One extra row is fetched to tell whether more rows
//!     follow. A zero limit yields an empty page; a start beyond the end yields an empty
//!     page, never an error.

pub mod records;

use crate::db::{from_millis, to_millis};
use crate::error::Result;
use chrono::DateTime;
use common::jobs::ExecutionStatus;
use common::model::search::{Page, SearchResult};
use common::requests::{ColumnFilter, Direction, FilterError, FilterOperator, FilterValue, OrderBy, Window};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::marker::PhantomData;

/// Kind of value stored in a column; decides how filter operands are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
    /// Text restricted to `ExecutionStatus` labels (upper case).
    Status,
    /// Epoch milliseconds, exposed as `DateTime<Utc>`.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, sql: &'static str, kind: ColumnKind) -> Self {
        Self { name, sql, kind }
    }
}

/// A row type that can be queried through `Query`.
pub trait Record: Sized {
    /// Table (or join) the rows come from.
    const TABLE: &'static str;
    /// Select list matching `from_row`.
    const SELECT: &'static str;
    /// Unique key, used as the final sort tie-breaker.
    const KEY: &'static str;
    const COLUMNS: &'static [Column];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn column(name: &str) -> Result<&'static Column, FilterError> {
        Self::COLUMNS
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FilterError::UnknownColumn(name.to_string()))
    }
}

/// A filtered, ordered query over `R`. Filters added through `filter`/`filters` are
/// ANDed; the order is kept as given.
pub struct Query<'q, R> {
    filters: Vec<&'q ColumnFilter>,
    order: &'q [OrderBy],
    _record: PhantomData<R>,
}

impl<'q, R: Record> Default for Query<'q, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'q, R: Record> Query<'q, R> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: &[],
            _record: PhantomData,
        }
    }

    pub fn filter(mut self, filter: &'q ColumnFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: &'q [ColumnFilter]) -> Self {
        self.filters.extend(filters.iter());
        self
    }

    pub fn order(mut self, order: &'q [OrderBy]) -> Self {
        self.order = order;
        self
    }

    /// `WHERE ...` clause (empty when there are no filters) and its parameters.
    pub fn where_clause(&self) -> Result<(String, Vec<Value>)> {
        let mut predicates = Vec::with_capacity(self.filters.len());
        let mut params = Vec::new();
        for filter in &self.filters {
            predicates.push(predicate::<R>(filter, &mut params)?);
        }
        if predicates.is_empty() {
            Ok((String::new(), params))
        } else {
            Ok((format!(" WHERE {}", predicates.join(" AND ")), params))
        }
    }

    fn order_clause(&self) -> Result<String> {
        let mut terms = Vec::with_capacity(self.order.len() + 1);
        for order in self.order {
            let column = R::column(&order.column)?;
            let direction = match order.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            terms.push(format!("{} {}", column.sql, direction));
        }
        terms.push(format!("{} ASC", R::KEY));
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    pub fn page(&self, conn: &Connection, window: Window) -> Result<Page<R>> {
        let (where_sql, mut params) = self.where_clause()?;
        let order_sql = self.order_clause()?;
        // One extra row tells whether the next window has anything in it. A limit too
        // large for SQLite means no limit; a start too large still skips every row.
        let fetch = window
            .limit
            .and_then(|limit| i64::try_from(limit).ok())
            .and_then(|limit| limit.checked_add(1))
            .unwrap_or(-1);
        params.push(Value::Integer(fetch));
        params.push(Value::Integer(i64::try_from(window.start).unwrap_or(i64::MAX)));

        let sql = format!(
            "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
            R::SELECT,
            R::TABLE,
            where_sql,
            order_sql
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params_from_iter(params.iter()), |row| R::from_row(row))?
            .collect::<rusqlite::Result<Vec<R>>>()?;

        let next_available = match window.limit {
            Some(limit) if rows.len() > limit => {
                rows.truncate(limit);
                true
            }
            _ => false,
        };
        Ok(Page { rows, next_available })
    }

    pub fn all(&self, conn: &Connection) -> Result<Vec<R>> {
        Ok(self.page(conn, Window::unbounded())?.rows)
    }

    pub fn count(&self, conn: &Connection) -> Result<i64> {
        let (where_sql, params) = self.where_clause()?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", R::TABLE, where_sql);
        let count = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(count)
    }

    /// Distinct values of `column` among the matching rows, in the column's natural
    /// ascending order.
    pub fn distinct(&self, conn: &Connection, column: &str) -> Result<Vec<FilterValue>> {
        let column = R::column(column)?;
        let (where_sql, params) = self.where_clause()?;
        let sql = format!(
            "SELECT DISTINCT {col} FROM {table}{where_sql} ORDER BY {col}",
            col = column.sql,
            table = R::TABLE,
        );
        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map(params_from_iter(params.iter()), |row| row.get::<_, Value>(0))?
            .collect::<rusqlite::Result<Vec<Value>>>()?;
        Ok(values.into_iter().map(|v| from_sql_value(column, v)).collect())
    }
}

/// Runs a data-tables search: `default_filters` always apply, `conditions` narrow further.
pub fn search<R: Record>(
    conn: &Connection,
    conditions: &[ColumnFilter],
    default_filters: &[ColumnFilter],
    order: &[OrderBy],
    window: Window,
) -> Result<SearchResult<R>> {
    let scoped = Query::<R>::new().filters(default_filters);
    let records_total = scoped.count(conn)?;

    let filtered = Query::<R>::new()
        .filters(default_filters)
        .filters(conditions)
        .order(order);
    let records_filtered = filtered.count(conn)?;
    let data = filtered.page(conn, window)?.rows;

    Ok(SearchResult {
        data,
        records_total,
        records_filtered,
    })
}

fn predicate<R: Record>(filter: &ColumnFilter, params: &mut Vec<Value>) -> Result<String, FilterError> {
    filter.validate()?;
    let column = R::column(&filter.column)?;
    let col = column.sql;

    let sql = match filter.operator {
        FilterOperator::Eq | FilterOperator::NotEq if filter.values[0] == FilterValue::Null => {
            if filter.operator == FilterOperator::Eq {
                format!("{} IS NULL", col)
            } else {
                format!("{} IS NOT NULL", col)
            }
        }
        FilterOperator::Like => {
            // Only text is stored as text; numbers and timestamps never match a pattern.
            let pattern = match (column.kind, &filter.values[0]) {
                (ColumnKind::Text | ColumnKind::Status, FilterValue::Text(pattern)) => pattern.clone(),
                (_, other) => return Err(invalid(column, other)),
            };
            params.push(Value::Text(pattern));
            format!("{} LIKE ?", col)
        }
        FilterOperator::In => {
            for value in &filter.values {
                params.push(to_sql_value(column, value)?);
            }
            let placeholders = vec!["?"; filter.values.len()].join(", ");
            format!("{} IN ({})", col, placeholders)
        }
        FilterOperator::Range => {
            params.push(to_sql_value(column, &filter.values[0])?);
            params.push(to_sql_value(column, &filter.values[1])?);
            format!("{} BETWEEN ? AND ?", col)
        }
        operator => {
            params.push(to_sql_value(column, &filter.values[0])?);
            let op = match operator {
                FilterOperator::Eq => "=",
                FilterOperator::NotEq => "<>",
                FilterOperator::Gt => ">",
                FilterOperator::Ge => ">=",
                FilterOperator::Lt => "<",
                _ => "<=",
            };
            format!("{} {} ?", col, op)
        }
    };
    Ok(sql)
}

fn invalid(column: &Column, value: &FilterValue) -> FilterError {
    FilterError::InvalidValue {
        column: column.name.to_string(),
        value: value.to_string(),
    }
}

fn to_sql_value(column: &Column, value: &FilterValue) -> Result<Value, FilterError> {
    if *value == FilterValue::Null {
        return Ok(Value::Null);
    }
    match column.kind {
        ColumnKind::Integer => match value {
            FilterValue::Integer(v) => Ok(Value::Integer(*v)),
            FilterValue::Real(v) => Ok(Value::Real(*v)),
            FilterValue::Text(v) => v
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid(column, value)),
            _ => Err(invalid(column, value)),
        },
        ColumnKind::Text => match value {
            FilterValue::Text(v) => Ok(Value::Text(v.clone())),
            FilterValue::Integer(v) => Ok(Value::Text(v.to_string())),
            _ => Err(invalid(column, value)),
        },
        ColumnKind::Status => match value {
            FilterValue::Text(v) => v
                .parse::<ExecutionStatus>()
                .map(|status| Value::Text(status.as_str().to_string()))
                .map_err(|_| invalid(column, value)),
            _ => Err(invalid(column, value)),
        },
        ColumnKind::Timestamp => match value {
            FilterValue::Timestamp(v) => Ok(Value::Integer(to_millis(*v))),
            FilterValue::Integer(v) => Ok(Value::Integer(*v)),
            FilterValue::Text(v) => DateTime::parse_from_rfc3339(v.trim())
                .map(|t| Value::Integer(t.timestamp_millis()))
                .map_err(|_| invalid(column, value)),
            _ => Err(invalid(column, value)),
        },
    }
}

fn from_sql_value(column: &Column, value: Value) -> FilterValue {
    match (column.kind, value) {
        (_, Value::Null) => FilterValue::Null,
        (ColumnKind::Timestamp, Value::Integer(v)) => from_millis(Some(v))
            .map(FilterValue::Timestamp)
            .unwrap_or(FilterValue::Integer(v)),
        (_, Value::Integer(v)) => FilterValue::Integer(v),
        (_, Value::Real(v)) => FilterValue::Real(v),
        (_, Value::Text(v)) => FilterValue::Text(v),
        (_, Value::Blob(v)) => FilterValue::Text(String::from_utf8_lossy(&v).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::feed::ExecutedFeed;

    #[test]
    fn empty_filter_list_has_no_where_clause() {
        let (sql, params) = Query::<ExecutedFeed>::new().where_clause().unwrap();
        assert!(sql.is_empty());
        assert!(params.is_empty());
    }

    #[test]
    fn filters_are_anded_and_parameterised() {
        let filters = vec![
            ColumnFilter::eq("feedName", "sales"),
            ColumnFilter::is_in("status", ["failed", "COMPLETED"]),
            ColumnFilter::range("feedInstanceId", 1, 10),
        ];
        let (sql, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(
            sql,
            " WHERE feed_name = ? AND status IN (?, ?) AND feed_instance_id BETWEEN ? AND ?"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("sales".into()),
                Value::Text("FAILED".into()),
                Value::Text("COMPLETED".into()),
                Value::Integer(1),
                Value::Integer(10),
            ]
        );
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let filters = vec![
            ColumnFilter::eq("endTime", FilterValue::Null),
            ColumnFilter::not_eq("exitCode", FilterValue::Null),
        ];
        let (sql, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(sql, " WHERE end_time IS NULL AND exit_code IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let filters = vec![ColumnFilter::eq("password", "x")];
        let err = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap_err();
        assert!(err.to_string().contains("unknown column 'password'"));

        let order = vec![OrderBy::asc("1; DROP TABLE feeds")];
        assert!(Query::<ExecutedFeed>::new().order(&order).order_clause().is_err());
    }

    #[test]
    fn values_must_fit_the_column_kind() {
        let filters = vec![ColumnFilter::eq("feedInstanceId", "not a number")];
        assert!(Query::<ExecutedFeed>::new().filters(&filters).where_clause().is_err());

        let filters = vec![ColumnFilter::eq("status", "EXPLODED")];
        assert!(Query::<ExecutedFeed>::new().filters(&filters).where_clause().is_err());

        let filters = vec![ColumnFilter::new(
            "startTime",
            FilterOperator::Ge,
            vec!["2024-01-01T00:00:00Z".into()],
        )];
        let (_, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(params, vec![Value::Integer(1_704_067_200_000)]);
    }

    #[test]
    fn like_only_applies_to_text_columns() {
        let filters = vec![ColumnFilter::like("exitCode", "2024-%")];
        let (sql, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(sql, " WHERE exit_code LIKE ?");
        assert_eq!(params, vec![Value::Text("2024-%".into())]);

        for column in ["startTime", "feedInstanceId"] {
            let filters = vec![ColumnFilter::like(column, "2024-%")];
            let err = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap_err();
            assert!(err.to_string().contains("is not valid for column"), "{}", err);
        }
    }

    #[test]
    fn rfc3339_text_still_filters_text_columns() {
        let value: FilterValue = serde_json::from_str(r#""2024-01-02T03:04:05Z""#).unwrap();
        let filters = vec![ColumnFilter::eq("exitCode", value.clone())];
        let (_, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(params, vec![Value::Text("2024-01-02T03:04:05Z".into())]);

        let filters = vec![ColumnFilter::eq("startTime", value)];
        let (_, params) = Query::<ExecutedFeed>::new().filters(&filters).where_clause().unwrap();
        assert_eq!(params, vec![Value::Integer(1_704_164_645_000)]);
    }

    #[test]
    fn order_always_ends_with_the_key() {
        let order = vec![OrderBy::desc("startTime"), OrderBy::asc("feedName")];
        let sql = Query::<ExecutedFeed>::new().order(&order).order_clause().unwrap();
        assert_eq!(sql, " ORDER BY start_time DESC, feed_name ASC, feed_execution_id ASC");
    }
}
