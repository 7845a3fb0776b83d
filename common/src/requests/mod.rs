//! Request payloads for the feed query endpoints.
//!
//! A query is described by three independent pieces:
//! - a list of `ColumnFilter`s, ANDed together,
//! - a list of `OrderBy` directives, applied left to right,
//! - a `Window` selecting the page (`start` offset plus an optional `limit`).
//!
//! Column names are the public, camelCase names of the queried record (`feedName`,
//! `startTime`, ...). Whether a name is queryable is decided by the repository that
//! executes the query; here only the operator/value arity is checked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Problems with a filter or sort directive detected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("operator {operator} on '{column}' expects {expected} value(s), got {actual}")]
    Arity {
        column: String,
        operator: FilterOperator,
        expected: &'static str,
        actual: usize,
    },

    #[error("value {value} is not valid for column '{column}'")]
    InvalidValue { column: String, value: String },
}

/// Comparison applied by a `ColumnFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    Like,
    In,
    /// Inclusive range, `values[0] <= column <= values[1]`.
    Range,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterOperator::Eq => "EQ",
            FilterOperator::NotEq => "NOT_EQ",
            FilterOperator::Gt => "GT",
            FilterOperator::Ge => "GE",
            FilterOperator::Lt => "LT",
            FilterOperator::Le => "LE",
            FilterOperator::Like => "LIKE",
            FilterOperator::In => "IN",
            FilterOperator::Range => "RANGE",
        };
        f.write_str(name)
    }
}

/// An opaque scalar used as a filter operand or returned by a distinct-value projection.
///
/// JSON strings always deserialize as `Text`; timestamp columns parse RFC 3339 text
/// themselves, so a date-like string stays usable on a text column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => f.write_str("null"),
            FilterValue::Integer(v) => write!(f, "{}", v),
            FilterValue::Real(v) => write!(f, "{}", v),
            FilterValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            FilterValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Real(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(value)
    }
}

/// A single column condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilter {
    pub column: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub values: Vec<FilterValue>,
}

impl ColumnFilter {
    pub fn new(column: impl Into<String>, operator: FilterOperator, values: Vec<FilterValue>) -> Self {
        Self {
            column: column.into(),
            operator,
            values,
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(column, FilterOperator::Eq, vec![value.into()])
    }

    pub fn not_eq(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(column, FilterOperator::NotEq, vec![value.into()])
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(column, FilterOperator::Like, vec![FilterValue::Text(pattern.into())])
    }

    pub fn is_in<V: Into<FilterValue>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            column,
            FilterOperator::In,
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn range(column: impl Into<String>, low: impl Into<FilterValue>, high: impl Into<FilterValue>) -> Self {
        Self::new(column, FilterOperator::Range, vec![low.into(), high.into()])
    }

    /// Checks the operator/value arity. RANGE takes exactly two values, IN at least one,
    /// everything else exactly one.
    pub fn validate(&self) -> Result<(), FilterError> {
        let actual = self.values.len();
        let (ok, expected) = match self.operator {
            FilterOperator::Range => (actual == 2, "2"),
            FilterOperator::In => (actual >= 1, "at least 1"),
            _ => (actual == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(FilterError::Arity {
                column: self.column.clone(),
                operator: self.operator,
                expected,
                actual,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// A sort directive. Several directives sort with left-to-right priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Pagination window. `limit: None` means unbounded; a limit of zero is allowed and
/// yields an empty page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Window {
    pub fn new(start: usize, limit: usize) -> Self {
        Self {
            start,
            limit: Some(limit),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            start: 0,
            limit: None,
        }
    }

    pub fn first(limit: usize) -> Self {
        Self::new(0, limit)
    }
}

/// Body of a data-tables style search: user conditions, sort and window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub conditions: Vec<ColumnFilter>,
    #[serde(default)]
    pub order: Vec<OrderBy>,
    #[serde(flatten)]
    pub window: Window,
}
