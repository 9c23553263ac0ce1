//! Waterline-style criteria.
//!
//! Criteria arrive as JSON from the host ORM. `Criteria::from_value` parses
//! them into a typed filter tree; `translate::StatementBuilder` renders that
//! tree into Oracle SQL with positional binds.
//!
//! Accepted shapes:
//! - `{ "where": {...}, "limit": 10, "skip": 20, "sort": ..., "select": [...] }`
//! - a bare where object, e.g. `{ "status": "open" }`
//! - `null` for "everything"

pub mod translate;

pub use translate::{Statement, StatementBuilder};

use crate::error::{DbError, DbResult};
use serde_json::{Map, Value as JsonValue};

const CRITERIA_KEYS: &[&str] = &["where", "limit", "skip", "sort", "select"];

/// Sort direction for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    fn parse(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Number(n) if n.as_i64() == Some(1) => Ok(Self::Asc),
            JsonValue::Number(n) if n.as_i64() == Some(-1) => Ok(Self::Desc),
            JsonValue::String(s) if s.eq_ignore_ascii_case("asc") => Ok(Self::Asc),
            JsonValue::String(s) if s.eq_ignore_ascii_case("desc") => Ok(Self::Desc),
            other => Err(DbError::query_build(format!(
                "Invalid sort direction: {}",
                other
            ))),
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

impl Comparator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// A parsed where clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        column: String,
        op: Comparator,
        value: JsonValue,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<JsonValue>,
        negated: bool,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// Columns referenced anywhere in the tree.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Self::Compare { column, .. } | Self::Null { column, .. } | Self::In { column, .. } => {
                vec![column.as_str()]
            }
            Self::All(children) | Self::Any(children) => {
                children.iter().flat_map(Condition::columns).collect()
            }
        }
    }
}

/// Filter, sort, projection and pagination for one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    pub filter: Option<Condition>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub sort: Vec<(String, SortDirection)>,
    /// Empty means every column.
    pub select: Vec<String>,
}

impl Criteria {
    /// Criteria matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse host criteria.
    pub fn from_value(value: &JsonValue) -> DbResult<Self> {
        let map = match value {
            JsonValue::Null => return Ok(Self::default()),
            JsonValue::Object(map) => map,
            other => {
                return Err(DbError::query_build(format!(
                    "Criteria must be an object, got {}",
                    other
                )));
            }
        };

        if !map.keys().any(|k| CRITERIA_KEYS.contains(&k.as_str())) {
            return Ok(Self {
                filter: parse_where(map)?,
                ..Self::default()
            });
        }

        let mut criteria = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "where" => {
                    criteria.filter = match value {
                        JsonValue::Null => None,
                        JsonValue::Object(w) => parse_where(w)?,
                        other => {
                            return Err(DbError::query_build(format!(
                                "'where' must be an object, got {}",
                                other
                            )));
                        }
                    }
                }
                "limit" => criteria.limit = parse_count("limit", value)?,
                "skip" => criteria.skip = parse_count("skip", value)?,
                "sort" => criteria.sort = parse_sort(value)?,
                "select" => criteria.select = parse_select(value)?,
                other => {
                    return Err(DbError::query_build(format!(
                        "Unsupported criteria key '{}'",
                        other
                    )));
                }
            }
        }
        Ok(criteria)
    }

    /// AND a condition onto the existing filter.
    pub fn and_where(mut self, condition: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            None => condition,
            Some(Condition::All(mut children)) => {
                children.push(condition);
                Condition::All(children)
            }
            Some(existing) => Condition::All(vec![existing, condition]),
        });
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((column.into(), direction));
        self
    }
}

impl TryFrom<&JsonValue> for Criteria {
    type Error = DbError;

    fn try_from(value: &JsonValue) -> DbResult<Self> {
        Self::from_value(value)
    }
}

fn parse_count(key: &str, value: &JsonValue) -> DbResult<Option<u64>> {
    match value {
        JsonValue::Null => Ok(None),
        v => v.as_u64().map(Some).ok_or_else(|| {
            DbError::query_build(format!("'{}' must be a non-negative integer, got {}", key, v))
        }),
    }
}

fn parse_sort(value: &JsonValue) -> DbResult<Vec<(String, SortDirection)>> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) => map
            .iter()
            .map(|(column, dir)| Ok((column.clone(), SortDirection::parse(dir)?)))
            .collect(),
        JsonValue::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let mut words = part.split_whitespace();
                let column = words.next().unwrap_or_default().to_string();
                let direction = match words.next() {
                    None => SortDirection::Asc,
                    Some(d) => SortDirection::parse(&JsonValue::String(d.to_string()))?,
                };
                if words.next().is_some() {
                    return Err(DbError::query_build(format!("Invalid sort clause '{}'", part)));
                }
                Ok((column, direction))
            })
            .collect(),
        JsonValue::Array(items) => {
            let mut sort = Vec::new();
            for item in items {
                sort.extend(parse_sort(item)?);
            }
            Ok(sort)
        }
        other => Err(DbError::query_build(format!("Invalid sort: {}", other))),
    }
}

fn parse_select(value: &JsonValue) -> DbResult<Vec<String>> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(String::from).ok_or_else(|| {
                    DbError::query_build(format!("'select' entries must be strings, got {}", item))
                })
            })
            .collect(),
        other => Err(DbError::query_build(format!(
            "'select' must be an array, got {}",
            other
        ))),
    }
}

/// Parse a where object. Returns `None` when it has no conditions.
fn parse_where(map: &Map<String, JsonValue>) -> DbResult<Option<Condition>> {
    let mut conditions = Vec::with_capacity(map.len());

    for (key, value) in map {
        match key.as_str() {
            "or" => conditions.push(Condition::Any(parse_branches("or", value)?)),
            "and" => conditions.push(Condition::All(parse_branches("and", value)?)),
            column => conditions.extend(parse_column(column, value)?),
        }
    }

    Ok(match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(Condition::All(conditions)),
    })
}

fn parse_branches(key: &str, value: &JsonValue) -> DbResult<Vec<Condition>> {
    let items = value.as_array().ok_or_else(|| {
        DbError::query_build(format!("'{}' must be an array of where objects", key))
    })?;

    let mut branches = Vec::with_capacity(items.len());
    for item in items {
        let map = item.as_object().ok_or_else(|| {
            DbError::query_build(format!("'{}' entries must be objects, got {}", key, item))
        })?;
        // An empty branch matches everything.
        branches.push(parse_where(map)?.unwrap_or(Condition::All(Vec::new())));
    }
    Ok(branches)
}

fn parse_column(column: &str, value: &JsonValue) -> DbResult<Vec<Condition>> {
    let condition = match value {
        JsonValue::Null => Condition::Null {
            column: column.to_string(),
            negated: false,
        },
        JsonValue::Array(values) => Condition::In {
            column: column.to_string(),
            values: values.clone(),
            negated: false,
        },
        JsonValue::Object(modifiers) => {
            return modifiers
                .iter()
                .map(|(op, operand)| parse_modifier(column, op, operand))
                .collect();
        }
        scalar => Condition::Compare {
            column: column.to_string(),
            op: Comparator::Eq,
            value: scalar.clone(),
        },
    };
    Ok(vec![condition])
}

fn parse_modifier(column: &str, op: &str, operand: &JsonValue) -> DbResult<Condition> {
    let compare = |op: Comparator, value: JsonValue| -> DbResult<Condition> {
        if value.is_array() || value.is_object() {
            return Err(DbError::query_build(format!(
                "Operator on '{}' needs a scalar value, got {}",
                column, value
            )));
        }
        Ok(Condition::Compare {
            column: column.to_string(),
            op,
            value,
        })
    };
    let pattern = |prefix: &str, suffix: &str| -> DbResult<Condition> {
        let text = match operand {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            other => {
                return Err(DbError::query_build(format!(
                    "Pattern operator '{}' on '{}' needs a string, got {}",
                    op, column, other
                )));
            }
        };
        compare(
            Comparator::Like,
            JsonValue::String(format!("{}{}{}", prefix, text, suffix)),
        )
    };
    let list = |negated: bool| -> DbResult<Condition> {
        let values = operand.as_array().ok_or_else(|| {
            DbError::query_build(format!("Operator '{}' on '{}' needs an array", op, column))
        })?;
        Ok(Condition::In {
            column: column.to_string(),
            values: values.clone(),
            negated,
        })
    };

    match op {
        "<" | "lessThan" => compare(Comparator::Lt, operand.clone()),
        "<=" | "lessThanOrEqual" => compare(Comparator::Lte, operand.clone()),
        ">" | "greaterThan" => compare(Comparator::Gt, operand.clone()),
        ">=" | "greaterThanOrEqual" => compare(Comparator::Gte, operand.clone()),
        "!" | "not" => match operand {
            JsonValue::Null => Ok(Condition::Null {
                column: column.to_string(),
                negated: true,
            }),
            JsonValue::Array(_) => list(true),
            _ => compare(Comparator::Ne, operand.clone()),
        },
        "like" => pattern("", ""),
        "contains" => pattern("%", "%"),
        "startsWith" => pattern("", "%"),
        "endsWith" => pattern("%", ""),
        "in" => list(false),
        "nin" => list(true),
        other => Err(DbError::query_build(format!(
            "Unknown operator '{}' on column '{}'",
            other, column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_and_empty() {
        assert_eq!(Criteria::from_value(&JsonValue::Null).unwrap(), Criteria::all());
        assert_eq!(Criteria::from_value(&json!({})).unwrap(), Criteria::all());
    }

    #[test]
    fn test_bare_where() {
        let criteria = Criteria::from_value(&json!({ "status": "open" })).unwrap();
        assert_eq!(
            criteria.filter,
            Some(Condition::Compare {
                column: "status".into(),
                op: Comparator::Eq,
                value: json!("open"),
            })
        );
    }

    #[test]
    fn test_full_criteria() {
        let criteria = Criteria::from_value(&json!({
            "where": { "age": { ">=": 18, "<": 65 }, "name": null },
            "limit": 10,
            "skip": 20,
            "sort": "age desc, name",
            "select": ["name"]
        }))
        .unwrap();
        assert_eq!(criteria.limit, Some(10));
        assert_eq!(criteria.skip, Some(20));
        assert_eq!(
            criteria.sort,
            vec![
                ("age".to_string(), SortDirection::Desc),
                ("name".to_string(), SortDirection::Asc)
            ]
        );
        assert_eq!(criteria.select, vec!["name"]);
        match criteria.filter {
            Some(Condition::All(children)) => assert_eq!(children.len(), 3),
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_sort_object_keeps_key_order() {
        let criteria =
            Criteria::from_value(&json!({ "sort": { "b": -1, "a": "ASC" } })).unwrap();
        assert_eq!(
            criteria.sort,
            vec![
                ("b".to_string(), SortDirection::Desc),
                ("a".to_string(), SortDirection::Asc)
            ]
        );
    }

    #[test]
    fn test_modifiers() {
        let criteria = Criteria::from_value(&json!({
            "name": { "contains": "an" },
            "id": { "nin": [1, 2] },
            "deleted": { "!": null }
        }))
        .unwrap();
        let Some(Condition::All(children)) = criteria.filter else {
            panic!("expected conjunction");
        };
        assert!(children.contains(&Condition::Compare {
            column: "name".into(),
            op: Comparator::Like,
            value: json!("%an%"),
        }));
        assert!(children.contains(&Condition::In {
            column: "id".into(),
            values: vec![json!(1), json!(2)],
            negated: true,
        }));
        assert!(children.contains(&Condition::Null {
            column: "deleted".into(),
            negated: true,
        }));
    }

    #[test]
    fn test_or_branches() {
        let criteria = Criteria::from_value(&json!({
            "where": { "or": [{ "a": 1 }, { "b": [2, 3] }] }
        }))
        .unwrap();
        let Some(Condition::Any(branches)) = criteria.filter else {
            panic!("expected disjunction");
        };
        assert_eq!(branches.len(), 2);
    }

    #[test]
    fn test_builders_match_parsed_criteria() {
        let built = Criteria::all()
            .and_where(Condition::Compare {
                column: "a".into(),
                op: Comparator::Gt,
                value: json!(1),
            })
            .and_where(Condition::Null {
                column: "b".into(),
                negated: true,
            })
            .with_sort("a", SortDirection::Desc)
            .with_limit(5)
            .with_skip(10);
        let parsed = Criteria::from_value(&json!({
            "where": { "a": { ">": 1 }, "b": { "!": null } },
            "sort": "a DESC",
            "limit": 5,
            "skip": 10
        }))
        .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_condition_columns() {
        let criteria = Criteria::from_value(&json!({
            "where": { "a": 1, "or": [{ "b": [2, 3] }, { "c": null }] }
        }))
        .unwrap();
        let filter = criteria.filter.unwrap();
        assert_eq!(filter.columns(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            json!({ "a": { "between": [1, 2] } }),
            json!({ "where": { "or": { "a": 1 } } }),
            json!({ "limit": -1 }),
            json!({ "sort": { "a": 2 } }),
            json!({ "where": {}, "groupBy": "a" }),
            json!({ "a": { "<": [1] } }),
            json!("status = 'open'"),
        ] {
            assert!(
                matches!(Criteria::from_value(&bad), Err(DbError::QueryBuild { .. })),
                "accepted {}",
                bad
            );
        }
    }
}
