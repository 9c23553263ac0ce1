//! Criteria to SQL.
//!
//! Every value becomes a positional `:N` bind, numbered in order of
//! appearance. Identifiers are validated against the table definition and
//! quoted.

use super::{Comparator, Condition, Criteria, SortDirection};
use crate::dialect::values::to_sql_value;
use crate::dialect::{ROW_ORDINAL_COLUMN, paginate, quote_identifier, table_ref};
use crate::error::{DbError, DbResult};
use crate::models::{BindParam, Query, SqlValue, TableDefinition};

/// Oracle rejects IN lists longer than this (ORA-01795).
const MAX_IN_LIST: usize = 1000;

/// SQL text plus the binds its placeholders refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<BindParam>,
}

impl Statement {
    pub fn into_query(self) -> Query {
        Query::new(self.sql).with_params(self.params)
    }
}

/// Builds one statement against one table.
pub struct StatementBuilder<'a> {
    table: &'a TableDefinition,
    table_ref: String,
    params: Vec<BindParam>,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(table: &'a TableDefinition) -> DbResult<Self> {
        Ok(Self {
            table,
            table_ref: table_ref(table)?,
            params: Vec::new(),
        })
    }

    /// Paginated SELECT with the row-ordinal column.
    pub fn select(mut self, criteria: &Criteria) -> DbResult<Statement> {
        let projection = self.projection(&criteria.select)?;
        let filter = self.where_clause(criteria.filter.as_ref())?;
        let sort = self.sort_clause(&criteria.sort)?;

        let ordinal_order = match &sort {
            Some(sort) => sort.clone(),
            None => {
                let keys = self.table.primary_key_columns();
                if keys.is_empty() {
                    "ROWNUM".to_string()
                } else {
                    keys.into_iter()
                        .map(quote_identifier)
                        .collect::<DbResult<Vec<_>>>()?
                        .join(", ")
                }
            }
        };

        let mut inner = format!(
            "SELECT {}, ROW_NUMBER() OVER (ORDER BY {}) \"{}\" FROM {}{}",
            projection, ordinal_order, ROW_ORDINAL_COLUMN, self.table_ref, filter
        );
        if let Some(sort) = sort {
            inner.push_str(" ORDER BY ");
            inner.push_str(&sort);
        }

        Ok(Statement {
            sql: paginate(&inner, criteria.skip, criteria.limit),
            params: self.params,
        })
    }

    /// SELECT that locks the matching rows until the transaction ends.
    ///
    /// Pagination and sort do not apply.
    pub fn select_for_update(mut self, criteria: &Criteria) -> DbResult<Statement> {
        let projection = self.projection(&criteria.select)?;
        let filter = self.where_clause(criteria.filter.as_ref())?;
        Ok(Statement {
            sql: format!(
                "SELECT {} FROM {}{} FOR UPDATE",
                projection, self.table_ref, filter
            ),
            params: self.params,
        })
    }

    /// INSERT of pre-coerced values.
    ///
    /// With no values, inserts a row of defaults so triggers still fire.
    pub fn insert(mut self, values: Vec<(String, SqlValue)>) -> DbResult<Statement> {
        if values.is_empty() {
            let column = self
                .table
                .primary_key_columns()
                .first()
                .copied()
                .or_else(|| self.table.columns.keys().next().map(String::as_str))
                .ok_or_else(|| {
                    DbError::query_build(format!(
                        "Table '{}' has no columns to insert into",
                        self.table.table_name
                    ))
                })?;
            return Ok(Statement {
                sql: format!(
                    "INSERT INTO {} ({}) VALUES (DEFAULT)",
                    self.table_ref,
                    quote_identifier(column)?
                ),
                params: self.params,
            });
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut slots = Vec::with_capacity(values.len());
        for (name, value) in values {
            columns.push(self.column(&name)?);
            slots.push(self.bind(value));
        }

        Ok(Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table_ref,
                columns.join(", "),
                slots.join(", ")
            ),
            params: self.params,
        })
    }

    /// UPDATE of pre-coerced values for rows matching `criteria`.
    pub fn update(
        mut self,
        criteria: &Criteria,
        values: Vec<(String, SqlValue)>,
    ) -> DbResult<Statement> {
        if values.is_empty() {
            return Err(DbError::query_build(format!(
                "Nothing to update on table '{}'",
                self.table.table_name
            )));
        }

        let mut assignments = Vec::with_capacity(values.len());
        for (name, value) in values {
            let column = self.column(&name)?;
            assignments.push(format!("{} = {}", column, self.bind(value)));
        }
        let filter = self.where_clause(criteria.filter.as_ref())?;

        Ok(Statement {
            sql: format!(
                "UPDATE {} SET {}{}",
                self.table_ref,
                assignments.join(", "),
                filter
            ),
            params: self.params,
        })
    }

    /// DELETE of rows matching `criteria`.
    pub fn delete(mut self, criteria: &Criteria) -> DbResult<Statement> {
        let filter = self.where_clause(criteria.filter.as_ref())?;
        Ok(Statement {
            sql: format!("DELETE FROM {}{}", self.table_ref, filter),
            params: self.params,
        })
    }

    fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(BindParam::In(value));
        format!(":{}", self.params.len())
    }

    fn column(&self, name: &str) -> DbResult<String> {
        if self.table.column(name).is_none() {
            return Err(DbError::query_build(format!(
                "Unknown column '{}' for table '{}'",
                name, self.table.table_name
            )));
        }
        quote_identifier(name)
    }

    fn projection(&self, select: &[String]) -> DbResult<String> {
        if select.is_empty() {
            return Ok(format!("{}.*", self.table_ref));
        }
        Ok(select
            .iter()
            .map(|name| self.column(name))
            .collect::<DbResult<Vec<_>>>()?
            .join(", "))
    }

    fn sort_clause(&self, sort: &[(String, SortDirection)]) -> DbResult<Option<String>> {
        if sort.is_empty() {
            return Ok(None);
        }
        let parts = sort
            .iter()
            .map(|(name, direction)| Ok(format!("{} {}", self.column(name)?, direction.as_sql())))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Some(parts.join(", ")))
    }

    fn where_clause(&mut self, filter: Option<&Condition>) -> DbResult<String> {
        match filter {
            None => Ok(String::new()),
            Some(Condition::All(children)) if children.is_empty() => Ok(String::new()),
            Some(Condition::All(children)) => {
                let parts = children
                    .iter()
                    .map(|c| self.condition(c))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!(" WHERE {}", parts.join(" AND ")))
            }
            Some(condition) => Ok(format!(" WHERE {}", self.condition(condition)?)),
        }
    }

    fn condition(&mut self, condition: &Condition) -> DbResult<String> {
        match condition {
            Condition::Compare { column, op, value } => {
                let quoted = self.column(column)?;
                let value = self.value(column, value)?;
                if *op == Comparator::Eq && value.is_null() {
                    return Ok(format!("{} IS NULL", quoted));
                }
                Ok(format!("{} {} {}", quoted, op.as_sql(), self.bind(value)))
            }
            Condition::Null { column, negated } => Ok(format!(
                "{} IS {}NULL",
                self.column(column)?,
                if *negated { "NOT " } else { "" }
            )),
            Condition::In {
                column,
                values,
                negated,
            } => {
                let quoted = self.column(column)?;
                if values.is_empty() {
                    return Ok(if *negated { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let (keyword, joiner) = if *negated {
                    ("NOT IN", " AND ")
                } else {
                    ("IN", " OR ")
                };

                let mut lists = Vec::with_capacity(values.len().div_ceil(MAX_IN_LIST));
                for chunk in values.chunks(MAX_IN_LIST) {
                    let mut slots = Vec::with_capacity(chunk.len());
                    for value in chunk {
                        let value = self.value(column, value)?;
                        slots.push(self.bind(value));
                    }
                    lists.push(format!("{} {} ({})", quoted, keyword, slots.join(", ")));
                }
                Ok(match lists.len() {
                    1 => lists.remove(0),
                    _ => format!("({})", lists.join(joiner)),
                })
            }
            Condition::All(children) => self.group(children, " AND ", "1 = 1"),
            Condition::Any(children) => self.group(children, " OR ", "1 = 0"),
        }
    }

    fn group(&mut self, children: &[Condition], joiner: &str, empty: &str) -> DbResult<String> {
        match children {
            [] => Ok(empty.to_string()),
            [only] => self.condition(only),
            _ => {
                let parts = children
                    .iter()
                    .map(|c| self.condition(c))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(format!("({})", parts.join(joiner)))
            }
        }
    }

    fn value(&self, column: &str, value: &serde_json::Value) -> DbResult<SqlValue> {
        to_sql_value(self.table.column(column), value)
    }
}
