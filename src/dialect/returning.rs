//! `RETURNING ... INTO` emulation.
//!
//! Oracle's RETURNING clause writes into OUT binds instead of producing a
//! result set. For DML touching several rows each OUT slot receives one
//! value per row; `ReturningSpec::records` transposes the slots back into
//! records.

use super::quote_identifier;
use crate::error::DbResult;
use crate::models::{
    BindParam, ColumnDefinition, ColumnType, DEFAULT_OUT_STRING_SIZE, OutKind, Record,
    TableDefinition,
};
use serde_json::Value as JsonValue;

/// Columns read back after a write, each bound to one OUT slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturningSpec {
    columns: Vec<(String, OutKind)>,
}

impl ReturningSpec {
    /// Read back every column of the table.
    pub fn for_table(table: &TableDefinition) -> Self {
        Self {
            columns: table
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), out_kind(column)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append ` RETURNING "a", "b" INTO :n, :n+1` and the matching OUT binds.
    ///
    /// OUT slots are numbered after the binds already in `params`.
    pub fn apply(&self, sql: &mut String, params: &mut Vec<BindParam>) -> DbResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        let fields = self
            .columns
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<DbResult<Vec<_>>>()?;

        let first = params.len() + 1;
        let slots: Vec<String> = (first..first + self.columns.len())
            .map(|n| format!(":{}", n))
            .collect();

        sql.push_str(&format!(
            " RETURNING {} INTO {}",
            fields.join(", "),
            slots.join(", ")
        ));
        params.extend(self.columns.iter().map(|(_, kind)| BindParam::Out(*kind)));
        Ok(())
    }

    /// Map OUT bind values back onto field names, one record per row.
    pub fn records(&self, out_binds: &[Vec<JsonValue>]) -> Vec<Record> {
        let rows = out_binds.iter().map(Vec::len).max().unwrap_or(0);

        (0..rows)
            .map(|row| {
                self.columns
                    .iter()
                    .enumerate()
                    .map(|(slot, (name, _))| {
                        let value = out_binds
                            .get(slot)
                            .and_then(|values| values.get(row))
                            .cloned()
                            .unwrap_or(JsonValue::Null);
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }
}

fn out_kind(column: &ColumnDefinition) -> OutKind {
    match column.column_type {
        ColumnType::Integer | ColumnType::Float | ColumnType::Boolean => OutKind::Number,
        ColumnType::Date | ColumnType::Datetime => OutKind::Date,
        ColumnType::Binary => OutKind::Buffer,
        ColumnType::Text | ColumnType::Json | ColumnType::Array => OutKind::Clob,
        ColumnType::String | ColumnType::Unknown => OutKind::String {
            max_size: column.size.unwrap_or(DEFAULT_OUT_STRING_SIZE),
        },
    }
}
