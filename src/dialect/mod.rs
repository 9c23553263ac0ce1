//! Oracle SQL rewriting.
//!
//! Oracle lacks a boolean column type, LIMIT/OFFSET, a row-returning
//! `RETURNING` result set and auto-increment columns. The submodules emulate
//! each of these:
//! - `ddl`: column types, `CREATE TABLE`, and sequence + trigger pairs
//! - `pagination`: row-ordinal windowing
//! - `returning`: `RETURNING ... INTO` with OUT binds
//! - `values`: write-side coercion and read-side normalization
//!
//! Identifiers cannot be bound, so every identifier goes through
//! `quote_identifier` before it reaches SQL text.

pub mod ddl;
pub mod pagination;
pub mod returning;
pub mod values;

pub use ddl::AutoIncrementBinding;
pub use pagination::paginate;
pub use returning::ReturningSpec;

use crate::error::{DbError, DbResult};
use crate::models::TableDefinition;

/// Pseudo-column computed by `ROW_NUMBER()` for pagination. Reserved.
pub const ROW_ORDINAL_COLUMN: &str = "LINE_NUMBER";

/// Oracle 12.2+ identifier limit, in bytes.
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Width of generated sequence and trigger names; fits pre-12.2 limits.
const GENERATED_NAME_LENGTH: usize = 30;

/// Reject identifiers that cannot be quoted safely.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if name.is_empty() {
        return Err(DbError::query_build("Identifier cannot be empty"));
    }
    if name.contains('\0') {
        return Err(DbError::query_build(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(DbError::query_build(format!(
            "Identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(())
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Escape text for use inside a single-quoted literal.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Quote `name`, qualified by `schema` when present.
pub fn qualified_name(schema: Option<&str>, name: &str) -> DbResult<String> {
    let quoted = quote_identifier(name)?;
    match schema {
        Some(schema) => Ok(format!("{}.{}", quote_identifier(schema)?, quoted)),
        None => Ok(quoted),
    }
}

/// Quoted, schema-qualified reference to a table.
pub fn table_ref(table: &TableDefinition) -> DbResult<String> {
    qualified_name(table.schema_name.as_deref(), &table.table_name)
}

/// Sequence backing an auto-increment column.
///
/// A pure function of (table, column): `define` and `drop` both derive the
/// name from here, so nothing has to remember which sequences exist.
pub fn sequence_name(table: &str, column: &str) -> String {
    generated_name(table, column, "SEQ")
}

/// Before-insert trigger populating an auto-increment column.
pub fn trigger_name(table: &str, column: &str) -> String {
    generated_name(table, column, "TRG")
}

/// `{PREFIX}_{HASH}_{SUFFIX}` where the prefix is a readable, truncated
/// form of `table_column` and the hash covers the untruncated pair.
fn generated_name(table: &str, column: &str, suffix: &str) -> String {
    let hash = fnv1a_32(table, column);
    let prefix_len = GENERATED_NAME_LENGTH - suffix.len() - 10;

    let prefix: String = table
        .chars()
        .chain(std::iter::once('_'))
        .chain(column.chars())
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .take(prefix_len)
        .collect();

    format!("{}_{:08X}_{}", prefix, hash, suffix)
}

/// FNV-1a over `table NUL column`; stable across builds and platforms.
fn fnv1a_32(table: &str, column: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    table
        .bytes()
        .chain(std::iter::once(0))
        .chain(column.bytes())
        .fold(OFFSET_BASIS, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(PRIME)
        })
}

/// Count positional `:N` placeholders outside quoted identifiers and literals.
pub fn count_placeholders(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut count = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b':' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                count += 1;
                i += 1;
                while bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    i += 1;
                }
            }
            None => {}
        }
        i += 1;
    }

    count
}
