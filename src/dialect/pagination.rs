//! Row-ordinal pagination.
//!
//! The inner SELECT computes `ROW_NUMBER() ... "LINE_NUMBER"`; windowing
//! filters on it from an outer query. Bounds are typed integers rendered
//! into the text, never caller strings.

use super::ROW_ORDINAL_COLUMN;

/// Wrap `inner` so only rows with ordinal in `(skip, skip + limit]` remain.
///
/// A `skip` of zero is the same as no skip. Without skip and limit the
/// query is returned unchanged.
pub fn paginate(inner: &str, skip: Option<u64>, limit: Option<u64>) -> String {
    let skip = skip.filter(|s| *s > 0);
    let filter = match (skip, limit) {
        (None, None) => return inner.to_string(),
        (Some(skip), Some(limit)) => format!(
            "\"{col}\" > {} AND \"{col}\" <= {}",
            skip,
            skip.saturating_add(limit),
            col = ROW_ORDINAL_COLUMN
        ),
        (None, Some(limit)) => format!("\"{}\" <= {}", ROW_ORDINAL_COLUMN, limit),
        (Some(skip), None) => format!("\"{}\" > {}", ROW_ORDINAL_COLUMN, skip),
    };

    format!(
        "SELECT * FROM ({}) WHERE {} ORDER BY \"{}\"",
        inner, filter, ROW_ORDINAL_COLUMN
    )
}
