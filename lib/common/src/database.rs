use crate::error::DatabaseError;
use std::collections::HashMap;

/// Executes SQL statements.
pub trait SqlDatabase: Send + Sync {
    /// Executes a query and returns a forward-only cursor over its result.
    fn execute_query(&self, query: &str)
        -> Result<Box<dyn QueryResultReader + '_>, DatabaseError>;
}

/// A forward-only cursor over a query result.
pub trait QueryResultReader {
    /// Reads the next row. Returns [None] once the result is exhausted.
    fn next_row(&mut self) -> Result<Option<QueryResultRow>, DatabaseError>;
}

impl<I: Iterator<Item = QueryResultRow>> QueryResultReader for I {
    fn next_row(&mut self) -> Result<Option<QueryResultRow>, DatabaseError> {
        Ok(self.next())
    }
}

/// One row of a query result. Values are kept in their textual form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResultRow {
    values: HashMap<String, Option<String>>,
}

impl QueryResultRow {
    pub fn new(values: HashMap<String, Option<String>>) -> Self {
        Self { values }
    }

    /// Adds a value.
    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.values.insert(column.into(), value.map(ToOwned::to_owned));
        self
    }

    /// The textual value of a column. [None] for `NULL` and unknown columns.
    pub fn string_value(&self, column: &str) -> Option<&str> {
        self.values.get(column).and_then(Option::as_deref)
    }

    /// Interprets the value of a column as a boolean (`1`/`0`, `true`/`false`).
    pub fn boolean_value(&self, column: &str) -> Option<bool> {
        match self.string_value(column)?.trim() {
            "1" => Some(true),
            "0" => Some(false),
            value if value.eq_ignore_ascii_case("true") => Some(true),
            value if value.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Interprets the value of a column as an integer.
    pub fn integer_value(&self, column: &str) -> Option<i64> {
        self.string_value(column)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_values() {
        let row = QueryResultRow::default()
            .with_value("c0", Some("12"))
            .with_value("c1", None)
            .with_value("c2", Some("True"));

        assert_eq!(row.string_value("c0"), Some("12"));
        assert_eq!(row.integer_value("c0"), Some(12));
        assert_eq!(row.string_value("c1"), None);
        assert_eq!(row.boolean_value("c2"), Some(true));
        assert_eq!(row.string_value("missing"), None);
    }

    #[test]
    fn test_iterator_reader() {
        let mut reader = vec![QueryResultRow::default()].into_iter();
        assert!(reader.next_row().unwrap().is_some());
        assert!(reader.next_row().unwrap().is_none());
    }
}
