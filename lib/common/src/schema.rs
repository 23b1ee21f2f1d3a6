use crate::types::SqlColumnTypeRef;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A column of a table.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: SqlColumnTypeRef,
    pub nullable: bool,
}

/// A set of columns that uniquely identifies a row (primary key or unique key).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueKey {
    columns: Vec<String>,
}

impl UniqueKey {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Schema information of a table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Option<UniqueKey>,
    unique_keys: Vec<UniqueKey>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            unique_keys: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        sql_type: SqlColumnTypeRef,
        nullable: bool,
    ) -> Self {
        self.columns.push(ColumnInfo {
            name: name.into(),
            sql_type,
            nullable,
        });
        self
    }

    /// Sets the primary key. The key columns become non-nullable.
    #[must_use]
    pub fn with_primary_key(
        mut self,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let key = UniqueKey::new(columns);
        for column in &mut self.columns {
            if key.columns().contains(&column.name) {
                column.nullable = false;
            }
        }
        self.primary_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_unique_key(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.unique_keys.push(UniqueKey::new(columns));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    /// Finds a column by name. Falls back to a case-insensitive match.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    pub fn primary_key(&self) -> Option<&UniqueKey> {
        self.primary_key.as_ref()
    }

    pub fn unique_keys(&self) -> &[UniqueKey] {
        &self.unique_keys
    }

    /// The primary key followed by all unique keys.
    pub fn unique_constraints(&self) -> impl Iterator<Item = &UniqueKey> {
        self.primary_key.iter().chain(self.unique_keys.iter())
    }
}

/// Provides the schema of the tables referenced by a mapping.
///
/// The schema is loaded once and shared read-only between compilations.
pub trait SchemaProvider: Debug + Send + Sync {
    /// Looks up a table by name.
    fn table_info(&self, table_name: &str) -> Option<Arc<TableInfo>>;
}

/// A [SchemaProvider] that holds all tables in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemorySchema {
    tables: HashMap<String, Arc<TableInfo>>,
}

impl InMemorySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing a table with the same name.
    pub fn add_table(&mut self, table: TableInfo) {
        self.tables
            .insert(table.name().to_ascii_lowercase(), Arc::new(table));
    }

    #[must_use]
    pub fn with_table(mut self, table: TableInfo) -> Self {
        self.add_table(table);
        self
    }
}

impl SchemaProvider for InMemorySchema {
    fn table_info(&self, table_name: &str) -> Option<Arc<TableInfo>> {
        let table_name = table_name.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'));
        self.tables.get(&table_name.to_ascii_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IntegerWidth, MsSqlColumnType, TypeLength};

    fn person() -> TableInfo {
        TableInfo::new("person")
            .with_column("id", Arc::new(MsSqlColumnType::Integer(IntegerWidth::Int)), true)
            .with_column(
                "name",
                Arc::new(MsSqlColumnType::Text {
                    unicode: false,
                    fixed: false,
                    length: TypeLength::Limited(50),
                }),
                true,
            )
            .with_primary_key(["id"])
            .with_unique_key(["name"])
    }

    #[test]
    fn test_primary_key_columns_are_not_nullable() {
        let table = person();
        assert!(!table.column("id").unwrap().nullable);
        assert!(table.column("name").unwrap().nullable);
    }

    #[test]
    fn test_unique_constraints() {
        let table = person();
        let constraints = table
            .unique_constraints()
            .map(|k| k.columns().join(","))
            .collect::<Vec<_>>();
        assert_eq!(constraints, vec!["id", "name"]);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let schema = InMemorySchema::new().with_table(person());
        assert!(schema.table_info("PERSON").is_some());
        assert!(schema.table_info("\"person\"").is_some());
        assert!(schema.table_info("address").is_none());
        assert!(schema.table_info("person").unwrap().column("NAME").is_some());
    }
}
