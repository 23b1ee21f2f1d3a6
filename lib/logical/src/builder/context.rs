use crate::calculus::{CalculusIdGenerator, CalculusVariable, SourceId, SqlTable, TableSource};
use datafusion::common::plan_err;
use relsparql_common::{DFResult, SchemaProvider, SqlColumnTypeRef, SqlDialect, SqlDialectRef};
use relsparql_mapping::{LogicalTable, R2RmlMapping, TriplesMap};
use std::sync::Arc;

/// The state shared by all steps that compile one query.
#[derive(Debug)]
pub struct QueryContext {
    generator: CalculusIdGenerator,
    mapping: Arc<R2RmlMapping>,
    schema: Arc<dyn SchemaProvider>,
    dialect: SqlDialectRef,
}

impl QueryContext {
    pub fn new(
        mapping: Arc<R2RmlMapping>,
        schema: Arc<dyn SchemaProvider>,
        dialect: SqlDialectRef,
    ) -> Self {
        Self {
            generator: CalculusIdGenerator::new(),
            mapping,
            schema,
            dialect,
        }
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    pub fn next_source_id(&mut self) -> SourceId {
        self.generator.next_source_id()
    }

    /// A computed variable of the given type.
    pub fn computed_variable(&mut self, sql_type: SqlColumnTypeRef) -> CalculusVariable {
        self.generator.computed_variable(sql_type)
    }

    pub fn triples_map(&self, id: &str) -> DFResult<&Arc<TriplesMap>> {
        match self.mapping.triples_map(id) {
            Some(triples_map) => Ok(triples_map),
            None => plan_err!("Unknown triples map '{id}'."),
        }
    }

    /// A new occurrence of a logical table.
    pub fn new_table(&mut self, logical_table: &LogicalTable) -> DFResult<SqlTable> {
        let id = self.generator.next_source_id();
        Ok(match logical_table {
            LogicalTable::Table(name) => {
                let Some(info) = self.schema.table_info(name) else {
                    return plan_err!("Unknown table '{name}'.");
                };
                let unique_keys = info
                    .unique_constraints()
                    .map(|key| key.columns().to_vec())
                    .collect();
                SqlTable::new(id, TableSource::Table(info.name().to_owned()), unique_keys)
            }
            LogicalTable::SqlQuery(query) => {
                SqlTable::new(id, TableSource::Query(query.clone()), Vec::new())
            }
        })
    }

    /// The variable of a column of `table`. Each column has one variable per occurrence.
    ///
    /// The columns of literal SQL queries have no known type and are read as nullable strings.
    pub fn column(&mut self, table: &mut SqlTable, name: &str) -> DFResult<CalculusVariable> {
        if let Some(variable) = table.column(name) {
            return Ok(variable.clone());
        }

        let variable = match table.source() {
            TableSource::Table(table_name) => {
                let column = self
                    .schema
                    .table_info(table_name)
                    .and_then(|info| info.column(name).cloned());
                let Some(column) = column else {
                    return plan_err!("Unknown column '{name}' of table '{table_name}'.");
                };
                self.generator.column_variable(
                    column.name.as_str(),
                    Arc::clone(&column.sql_type),
                    column.nullable,
                )
            }
            TableSource::Query(_) => {
                self.generator
                    .column_variable(name, self.dialect.string_type(), true)
            }
        };
        table.add_column(variable.clone());
        Ok(variable)
    }
}
