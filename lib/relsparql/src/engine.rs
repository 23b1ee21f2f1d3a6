use crate::error::QueryEvaluationError;
use crate::naming::QueryNaming;
use crate::results::{QueryResults, QuerySolutionIter};
use crate::sql::SqlWriter;
use relsparql_algebra::passes::SafeAlgebraPasses;
use relsparql_algebra::{convert_query, MappingTransformer, QueryForm};
use relsparql_common::{
    DFResult, QueryResultRow, SchemaProvider, SqlDatabase, SqlDialect, SqlDialectRef,
};
use relsparql_logical::calculus::CalculusVariable;
use relsparql_logical::{RelationalBuilder, RelationalQuery};
use relsparql_mapping::R2RmlMapping;
use relsparql_model::{Iri, Term, Variable};
use relsparql_optimizer::{CalculusOptimizer, OptimizationLevel};
use sparesults::QuerySolution;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, trace};

/// Options for a single query compilation.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    /// The optimizations applied to the relational model.
    pub optimization_level: OptimizationLevel,
    /// The base IRI used to resolve relative IRIs of the query and of the mapping.
    pub base_iri: Option<String>,
}

/// Evaluates SPARQL queries over a relational database.
///
/// The engine compiles a query into a single SQL statement: the mapping expands the triple
/// patterns, the relational builder produces a calculus model, the optimizers rewrite the model
/// and the [SqlWriter] renders it for the dialect of the database. The rows of the statement
/// are then turned into solutions by the value binders of the query.
///
/// The mapping, the schema and the dialect are shared read-only between compilations.
#[derive(Clone)]
pub struct RelSparqlEngine {
    mapping: Arc<R2RmlMapping>,
    schema: Arc<dyn SchemaProvider>,
    dialect: SqlDialectRef,
    database: Arc<dyn SqlDatabase>,
}

impl RelSparqlEngine {
    pub fn new(
        mapping: Arc<R2RmlMapping>,
        schema: Arc<dyn SchemaProvider>,
        dialect: SqlDialectRef,
        database: Arc<dyn SqlDatabase>,
    ) -> Self {
        Self {
            mapping,
            schema,
            dialect,
            database,
        }
    }

    pub fn mapping(&self) -> &R2RmlMapping {
        &self.mapping
    }

    pub fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    /// Compiles a query without executing it.
    pub fn compile(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<CompiledQuery, QueryEvaluationError> {
        let parsed = spargebra::Query::parse(query, options.base_iri.as_deref())?;
        let mut query = convert_query(&parsed)?;
        let base_iri = query
            .base_iri
            .as_ref()
            .map(|iri| {
                Iri::parse(iri.clone()).map_err(|error| QueryEvaluationError::InvalidBaseIri {
                    iri: iri.clone(),
                    error,
                })
            })
            .transpose()?;

        let pattern = MappingTransformer::new(Arc::clone(&self.mapping))
            .transform(query.pattern)?
            .data;
        query.pattern = SafeAlgebraPasses::default().apply(pattern)?.data;

        let relational = RelationalBuilder::new(
            Arc::clone(&self.mapping),
            Arc::clone(&self.schema),
            Arc::clone(&self.dialect),
        )
        .build(&query)?;
        let relational = CalculusOptimizer::with_level(options.optimization_level)
            .optimize(relational)?
            .data;
        trace!("Optimized relational query:\n{relational}");

        Ok(CompiledQuery::new(relational, self.dialect.as_ref(), base_iri)?)
    }

    /// Executes a compiled query.
    ///
    /// A query whose model can never produce a tuple is answered without contacting the
    /// database.
    pub fn execute(&self, query: CompiledQuery) -> Result<QueryResults<'_>, QueryEvaluationError> {
        let reader = match query.sql() {
            Some(sql) => Some(self.database.execute_query(sql)?),
            None => None,
        };
        Ok(match (query.form(), reader) {
            (QueryForm::Ask, Some(mut reader)) => {
                QueryResults::Boolean(reader.next_row()?.is_some())
            }
            (QueryForm::Ask, None) => QueryResults::Boolean(false),
            (QueryForm::Select, Some(reader)) => {
                QueryResults::Solutions(QuerySolutionIter::new(query, reader))
            }
            (QueryForm::Select, None) => QueryResults::Solutions(QuerySolutionIter::empty(query)),
        })
    }

    /// Compiles and executes a query.
    pub fn query(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<QueryResults<'_>, QueryEvaluationError> {
        let compiled = self.compile(query, options)?;
        self.execute(compiled)
    }
}

impl Debug for RelSparqlEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelSparqlEngine")
            .field("mapping", &self.mapping)
            .field("schema", &self.schema)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

/// A query compiled into a SQL statement.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    query: RelationalQuery,
    variables: Arc<[Variable]>,
    /// [None] if the query has no solutions.
    sql: Option<String>,
    naming: QueryNaming,
    base_iri: Option<Iri<String>>,
}

impl CompiledQuery {
    fn new(
        query: RelationalQuery,
        dialect: &dyn SqlDialect,
        base_iri: Option<Iri<String>>,
    ) -> DFResult<Self> {
        let variables = query.output_variables().cloned().collect::<Vec<_>>().into();
        let naming = QueryNaming::new(&query.model);
        let sql = if query.is_empty() {
            debug!("The query has no solutions, no SQL is generated");
            None
        } else {
            let sql = SqlWriter::new(dialect, &naming).write_query(&query.model)?;
            debug!("Generated SQL: {sql}");
            Some(sql)
        };
        Ok(Self {
            query,
            variables,
            sql,
            naming,
            base_iri,
        })
    }

    pub fn form(&self) -> QueryForm {
        self.query.form
    }

    /// The SQL statement. [None] if the query can be answered without the database.
    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    /// The optimized relational form of the query.
    pub fn relational_query(&self) -> &RelationalQuery {
        &self.query
    }

    pub fn naming(&self) -> &QueryNaming {
        &self.naming
    }

    /// The output variables of a `SELECT` query.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The column names of the SQL statement, in select order.
    pub fn output_columns(&self) -> DFResult<Vec<&str>> {
        self.query
            .model
            .variables
            .iter()
            .map(|variable| self.naming.variable_name(variable))
            .collect()
    }

    /// Materializes the solution of a result row.
    pub(crate) fn solution(&self, row: &QueryResultRow) -> QuerySolution {
        let lookup = |variable: &CalculusVariable| {
            let column = self.naming.variable_name(variable).ok()?;
            row.string_value(column).map(ToOwned::to_owned)
        };

        let mut values: Vec<Option<Term>> = Vec::with_capacity(self.query.bindings.len());
        for (variable, binder) in &self.query.bindings {
            match binder.bind(&lookup, self.base_iri.as_ref()) {
                Ok(term) => values.push(Some(term)),
                Err(_) => {
                    if binder
                        .needed_variables()
                        .iter()
                        .any(|needed| lookup(needed).is_some())
                    {
                        debug!("The values of {variable} do not form a valid term");
                    }
                    values.push(None);
                }
            }
        }
        QuerySolution::from((Arc::clone(&self.variables), values))
    }
}
