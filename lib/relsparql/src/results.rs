use crate::engine::CompiledQuery;
use crate::error::QueryEvaluationError;
use relsparql_common::QueryResultReader;
use relsparql_model::Variable;
use sparesults::QuerySolution;

/// Results of a [SPARQL query](https://www.w3.org/TR/sparql11-query/).
pub enum QueryResults<'a> {
    /// Results of a [SELECT](https://www.w3.org/TR/sparql11-query/#select) query.
    Solutions(QuerySolutionIter<'a>),
    /// Result of a [ASK](https://www.w3.org/TR/sparql11-query/#ask) query.
    Boolean(bool),
}

/// An iterator over [`QuerySolution`]s.
///
/// Rows are pulled from the database one at a time and materialized into RDF terms by the value
/// binders of the compiled query. A variable whose binder does not produce a valid term is left
/// unbound.
pub struct QuerySolutionIter<'a> {
    query: CompiledQuery,
    reader: Option<Box<dyn QueryResultReader + 'a>>,
}

impl<'a> QuerySolutionIter<'a> {
    pub(crate) fn new(query: CompiledQuery, reader: Box<dyn QueryResultReader + 'a>) -> Self {
        Self {
            query,
            reader: Some(reader),
        }
    }

    /// An iterator without any solution.
    pub(crate) fn empty(query: CompiledQuery) -> Self {
        Self {
            query,
            reader: None,
        }
    }

    /// The variables used in the solutions.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        self.query.variables()
    }
}

impl Iterator for QuerySolutionIter<'_> {
    type Item = Result<QuerySolution, QueryEvaluationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        match reader.next_row() {
            Ok(Some(row)) => Some(Ok(self.query.solution(&row))),
            Ok(None) => {
                self.reader = None;
                None
            }
            Err(error) => {
                self.reader = None;
                Some(Err(error.into()))
            }
        }
    }
}
