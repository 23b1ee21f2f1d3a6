use datafusion::error::DataFusionError;
use relsparql_common::error::DatabaseError;
use relsparql_model::IriParseError;
use spargebra::SparqlSyntaxError;
use std::io;

/// An error raised while compiling or evaluating a SPARQL query.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    /// An error in SPARQL parsing.
    #[error(transparent)]
    Parsing(#[from] SparqlSyntaxError),
    /// An error from the database that executes the generated SQL.
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// The base IRI of the query is invalid.
    #[error("Invalid base IRI '{iri}': {error}")]
    InvalidBaseIri {
        /// The IRI itself.
        iri: String,
        /// The parsing error.
        #[source]
        error: IriParseError,
    },
    #[error("An error returned from the query engine: {0}")]
    Engine(DataFusionError),
    #[error("A feature has not yet been implemented: {0}")]
    NotImplemented(String),
    #[error("An internal error that likely indicates towards a bug in relsparql: {0}")]
    InternalError(String),
}

impl From<DataFusionError> for QueryEvaluationError {
    fn from(error: DataFusionError) -> Self {
        match error {
            DataFusionError::NotImplemented(message) => Self::NotImplemented(message),
            DataFusionError::Internal(message) => Self::InternalError(message),
            error => Self::Engine(error),
        }
    }
}

impl From<QueryEvaluationError> for io::Error {
    #[inline]
    fn from(error: QueryEvaluationError) -> Self {
        match error {
            QueryEvaluationError::Database(error) => error.into(),
            QueryEvaluationError::Parsing(_) | QueryEvaluationError::InvalidBaseIri { .. } => {
                Self::new(io::ErrorKind::InvalidInput, error.to_string())
            }
            error => Self::other(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::common::{internal_datafusion_err, plan_datafusion_err};

    #[test]
    fn test_engine_errors_are_classified() {
        let error =
            QueryEvaluationError::from(DataFusionError::NotImplemented("MINUS".to_owned()));
        assert!(matches!(error, QueryEvaluationError::NotImplemented(m) if m == "MINUS"));

        let error = QueryEvaluationError::from(internal_datafusion_err!("Broken invariant"));
        assert!(matches!(error, QueryEvaluationError::InternalError(_)));

        let error = QueryEvaluationError::from(plan_datafusion_err!("Unbound variable"));
        assert!(matches!(error, QueryEvaluationError::Engine(_)));
    }

    #[test]
    fn test_io_error_kind() {
        let error: io::Error =
            QueryEvaluationError::Database(DatabaseError::rejected("timeout")).into();
        assert_eq!(error.kind(), io::ErrorKind::Other);

        let syntax_error = spargebra::Query::parse("SELECT", None).unwrap_err();
        let error: io::Error = QueryEvaluationError::from(syntax_error).into();
        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }
}
