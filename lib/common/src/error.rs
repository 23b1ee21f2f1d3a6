use datafusion::error::DataFusionError;
use std::error::Error;
use std::io;

/// An error raised by the relational database that executes the generated SQL.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DatabaseError {
    /// Error from the OS I/O layer.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The database refused to execute the statement.
    #[error("The database rejected the query: {0}")]
    Rejected(String),
    /// A result value could not be read.
    #[error("Invalid value in column {column}: {message}")]
    InvalidValue { column: String, message: String },
    #[error("{0}")]
    Other(#[source] Box<dyn Error + Send + Sync + 'static>),
}

impl DatabaseError {
    /// Builds an error for a statement the database refused.
    #[inline]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

impl From<DatabaseError> for io::Error {
    #[inline]
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Io(error) => error,
            other => Self::other(other),
        }
    }
}

impl From<DataFusionError> for DatabaseError {
    #[inline]
    fn from(error: DataFusionError) -> Self {
        Self::Other(Box::new(error))
    }
}
