use oxiri::IriParseError;
use oxrdf::BlankNodeIdParseError;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use thiserror::Error;

/// The result of materializing a value read from the database.
pub type ThinResult<T> = Result<T, ThinError>;

/// A failure to turn database values into an RDF term.
///
/// A template can expand to a string that is not a valid IRI, a column can be `NULL`, or a type
/// code can be unknown. These failures depend on the data and only leave the affected variable
/// unbound, so no reason is kept.
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
pub struct ThinError {}

impl ThinError {
    /// Fails with a [ThinError].
    pub fn expected<T>() -> ThinResult<T> {
        Err(ThinError::default())
    }
}

impl Display for ThinError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("The values do not form a valid RDF term.")
    }
}

macro_rules! thin_error_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ThinError {
                fn from(_: $t) -> Self {
                    ThinError::default()
                }
            }
        )*
    };
}

thin_error_from!(ParseIntError, BlankNodeIdParseError, IriParseError);

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{BlankNode, NamedNode};

    fn parse_case(value: &str) -> ThinResult<i64> {
        Ok(value.trim().parse()?)
    }

    #[test]
    fn test_parse_errors_become_thin_errors() {
        assert_eq!(parse_case(" 2 "), Ok(2));
        assert_eq!(parse_case("two"), Err(ThinError {}));
        assert_eq!(
            NamedNode::new("not an iri").map_err(ThinError::from),
            Err(ThinError {})
        );
        assert_eq!(BlankNode::new("").map_err(ThinError::from), Err(ThinError {}));
    }
}
