use crate::vocab::{rdf, xsd};
use crate::{NamedNodeRef, TermRef};

/// A coarse classification of RDF terms that is computed inside SQL.
///
/// SQL has no notion of RDF terms. Hence, every compiled SPARQL expression carries an integer
/// column with the category of the term it computes. The discriminants are part of the generated
/// SQL and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCategory {
    Iri = 0,
    BlankNode = 1,
    SimpleLiteral = 2,
    StringLiteral = 3,
    LangString = 4,
    NumericLiteral = 5,
    BooleanLiteral = 6,
    DateTimeLiteral = 7,
    OtherLiteral = 8,
}

impl TypeCategory {
    /// All categories in the order of their discriminants.
    pub const ALL: [TypeCategory; 9] = [
        TypeCategory::Iri,
        TypeCategory::BlankNode,
        TypeCategory::SimpleLiteral,
        TypeCategory::StringLiteral,
        TypeCategory::LangString,
        TypeCategory::NumericLiteral,
        TypeCategory::BooleanLiteral,
        TypeCategory::DateTimeLiteral,
        TypeCategory::OtherLiteral,
    ];

    /// Returns the discriminant that is used in SQL.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Returns the category for a discriminant read from the database.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Categorizes a literal by its datatype.
    ///
    /// Simple literals are reported as [TypeCategory::StringLiteral] as RDF 1.1 does not
    /// distinguish them.
    pub fn from_datatype(datatype: NamedNodeRef<'_>) -> Self {
        if datatype == xsd::STRING {
            TypeCategory::StringLiteral
        } else if datatype == rdf::LANG_STRING {
            TypeCategory::LangString
        } else if is_numeric_datatype(datatype) {
            TypeCategory::NumericLiteral
        } else if datatype == xsd::BOOLEAN {
            TypeCategory::BooleanLiteral
        } else if datatype == xsd::DATE_TIME || datatype == xsd::DATE || datatype == xsd::TIME {
            TypeCategory::DateTimeLiteral
        } else {
            TypeCategory::OtherLiteral
        }
    }

    /// Categorizes an RDF term.
    pub fn of_term(term: TermRef<'_>) -> Self {
        match term {
            TermRef::NamedNode(_) => TypeCategory::Iri,
            TermRef::BlankNode(_) => TypeCategory::BlankNode,
            TermRef::Literal(literal) => {
                if literal.language().is_some() {
                    TypeCategory::LangString
                } else {
                    Self::from_datatype(literal.datatype())
                }
            }
            #[allow(unreachable_patterns, reason = "Depends on the rdf-star feature of oxrdf")]
            _ => TypeCategory::OtherLiteral,
        }
    }

    /// Returns true if terms of this category are literals.
    pub fn is_literal(self) -> bool {
        !matches!(self, TypeCategory::Iri | TypeCategory::BlankNode)
    }

    /// Returns true if the lexical form of terms of this category is a plain string
    /// (`xsd:string` or simple literal).
    pub fn is_string(self) -> bool {
        matches!(
            self,
            TypeCategory::SimpleLiteral | TypeCategory::StringLiteral
        )
    }
}

/// Returns true if `datatype` is one of the XSD numeric datatypes.
pub fn is_numeric_datatype(datatype: NamedNodeRef<'_>) -> bool {
    [
        xsd::INTEGER,
        xsd::DECIMAL,
        xsd::DOUBLE,
        xsd::FLOAT,
        xsd::INT,
        xsd::LONG,
        xsd::SHORT,
        xsd::BYTE,
        xsd::NON_NEGATIVE_INTEGER,
        xsd::POSITIVE_INTEGER,
        xsd::NON_POSITIVE_INTEGER,
        xsd::NEGATIVE_INTEGER,
        xsd::UNSIGNED_INT,
        xsd::UNSIGNED_LONG,
        xsd::UNSIGNED_SHORT,
        xsd::UNSIGNED_BYTE,
    ]
    .contains(&datatype)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Literal, NamedNode};

    #[test]
    fn test_category_codes_round_trip() {
        for category in TypeCategory::ALL {
            assert_eq!(TypeCategory::from_code(category.code()), Some(category));
        }
        assert_eq!(TypeCategory::from_code(42), None);
    }

    #[test]
    fn test_category_of_terms() {
        let iri = NamedNode::new_unchecked("http://example.com/a");
        assert_eq!(TypeCategory::of_term(iri.as_ref().into()), TypeCategory::Iri);

        let number = Literal::new_typed_literal("12", xsd::INTEGER);
        assert_eq!(
            TypeCategory::of_term(number.as_ref().into()),
            TypeCategory::NumericLiteral
        );

        let tagged = Literal::new_language_tagged_literal_unchecked("chat", "fr");
        assert_eq!(
            TypeCategory::of_term(tagged.as_ref().into()),
            TypeCategory::LangString
        );
    }
}
