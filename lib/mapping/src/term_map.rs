use crate::template::Template;
use relsparql_common::DFResult;
use relsparql_model::vocab::{rdf, xsd};
use relsparql_model::{
    BlankNode, Iri, Literal, NamedNode, NamedNodeRef, Term, TermRef, ThinError, ThinResult,
};

/// The kind of term generated by a [TermMap].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TermType {
    #[default]
    Iri,
    BlankNode,
    Literal,
}

impl TermType {
    /// Checks whether `term` is of this kind.
    pub fn matches(self, term: TermRef<'_>) -> bool {
        matches!(
            (self, term),
            (TermType::Iri, TermRef::NamedNode(_))
                | (TermType::BlankNode, TermRef::BlankNode(_))
                | (TermType::Literal, TermRef::Literal(_))
        )
    }
}

/// The position of a [TermMap] in a triples map. Determines the default [TermType].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermPosition {
    Subject,
    Predicate,
    Object,
    Graph,
}

/// How a [TermMap] obtains its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermMapValue {
    Constant(Term),
    Column(String),
    Template(Template),
}

/// Settings used when a term is generated from database values.
#[derive(Debug, Clone, Copy, Default)]
pub struct TermGenerationContext<'a> {
    /// The datatype that corresponds to the SQL type of a column value.
    pub natural_datatype: Option<NamedNodeRef<'a>>,
    /// Resolves relative IRIs.
    pub base_iri: Option<&'a Iri<String>>,
}

/// An R2RML term map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermMap {
    position: TermPosition,
    value: TermMapValue,
    term_type: Option<TermType>,
    datatype: Option<NamedNode>,
    language: Option<String>,
}

impl TermMap {
    /// A constant-valued term map.
    pub fn constant(position: TermPosition, term: impl Into<Term>) -> Self {
        Self::new(position, TermMapValue::Constant(term.into()))
    }

    /// A column-valued term map.
    pub fn column(position: TermPosition, column: impl Into<String>) -> Self {
        Self::new(position, TermMapValue::Column(column.into()))
    }

    /// A template-valued term map.
    pub fn template(position: TermPosition, template: &str) -> DFResult<Self> {
        Ok(Self::new(
            position,
            TermMapValue::Template(Template::parse(template)?),
        ))
    }

    fn new(position: TermPosition, value: TermMapValue) -> Self {
        Self {
            position,
            value,
            term_type: None,
            datatype: None,
            language: None,
        }
    }

    #[must_use]
    pub fn with_term_type(mut self, term_type: TermType) -> Self {
        self.term_type = Some(term_type);
        self
    }

    /// Sets the datatype of generated literals. Implies [TermType::Literal].
    #[must_use]
    pub fn with_datatype(mut self, datatype: NamedNode) -> Self {
        self.datatype = Some(datatype);
        self
    }

    /// Sets the language of generated literals. Implies [TermType::Literal].
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into().to_ascii_lowercase());
        self
    }

    pub fn position(&self) -> TermPosition {
        self.position
    }

    pub fn value(&self) -> &TermMapValue {
        &self.value
    }

    pub fn datatype(&self) -> Option<NamedNodeRef<'_>> {
        self.datatype.as_ref().map(NamedNode::as_ref)
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// The constant term, if this term map is constant-valued.
    pub fn as_constant(&self) -> Option<&Term> {
        match &self.value {
            TermMapValue::Constant(term) => Some(term),
            _ => None,
        }
    }

    /// The type of the generated terms, applying the R2RML defaults.
    pub fn term_type(&self) -> TermType {
        if let TermMapValue::Constant(term) = &self.value {
            return match term {
                Term::NamedNode(_) => TermType::Iri,
                Term::BlankNode(_) => TermType::BlankNode,
                Term::Literal(_) => TermType::Literal,
            };
        }
        if let Some(term_type) = self.term_type {
            return term_type;
        }

        let literal_by_default = self.position == TermPosition::Object
            && (matches!(self.value, TermMapValue::Column(_))
                || self.datatype.is_some()
                || self.language.is_some());
        if literal_by_default {
            TermType::Literal
        } else {
            TermType::Iri
        }
    }

    /// The columns referenced by this term map in order of appearance.
    pub fn columns(&self) -> Vec<&str> {
        match &self.value {
            TermMapValue::Constant(_) => Vec::new(),
            TermMapValue::Column(column) => vec![column.as_str()],
            TermMapValue::Template(template) => template.columns().collect(),
        }
    }

    /// Checks whether this term map is the constant `rr:defaultGraph`.
    pub fn is_default_graph(&self) -> bool {
        matches!(&self.value, TermMapValue::Constant(Term::NamedNode(node)) if node.as_ref() == relsparql_model::vocab::rr::DEFAULT_GRAPH)
    }

    /// Checks whether this term map could generate `term`.
    ///
    /// Returns false only if it provably cannot.
    pub fn can_produce(&self, term: TermRef<'_>) -> bool {
        if let TermMapValue::Constant(constant) = &self.value {
            return constant.as_ref() == term;
        }
        if !self.term_type().matches(term) {
            return false;
        }

        match term {
            TermRef::NamedNode(node) => match &self.value {
                TermMapValue::Template(template) => template.can_produce(node.as_str()),
                _ => true,
            },
            TermRef::BlankNode(_) => true,
            TermRef::Literal(literal) => {
                if let Some(language) = &self.language {
                    return literal
                        .language()
                        .is_some_and(|l| l.eq_ignore_ascii_case(language));
                }
                if literal.language().is_some() {
                    return false;
                }
                match (&self.datatype, &self.value) {
                    (Some(datatype), _) => literal.datatype() == datatype.as_ref(),
                    (None, TermMapValue::Template(template)) => {
                        literal.datatype() == xsd::STRING && template.can_produce(literal.value())
                    }
                    (None, _) => true,
                }
            }
        }
    }

    /// Generates a term from column values. `lookup` returns [None] for `NULL`.
    ///
    /// Fails with [ThinError] if a referenced column is `NULL` or the value cannot be turned
    /// into a valid term.
    pub fn generate_term(
        &self,
        mut lookup: impl FnMut(&str) -> Option<String>,
        context: TermGenerationContext<'_>,
    ) -> ThinResult<Term> {
        let term_type = self.term_type();
        let value = match &self.value {
            TermMapValue::Constant(term) => return Ok(term.clone()),
            TermMapValue::Column(column) => lookup(column).ok_or(ThinError {})?,
            TermMapValue::Template(template) => template
                .expand(lookup, term_type == TermType::Iri)
                .ok_or(ThinError {})?,
        };

        match term_type {
            TermType::Iri => Ok(create_iri(value, context.base_iri)?.into()),
            TermType::BlankNode => Ok(BlankNode::new(value)?.into()),
            TermType::Literal => Ok(self.create_literal(value, context).into()),
        }
    }

    fn create_literal(&self, value: String, context: TermGenerationContext<'_>) -> Literal {
        if let Some(language) = &self.language {
            return Literal::new_language_tagged_literal_unchecked(value, language);
        }
        if let Some(datatype) = &self.datatype {
            return Literal::new_typed_literal(value, datatype.clone());
        }

        let natural_datatype = match &self.value {
            TermMapValue::Column(_) => context.natural_datatype,
            _ => None,
        };
        match natural_datatype {
            None => Literal::new_simple_literal(value),
            Some(datatype) if datatype == xsd::STRING => Literal::new_simple_literal(value),
            Some(datatype) => {
                Literal::new_typed_literal(canonical_value(&value, datatype), datatype)
            }
        }
    }

    /// A term map that generates the `rdf:type` predicate.
    pub fn rdf_type() -> Self {
        Self::constant(TermPosition::Predicate, rdf::TYPE.into_owned())
    }
}

fn create_iri(value: String, base_iri: Option<&Iri<String>>) -> ThinResult<NamedNode> {
    match NamedNode::new(value.as_str()) {
        Ok(node) => Ok(node),
        Err(error) => match base_iri {
            Some(base) => Ok(NamedNode::new_unchecked(base.resolve(&value)?.into_inner())),
            None => Err(error.into()),
        },
    }
}

/// Maps database renderings of natural values onto the canonical lexical form.
fn canonical_value(value: &str, datatype: NamedNodeRef<'_>) -> String {
    if datatype == xsd::BOOLEAN {
        return match value {
            "1" => "true".to_owned(),
            "0" => "false".to_owned(),
            other => other.to_ascii_lowercase(),
        };
    }
    if datatype == xsd::DATE_TIME {
        return value.trim().replacen(' ', "T", 1);
    }
    value.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_model::{LiteralRef, NamedNodeRef};

    fn values(name: &str) -> Option<String> {
        match name {
            "id" => Some("12".to_owned()),
            "name" => Some("Jane Doe".to_owned()),
            "active" => Some("1".to_owned()),
            _ => None,
        }
    }

    #[test]
    fn test_default_term_types() {
        let subject = TermMap::template(TermPosition::Subject, "http://ex.org/{id}").unwrap();
        assert_eq!(subject.term_type(), TermType::Iri);

        let object = TermMap::column(TermPosition::Object, "name");
        assert_eq!(object.term_type(), TermType::Literal);

        let object = TermMap::template(TermPosition::Object, "http://ex.org/{id}").unwrap();
        assert_eq!(object.term_type(), TermType::Iri);

        let object = TermMap::template(TermPosition::Object, "{name}")
            .unwrap()
            .with_language("en");
        assert_eq!(object.term_type(), TermType::Literal);
    }

    #[test]
    fn test_generate_iri_from_template() {
        let map = TermMap::template(TermPosition::Subject, "http://ex.org/{name}").unwrap();
        let term = map
            .generate_term(values, TermGenerationContext::default())
            .unwrap();
        assert_eq!(
            term,
            NamedNode::new_unchecked("http://ex.org/Jane%20Doe").into()
        );
    }

    #[test]
    fn test_generate_literal_with_natural_datatype() {
        let map = TermMap::column(TermPosition::Object, "active");
        let context = TermGenerationContext {
            natural_datatype: Some(xsd::BOOLEAN),
            base_iri: None,
        };
        let term = map.generate_term(values, context).unwrap();
        assert_eq!(term.as_ref(), LiteralRef::new_typed_literal("true", xsd::BOOLEAN).into());
    }

    #[test]
    fn test_generate_from_null_column_fails() {
        let map = TermMap::column(TermPosition::Object, "missing");
        assert!(map
            .generate_term(values, TermGenerationContext::default())
            .is_err());
    }

    #[test]
    fn test_invalid_iri_fails_without_base() {
        let map = TermMap::column(TermPosition::Object, "name").with_term_type(TermType::Iri);
        assert!(map
            .generate_term(values, TermGenerationContext::default())
            .is_err());
    }

    #[test]
    fn test_relative_iri_is_resolved() {
        let base = Iri::parse("http://ex.org/base/".to_owned()).unwrap();
        let map = TermMap::column(TermPosition::Object, "id").with_term_type(TermType::Iri);
        let context = TermGenerationContext {
            natural_datatype: None,
            base_iri: Some(&base),
        };
        assert_eq!(
            map.generate_term(values, context).unwrap(),
            NamedNode::new_unchecked("http://ex.org/base/12").into()
        );
    }

    #[test]
    fn test_can_produce() {
        let map = TermMap::template(TermPosition::Subject, "http://ex.org/person/{id}").unwrap();
        assert!(map.can_produce(NamedNodeRef::new_unchecked("http://ex.org/person/1").into()));
        assert!(!map.can_produce(NamedNodeRef::new_unchecked("http://ex.org/dept/1").into()));
        assert!(!map.can_produce(LiteralRef::new_simple_literal("x").into()));

        let map = TermMap::column(TermPosition::Object, "name").with_language("en");
        assert!(map.can_produce(LiteralRef::new_language_tagged_literal_unchecked("x", "en").into()));
        assert!(!map.can_produce(LiteralRef::new_simple_literal("x").into()));

        let map = TermMap::constant(TermPosition::Object, Literal::new_simple_literal("a"));
        assert!(map.can_produce(LiteralRef::new_simple_literal("a").into()));
        assert!(!map.can_produce(LiteralRef::new_simple_literal("b").into()));
    }
}
