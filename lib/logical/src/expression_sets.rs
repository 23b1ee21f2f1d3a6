//! SQL representations of SPARQL values.
//!
//! SQL has no RDF terms. Every SPARQL expression is therefore compiled into an
//! [ExpressionsSet] that describes the computed term part by part, and every boolean SPARQL
//! expression is compiled into a [BooleanSet] that captures the three-valued logic of SPARQL
//! (true, false, error).

use crate::calculus::{CaseBranch, ComparisonType, Expression, FilterCondition, SqlValue};
use relsparql_model::vocab::{rdf, xsd};
use relsparql_model::{TermRef, TypeCategory};

/// Builds an equality that is folded into a constant if both sides are constants.
pub fn equal(left: Expression, right: Expression) -> FilterCondition {
    match (left.as_constant(), right.as_constant()) {
        (Some(l), Some(r)) if l == r => FilterCondition::AlwaysTrue,
        (Some(_), Some(_)) => FilterCondition::AlwaysFalse,
        _ => FilterCondition::EqualExpressions(left, right),
    }
}

/// A conjunction that drops `TRUE` operands and is `FALSE` if any operand is `FALSE`.
pub fn all_of(conditions: impl IntoIterator<Item = FilterCondition>) -> FilterCondition {
    let mut result = Vec::new();
    for condition in conditions {
        match condition.as_constant() {
            Some(true) => {}
            Some(false) => return FilterCondition::AlwaysFalse,
            None => result.push(condition),
        }
    }
    FilterCondition::conjunction(result)
}

/// A disjunction that drops `FALSE` operands and is `TRUE` if any operand is `TRUE`.
pub fn any_of(conditions: impl IntoIterator<Item = FilterCondition>) -> FilterCondition {
    let mut result = Vec::new();
    for condition in conditions {
        match condition.as_constant() {
            Some(false) => {}
            Some(true) => return FilterCondition::AlwaysTrue,
            None => result.push(condition),
        }
    }
    FilterCondition::disjunction(result)
}

/// A negation that is folded for constants.
pub fn negation(condition: FilterCondition) -> FilterCondition {
    match condition.as_constant() {
        Some(true) => FilterCondition::AlwaysFalse,
        Some(false) => FilterCondition::AlwaysTrue,
        None => condition.negate(),
    }
}

/// The parts of a SPARQL term computed in SQL.
///
/// The parts are only meaningful if `is_not_error` holds. IRIs and blank nodes have an empty
/// `type_iri`, simple literals have the type `xsd:string`. The `language` is empty for terms
/// without a language tag. `numeric_value` is only set for numeric literals and
/// `boolean_value` (1 or 0) only for boolean literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionsSet {
    pub is_not_error: FilterCondition,
    pub type_category: Expression,
    pub type_iri: Expression,
    pub string_value: Expression,
    pub numeric_value: Expression,
    pub boolean_value: Expression,
    pub language: Expression,
}

impl ExpressionsSet {
    /// A value that is always an error (unbound).
    pub fn error() -> Self {
        Self {
            is_not_error: FilterCondition::AlwaysFalse,
            type_category: Expression::Null,
            type_iri: Expression::Null,
            string_value: Expression::Null,
            numeric_value: Expression::Null,
            boolean_value: Expression::Null,
            language: Expression::Null,
        }
    }

    /// The constant parts of `term`.
    pub fn from_term(term: TermRef<'_>) -> Self {
        let category = TypeCategory::of_term(term);
        let (type_iri, value, language) = match term {
            TermRef::NamedNode(node) => ("", node.as_str(), ""),
            TermRef::BlankNode(node) => ("", node.as_str(), ""),
            TermRef::Literal(literal) => (
                literal.datatype().as_str(),
                literal.value(),
                literal.language().unwrap_or(""),
            ),
            #[allow(unreachable_patterns, reason = "Depends on the rdf-star feature of oxrdf")]
            _ => return Self::error(),
        };

        let numeric_value = match category {
            TypeCategory::NumericLiteral => numeric_constant(value),
            _ => None,
        };
        let boolean_value = match (category, value) {
            (TypeCategory::BooleanLiteral, "true" | "1") => Some(1),
            (TypeCategory::BooleanLiteral, "false" | "0") => Some(0),
            _ => None,
        };

        Self {
            is_not_error: FilterCondition::AlwaysTrue,
            type_category: Expression::integer(category.code()),
            type_iri: Expression::string(type_iri),
            string_value: Expression::string(value),
            numeric_value: numeric_value.map_or(Expression::Null, Expression::Constant),
            boolean_value: boolean_value.map_or(Expression::Null, Expression::integer),
            language: Expression::string(language),
        }
    }

    /// A simple literal (or `xsd:string` literal) with the given lexical form.
    pub fn string_literal(is_not_error: FilterCondition, value: Expression) -> Self {
        Self {
            is_not_error,
            type_category: Expression::integer(TypeCategory::StringLiteral.code()),
            type_iri: Expression::string(xsd::STRING.as_str()),
            string_value: value,
            numeric_value: Expression::Null,
            boolean_value: Expression::Null,
            language: Expression::string(""),
        }
    }

    /// An IRI with the given text.
    pub fn iri(is_not_error: FilterCondition, value: Expression) -> Self {
        Self {
            is_not_error,
            type_category: Expression::integer(TypeCategory::Iri.code()),
            type_iri: Expression::string(""),
            string_value: value,
            numeric_value: Expression::Null,
            boolean_value: Expression::Null,
            language: Expression::string(""),
        }
    }

    /// A numeric literal. `string_value` is the textual rendering of `numeric_value`.
    pub fn numeric(
        is_not_error: FilterCondition,
        type_iri: Expression,
        numeric_value: Expression,
        string_value: Expression,
    ) -> Self {
        Self {
            is_not_error,
            type_category: Expression::integer(TypeCategory::NumericLiteral.code()),
            type_iri,
            string_value,
            numeric_value,
            boolean_value: Expression::Null,
            language: Expression::string(""),
        }
    }

    /// The `xsd:boolean` literal computed by `value`. Errors of `value` are errors of the
    /// result.
    pub fn from_boolean(value: BooleanSet) -> Self {
        let BooleanSet {
            when_true,
            when_false,
        } = value;
        let choose = |on_true: Expression, on_false: Expression| {
            Expression::case(vec![
                CaseBranch::new(when_true.clone(), on_true),
                CaseBranch::new(when_false.clone(), on_false),
            ])
        };
        Self {
            is_not_error: any_of([when_true.clone(), when_false.clone()]),
            type_category: Expression::integer(TypeCategory::BooleanLiteral.code()),
            type_iri: Expression::string(xsd::BOOLEAN.as_str()),
            string_value: choose(Expression::string("true"), Expression::string("false")),
            numeric_value: Expression::Null,
            boolean_value: choose(Expression::integer(1), Expression::integer(0)),
            language: Expression::string(""),
        }
    }

    /// Chooses the value of the first branch whose condition holds and that is not an error.
    pub fn choose(branches: Vec<(FilterCondition, ExpressionsSet)>) -> Self {
        let branches = branches
            .into_iter()
            .map(|(condition, set)| (all_of([condition, set.is_not_error.clone()]), set))
            .filter(|(condition, _)| condition.as_constant() != Some(false))
            .collect::<Vec<_>>();

        // A branch that always applies shadows all later branches.
        let branches = match branches.iter().position(|(c, _)| c.as_constant() == Some(true)) {
            Some(position) => branches.into_iter().take(position + 1).collect(),
            None => branches,
        };
        if matches!(branches.as_slice(), [(FilterCondition::AlwaysTrue, _)]) {
            return branches
                .into_iter()
                .next()
                .map_or_else(Self::error, |(_, set)| set);
        }

        let part = |select: fn(&ExpressionsSet) -> &Expression| {
            Expression::case(
                branches
                    .iter()
                    .map(|(condition, set)| CaseBranch::new(condition.clone(), select(set).clone()))
                    .collect(),
            )
        };
        Self {
            is_not_error: any_of(branches.iter().map(|(c, _)| c.clone())),
            type_category: part(|s| &s.type_category),
            type_iri: part(|s| &s.type_iri),
            string_value: part(|s| &s.string_value),
            numeric_value: part(|s| &s.numeric_value),
            boolean_value: part(|s| &s.boolean_value),
            language: part(|s| &s.language),
        }
    }

    /// The category of this value, if it is known at compile time.
    pub fn constant_category(&self) -> Option<TypeCategory> {
        match self.type_category.as_constant() {
            Some(SqlValue::Integer(code)) => TypeCategory::from_code(*code),
            _ => None,
        }
    }

    /// Holds if the value is of `category`.
    pub fn has_category(&self, category: TypeCategory) -> FilterCondition {
        equal(
            self.type_category.clone(),
            Expression::integer(category.code()),
        )
    }

    /// Holds if the value is of one of `categories`.
    pub fn has_any_category(&self, categories: &[TypeCategory]) -> FilterCondition {
        any_of(categories.iter().map(|c| self.has_category(*c)))
    }

    /// Holds if the value is a plain string literal.
    pub fn is_string(&self) -> FilterCondition {
        self.has_any_category(&[TypeCategory::SimpleLiteral, TypeCategory::StringLiteral])
    }

    /// Holds if the value is a literal.
    pub fn is_literal(&self) -> FilterCondition {
        negation(self.has_any_category(&[TypeCategory::Iri, TypeCategory::BlankNode]))
    }

    /// Holds if both values are the same RDF term. Errors are not considered.
    pub fn same_term(&self, other: &ExpressionsSet) -> FilterCondition {
        all_of([
            equal(self.type_category.clone(), other.type_category.clone()),
            equal(self.string_value.clone(), other.string_value.clone()),
            equal(self.type_iri.clone(), other.type_iri.clone()),
            equal(self.language.clone(), other.language.clone()),
        ])
    }

    /// The expressions of this set in a fixed order.
    pub fn parts(&self) -> [&Expression; 6] {
        [
            &self.type_category,
            &self.type_iri,
            &self.string_value,
            &self.numeric_value,
            &self.boolean_value,
            &self.language,
        ]
    }
}

/// The SQL conditions under which a SPARQL boolean expression is true or false. If neither
/// holds, the expression is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanSet {
    pub when_true: FilterCondition,
    pub when_false: FilterCondition,
}

impl BooleanSet {
    pub fn new(when_true: FilterCondition, when_false: FilterCondition) -> Self {
        Self {
            when_true,
            when_false,
        }
    }

    pub fn constant(value: bool) -> Self {
        if value {
            Self::new(FilterCondition::AlwaysTrue, FilterCondition::AlwaysFalse)
        } else {
            Self::new(FilterCondition::AlwaysFalse, FilterCondition::AlwaysTrue)
        }
    }

    /// A boolean that is true if `condition` holds and false otherwise, unless `is_not_error`
    /// does not hold.
    pub fn from_condition(is_not_error: FilterCondition, condition: FilterCondition) -> Self {
        Self::new(
            all_of([is_not_error.clone(), condition.clone()]),
            all_of([is_not_error, negation(condition)]),
        )
    }

    /// The effective boolean value of `value`.
    pub fn effective_boolean_value(value: &ExpressionsSet) -> Self {
        let zero = || Expression::integer(0);
        let boolean = value.has_category(TypeCategory::BooleanLiteral);
        let numeric = value.has_category(TypeCategory::NumericLiteral);
        let string = value.is_string();

        let when_true = any_of([
            all_of([
                boolean.clone(),
                equal(value.boolean_value.clone(), Expression::integer(1)),
            ]),
            all_of([
                numeric.clone(),
                any_of([
                    FilterCondition::Comparison(
                        ComparisonType::Less,
                        value.numeric_value.clone(),
                        zero(),
                    ),
                    FilterCondition::Comparison(
                        ComparisonType::Greater,
                        value.numeric_value.clone(),
                        zero(),
                    ),
                ]),
            ]),
            all_of([
                string.clone(),
                negation(equal(value.string_value.clone(), Expression::string(""))),
            ]),
        ]);
        let when_false = any_of([
            all_of([boolean, equal(value.boolean_value.clone(), zero())]),
            all_of([numeric, equal(value.numeric_value.clone(), zero())]),
            all_of([
                string,
                equal(value.string_value.clone(), Expression::string("")),
            ]),
        ]);
        Self::new(
            all_of([value.is_not_error.clone(), when_true]),
            all_of([value.is_not_error.clone(), when_false]),
        )
    }

    /// `self && other` with the error semantics of SPARQL.
    pub fn and(self, other: BooleanSet) -> Self {
        Self::new(
            all_of([self.when_true, other.when_true]),
            any_of([self.when_false, other.when_false]),
        )
    }

    /// `self || other` with the error semantics of SPARQL.
    pub fn or(self, other: BooleanSet) -> Self {
        Self::new(
            any_of([self.when_true, other.when_true]),
            all_of([self.when_false, other.when_false]),
        )
    }

    /// `!self`
    pub fn negate(self) -> Self {
        Self::new(self.when_false, self.when_true)
    }
}

/// The SQL constant of a numeric lexical form, [None] if it is not a valid number.
fn numeric_constant(value: &str) -> Option<SqlValue> {
    let value = value.trim();
    if let Ok(integer) = value.parse::<i64>() {
        return Some(SqlValue::Integer(integer));
    }
    match value {
        "INF" | "-INF" | "NaN" => None,
        value if value.parse::<f64>().is_ok() => Some(SqlValue::Decimal(value.to_owned())),
        _ => None,
    }
}

/// The datatype of `rdf:langString` literals as text.
pub fn lang_string_type() -> Expression {
    Expression::string(rdf::LANG_STRING.as_str())
}
