//! Value binders turn the values of result columns back into RDF terms.
//!
//! Every output variable of a query has a [ValueBinder]. The binder names the calculus
//! variables it needs, can describe its term as an [ExpressionsSet] for use in conditions,
//! and materializes the term from a result row.

use crate::calculus::{write_list, CalculusVariable, CaseBranch, Expression, FilterCondition};
use crate::expression_sets::{all_of, any_of, equal, lang_string_type, ExpressionsSet};
use datafusion::common::internal_err;
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::{DFResult, SqlDialect, SqlTypeKind};
use relsparql_mapping::{TemplatePart, TermGenerationContext, TermMap, TermMapValue, TermType};
use relsparql_model::vocab::xsd;
use relsparql_model::{
    BlankNode, Iri, Literal, NamedNode, NamedNodeRef, Term, ThinError, ThinResult, TypeCategory,
};
use std::fmt::{Display, Formatter};

/// Generates terms with a term map of the mapping. `columns` maps the columns referenced by
/// the term map to the calculus variables that hold their values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseValueBinder {
    term_map: TermMap,
    columns: Vec<(String, CalculusVariable)>,
}

impl BaseValueBinder {
    pub fn new(term_map: TermMap, columns: Vec<(String, CalculusVariable)>) -> Self {
        Self { term_map, columns }
    }

    pub fn term_map(&self) -> &TermMap {
        &self.term_map
    }

    pub fn columns(&self) -> &[(String, CalculusVariable)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&CalculusVariable> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, variable)| variable)
    }

    /// Checks whether both binders generate terms with the same term map.
    pub fn has_same_shape(&self, other: &BaseValueBinder) -> bool {
        self.term_map == other.term_map
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|((a, _), (b, _))| a == b)
    }

    fn natural_datatype(&self) -> Option<NamedNodeRef<'static>> {
        match self.term_map.value() {
            TermMapValue::Column(column) => self
                .column(column)
                .and_then(|variable| variable.sql_type().default_rdf_type().ok()),
            _ => None,
        }
    }

    fn variable(&self, column: &str) -> DFResult<&CalculusVariable> {
        match self.column(column) {
            Some(variable) => Ok(variable),
            None => internal_err!("Column '{column}' of a term map has no variable."),
        }
    }

    fn text(&self, column: &str, dialect: &dyn SqlDialect) -> DFResult<Expression> {
        let variable = self.variable(column)?;
        Ok(match variable.sql_type().kind() {
            SqlTypeKind::String => Expression::column(variable),
            _ => Expression::cast(Expression::column(variable), dialect.string_type()),
        })
    }

    /// The text of a column in a template. IRI templates use the IRI-safe version of the text.
    /// The text of an integer is already IRI-safe.
    fn template_text(&self, column: &str, dialect: &dyn SqlDialect) -> DFResult<Expression> {
        let text = self.text(column, dialect)?;
        let is_integer = self.variable(column)?.sql_type().kind() == SqlTypeKind::Integer;
        Ok(match self.term_map.term_type() {
            TermType::Iri if !is_integer => Expression::iri_safe(text),
            _ => text,
        })
    }

    fn expressions(&self, dialect: &dyn SqlDialect) -> DFResult<ExpressionsSet> {
        let string_value = match self.term_map.value() {
            TermMapValue::Constant(term) => return Ok(ExpressionsSet::from_term(term.as_ref())),
            TermMapValue::Column(column) => self.text(column, dialect)?,
            TermMapValue::Template(template) => Expression::Concatenation(
                template
                    .parts()
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Text(text) => Ok(Expression::string(text.as_str())),
                        TemplatePart::Column(column) => self.template_text(column, dialect),
                    })
                    .collect::<DFResult<_>>()?,
            ),
        };
        let is_not_error = bound_columns(&self.columns);

        let mut result = ExpressionsSet::iri(is_not_error, string_value);
        match self.term_map.term_type() {
            TermType::Iri => {}
            TermType::BlankNode => {
                result.type_category = Expression::integer(TypeCategory::BlankNode.code());
            }
            TermType::Literal => self.literal_expressions(&mut result, dialect)?,
        }
        Ok(result)
    }

    fn literal_expressions(
        &self,
        result: &mut ExpressionsSet,
        dialect: &dyn SqlDialect,
    ) -> DFResult<()> {
        if let Some(language) = self.term_map.language() {
            result.type_category = Expression::integer(TypeCategory::LangString.code());
            result.type_iri = lang_string_type();
            result.language = Expression::string(language);
            return Ok(());
        }

        let datatype = self
            .term_map
            .datatype()
            .or_else(|| self.natural_datatype())
            .unwrap_or(xsd::STRING);
        let category = TypeCategory::from_datatype(datatype);
        result.type_category = Expression::integer(category.code());
        result.type_iri = Expression::string(datatype.as_str());

        let column = match self.term_map.value() {
            TermMapValue::Column(column) => Some(self.variable(column)?),
            _ => None,
        };
        let column_kind = column.map(|v| v.sql_type().kind());
        match category {
            TypeCategory::NumericLiteral => {
                result.numeric_value = match column {
                    Some(variable) if column_kind.is_some_and(SqlTypeKind::is_numeric) => {
                        Expression::column(variable)
                    }
                    _ => Expression::cast(result.string_value.clone(), dialect.decimal_type()),
                };
            }
            TypeCategory::BooleanLiteral => {
                let (true_value, false_value) = match column {
                    Some(variable) if column_kind == Some(SqlTypeKind::Boolean) => (
                        equal(Expression::column(variable), Expression::integer(1)),
                        equal(Expression::column(variable), Expression::integer(0)),
                    ),
                    _ => (
                        any_of(["true", "1"].map(|v| {
                            equal(result.string_value.clone(), Expression::string(v))
                        })),
                        any_of(["false", "0"].map(|v| {
                            equal(result.string_value.clone(), Expression::string(v))
                        })),
                    ),
                };
                let choose = |on_true: Expression, on_false: Expression| {
                    Expression::case(vec![
                        CaseBranch::new(true_value.clone(), on_true),
                        CaseBranch::new(false_value.clone(), on_false),
                    ])
                };
                result.boolean_value = choose(Expression::integer(1), Expression::integer(0));
                if column_kind == Some(SqlTypeKind::Boolean) {
                    result.string_value =
                        choose(Expression::string("true"), Expression::string("false"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn bind(
        &self,
        lookup: &impl Fn(&CalculusVariable) -> Option<String>,
        base_iri: Option<&Iri<String>>,
    ) -> ThinResult<Term> {
        let context = TermGenerationContext {
            natural_datatype: self.natural_datatype(),
            base_iri,
        };
        self.term_map
            .generate_term(|column| self.column(column).and_then(lookup), context)
    }
}

/// Selects the binder of the union branch that produced a tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchValueBinder {
    pub case_variable: CalculusVariable,
    pub cases: Vec<(i64, ValueBinder)>,
}

/// Reads a term that was computed by a SPARQL expression. Holds one variable per part of the
/// [ExpressionsSet]. The category is `NULL` if the expression was an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSetValueBinder {
    pub type_category: CalculusVariable,
    pub type_iri: CalculusVariable,
    pub string_value: CalculusVariable,
    pub numeric_value: CalculusVariable,
    pub boolean_value: CalculusVariable,
    pub language: CalculusVariable,
}

impl ExpressionSetValueBinder {
    fn variables(&self) -> [&CalculusVariable; 6] {
        [
            &self.type_category,
            &self.type_iri,
            &self.string_value,
            &self.numeric_value,
            &self.boolean_value,
            &self.language,
        ]
    }

    fn bind(&self, lookup: &impl Fn(&CalculusVariable) -> Option<String>) -> ThinResult<Term> {
        let read = |variable: &CalculusVariable| lookup(variable).ok_or(ThinError::default());
        let category = TypeCategory::from_code(read(&self.type_category)?.trim().parse()?)
            .ok_or(ThinError::default())?;
        let value = read(&self.string_value)?;
        Ok(match category {
            TypeCategory::Iri => NamedNode::new(value)?.into(),
            TypeCategory::BlankNode => BlankNode::new(value)?.into(),
            TypeCategory::SimpleLiteral | TypeCategory::StringLiteral => {
                Literal::new_simple_literal(value).into()
            }
            TypeCategory::LangString => {
                Literal::new_language_tagged_literal(value, read(&self.language)?)
                    .map_err(|_| ThinError::default())?
                    .into()
            }
            TypeCategory::NumericLiteral
            | TypeCategory::BooleanLiteral
            | TypeCategory::DateTimeLiteral
            | TypeCategory::OtherLiteral => {
                Literal::new_typed_literal(value, NamedNode::new(read(&self.type_iri)?)?).into()
            }
        })
    }
}

/// Produces the RDF term of an output variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueBinder {
    Base(BaseValueBinder),
    /// The first child that produces a term.
    Coalesce(Vec<ValueBinder>),
    Switch(SwitchValueBinder),
    ExpressionSet(ExpressionSetValueBinder),
    /// Never produces a term.
    Empty,
}

impl ValueBinder {
    /// The calculus variables read by this binder, without duplicates.
    pub fn needed_variables(&self) -> Vec<CalculusVariable> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables(&self, result: &mut Vec<CalculusVariable>) {
        let mut push = |variable: &CalculusVariable| {
            if !result.contains(variable) {
                result.push(variable.clone());
            }
        };
        match self {
            ValueBinder::Base(binder) => binder.columns.iter().for_each(|(_, v)| push(v)),
            ValueBinder::Coalesce(children) => {
                for child in children {
                    child.collect_variables(result);
                }
            }
            ValueBinder::Switch(switch) => {
                push(&switch.case_variable);
                for (_, child) in &switch.cases {
                    child.collect_variables(result);
                }
            }
            ValueBinder::ExpressionSet(binder) => binder.variables().into_iter().for_each(push),
            ValueBinder::Empty => {}
        }
    }

    /// Holds for the tuples for which this binder produces a term. Materialization may still
    /// fail for values that do not form valid terms.
    pub fn bound_condition(&self) -> FilterCondition {
        match self {
            ValueBinder::Base(binder) => bound_columns(&binder.columns),
            ValueBinder::Coalesce(children) => {
                any_of(children.iter().map(ValueBinder::bound_condition))
            }
            ValueBinder::Switch(switch) => any_of(switch.cases.iter().map(|(case, child)| {
                all_of([
                    equal(
                        Expression::column(&switch.case_variable),
                        Expression::integer(*case),
                    ),
                    child.bound_condition(),
                ])
            })),
            ValueBinder::ExpressionSet(binder) => {
                FilterCondition::is_not_null(&binder.type_category)
            }
            ValueBinder::Empty => FilterCondition::AlwaysFalse,
        }
    }

    /// Describes the produced term in SQL.
    pub fn expressions(&self, dialect: &dyn SqlDialect) -> DFResult<ExpressionsSet> {
        Ok(match self {
            ValueBinder::Base(binder) => binder.expressions(dialect)?,
            ValueBinder::Coalesce(children) => ExpressionsSet::choose(
                children
                    .iter()
                    .map(|child| Ok((FilterCondition::AlwaysTrue, child.expressions(dialect)?)))
                    .collect::<DFResult<_>>()?,
            ),
            ValueBinder::Switch(switch) => ExpressionsSet::choose(
                switch
                    .cases
                    .iter()
                    .map(|(case, child)| {
                        let condition = equal(
                            Expression::column(&switch.case_variable),
                            Expression::integer(*case),
                        );
                        Ok((condition, child.expressions(dialect)?))
                    })
                    .collect::<DFResult<_>>()?,
            ),
            ValueBinder::ExpressionSet(binder) => ExpressionsSet {
                is_not_error: FilterCondition::is_not_null(&binder.type_category),
                type_category: Expression::column(&binder.type_category),
                type_iri: Expression::column(&binder.type_iri),
                string_value: Expression::column(&binder.string_value),
                numeric_value: Expression::column(&binder.numeric_value),
                boolean_value: Expression::column(&binder.boolean_value),
                language: Expression::column(&binder.language),
            },
            ValueBinder::Empty => ExpressionsSet::error(),
        })
    }

    /// Replaces the variables for which `f` returns a replacement.
    pub fn map_variables(
        self,
        mut f: impl FnMut(&CalculusVariable) -> Option<CalculusVariable>,
    ) -> DFResult<Transformed<ValueBinder>> {
        self.transform_up(|binder| Ok(binder.map_own_variables(&mut f)))
    }

    fn map_own_variables(
        self,
        f: &mut impl FnMut(&CalculusVariable) -> Option<CalculusVariable>,
    ) -> Transformed<ValueBinder> {
        let mut transformed = false;
        let mut map = |variable: CalculusVariable| match f(&variable) {
            Some(replacement) => {
                transformed = true;
                replacement
            }
            None => variable,
        };
        let result = match self {
            ValueBinder::Base(binder) => ValueBinder::Base(BaseValueBinder {
                term_map: binder.term_map,
                columns: binder
                    .columns
                    .into_iter()
                    .map(|(column, variable)| (column, map(variable)))
                    .collect(),
            }),
            ValueBinder::Switch(switch) => ValueBinder::Switch(SwitchValueBinder {
                case_variable: map(switch.case_variable),
                cases: switch.cases,
            }),
            ValueBinder::ExpressionSet(binder) => {
                ValueBinder::ExpressionSet(ExpressionSetValueBinder {
                    type_category: map(binder.type_category),
                    type_iri: map(binder.type_iri),
                    string_value: map(binder.string_value),
                    numeric_value: map(binder.numeric_value),
                    boolean_value: map(binder.boolean_value),
                    language: map(binder.language),
                })
            }
            other @ (ValueBinder::Coalesce(_) | ValueBinder::Empty) => other,
        };
        Transformed::new_transformed(result, transformed)
    }

    /// Materializes the term of a tuple. `lookup` returns the value of a variable, [None] for
    /// `NULL`.
    pub fn bind(
        &self,
        lookup: &impl Fn(&CalculusVariable) -> Option<String>,
        base_iri: Option<&Iri<String>>,
    ) -> ThinResult<Term> {
        match self {
            ValueBinder::Base(binder) => binder.bind(lookup, base_iri),
            ValueBinder::Coalesce(children) => children
                .iter()
                .find_map(|child| child.bind(lookup, base_iri).ok())
                .ok_or(ThinError::default()),
            ValueBinder::Switch(switch) => {
                let case: i64 = lookup(&switch.case_variable)
                    .ok_or(ThinError::default())?
                    .trim()
                    .parse()?;
                match switch.cases.iter().find(|(c, _)| *c == case) {
                    Some((_, child)) => child.bind(lookup, base_iri),
                    None => ThinError::expected(),
                }
            }
            ValueBinder::ExpressionSet(binder) => binder.bind(lookup),
            ValueBinder::Empty => ThinError::expected(),
        }
    }
}

fn bound_columns(columns: &[(String, CalculusVariable)]) -> FilterCondition {
    all_of(
        columns
            .iter()
            .map(|(_, variable)| FilterCondition::is_not_null(variable)),
    )
}

impl Display for ValueBinder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueBinder::Base(binder) => {
                match binder.term_map.value() {
                    TermMapValue::Constant(term) => write!(f, "Base({term}")?,
                    TermMapValue::Column(column) => write!(f, "Base({{{column}}}")?,
                    TermMapValue::Template(template) => write!(f, "Base({template}")?,
                }
                for (_, variable) in &binder.columns {
                    write!(f, " {variable}")?;
                }
                write!(f, ")")
            }
            ValueBinder::Coalesce(children) => {
                write!(f, "Coalesce(")?;
                write_list(f, children, ", ")?;
                write!(f, ")")
            }
            ValueBinder::Switch(switch) => {
                write!(f, "Switch({}", switch.case_variable)?;
                for (case, child) in &switch.cases {
                    write!(f, ", {case} => {child}")?;
                }
                write!(f, ")")
            }
            ValueBinder::ExpressionSet(binder) => {
                write!(f, "ExpressionSet(")?;
                write_list(f, &binder.variables(), ", ")?;
                write!(f, ")")
            }
            ValueBinder::Empty => write!(f, "Empty"),
        }
    }
}
