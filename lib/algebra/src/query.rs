use crate::expression::OrderExpression;
use crate::pattern::GraphPattern;
use relsparql_model::Variable;

/// The form of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryForm {
    Select,
    Ask,
}

/// The solution modifiers of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryModifiers {
    /// The projected variables. [None] projects every variable of the pattern.
    pub projection: Option<Vec<Variable>>,
    pub distinct: bool,
    pub order_by: Vec<OrderExpression>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// A query converted into the algebra of this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SparqlQuery {
    pub form: QueryForm,
    pub pattern: GraphPattern,
    pub modifiers: QueryModifiers,
    pub base_iri: Option<String>,
}

impl SparqlQuery {
    /// The output variables in order.
    pub fn output_variables(&self) -> Vec<Variable> {
        match &self.modifiers.projection {
            Some(projection) => projection.clone(),
            None => self
                .pattern
                .variables()
                .into_iter()
                .filter(|v| !crate::conversion::is_blank_node_variable(v))
                .collect(),
        }
    }
}
