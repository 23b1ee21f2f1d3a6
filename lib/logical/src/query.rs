use crate::binders::ValueBinder;
use crate::calculus::CalculusModel;
use crate::rewrite::{CalculusRewriter, VariableSubstitution};
use datafusion::common::tree_node::Transformed;
use relsparql_algebra::QueryForm;
use relsparql_common::DFResult;
use relsparql_model::Variable;
use std::fmt::{Display, Formatter};

/// A query in relational form: the root model and the binders of the output variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalQuery {
    pub form: QueryForm,
    pub model: CalculusModel,
    /// The output variables in projection order.
    pub bindings: Vec<(Variable, ValueBinder)>,
}

impl RelationalQuery {
    /// Whether the query can be answered without a database.
    pub fn is_empty(&self) -> bool {
        self.model.is_always_false()
    }

    pub fn output_variables(&self) -> impl Iterator<Item = &Variable> {
        self.bindings.iter().map(|(variable, _)| variable)
    }

    /// Applies `substitution` to the model and the binders.
    pub fn substitute(
        self,
        substitution: &mut VariableSubstitution,
    ) -> DFResult<Transformed<RelationalQuery>> {
        if substitution.is_empty() {
            return Ok(Transformed::no(self));
        }

        let model = substitution.rewrite_model(self.model)?;
        let mut transformed = model.transformed;
        let mut bindings = Vec::with_capacity(self.bindings.len());
        for (variable, binder) in self.bindings {
            let binder = binder.map_variables(|v| substitution.get(v).cloned())?;
            transformed |= binder.transformed;
            bindings.push((variable, binder.data));
        }
        Ok(Transformed::new_transformed(
            RelationalQuery {
                form: self.form,
                model: model.data,
                bindings,
            },
            transformed,
        ))
    }
}

impl Display for RelationalQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.model)?;
        for (variable, binder) in &self.bindings {
            writeln!(f, "Bind {variable} <- {binder}")?;
        }
        Ok(())
    }
}
