//! Optimizers for the relational calculus model.
//!
//! Every optimizer is a [CalculusOptimizerRule]. The [CalculusOptimizer] applies a list of rules
//! until none of them changes the model anymore and simplifies the boolean structure of the model
//! after every rule that made a change.

mod case_expression;
mod concatenation;
mod constant_equality;
mod is_null;
mod self_join;
mod simplify;

pub use case_expression::CaseExpressionToConditionRule;
pub use concatenation::ConcatenationInEqualConditionRule;
pub use constant_equality::ConstantExpressionEqualityRule;
pub use is_null::{IsNullCalculator, IsNullRule, NullFacts};
pub use self_join::SelfJoinRule;
pub use simplify::{simplify_model, BooleanSimplification};

use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{CalculusModel, CalculusVariable};
use relsparql_logical::rewrite::VariableSubstitution;
use relsparql_logical::RelationalQuery;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, trace};

/// Defines how many optimizations the query optimizer should apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizationLevel {
    /// Only the boolean simplification.
    None,
    /// Constant folding, concatenation splitting and case lifting.
    Default,
    /// Runs all optimizations, including self-join elimination and null tracking.
    #[default]
    Full,
}

/// The state shared by the rules of one optimizer run.
#[derive(Debug, Default)]
pub struct OptimizerContext {
    substitution: VariableSubstitution,
}

impl OptimizerContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `from` has been replaced by `to` in the model. The replacement is applied to
    /// the value binders once the optimization has finished.
    pub fn replace_variable(&mut self, from: &CalculusVariable, to: CalculusVariable) {
        self.substitution.insert(from, to);
    }

    /// Records all replacements of `substitution`.
    pub fn replace_variables(&mut self, substitution: &VariableSubstitution) {
        self.substitution.extend(substitution);
    }

    pub fn substitution(&self) -> &VariableSubstitution {
        &self.substitution
    }
}

/// A semantics-preserving rewrite of a [CalculusModel].
pub trait CalculusOptimizerRule: Debug + Send + Sync {
    /// A unique name of the rule, used for logging.
    fn name(&self) -> &str;

    /// Rewrites `model`. Returns [Transformed::no] if nothing changed.
    fn rewrite(
        &self,
        model: CalculusModel,
        context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>>;
}

/// A shared [CalculusOptimizerRule].
pub type CalculusOptimizerRuleRef = Arc<dyn CalculusOptimizerRule>;

/// Creates a list of optimizer rules based on the given `optimization_level`.
///
/// [SelfJoinRule] runs before [IsNullRule] as merged table occurrences expose more non-null
/// columns.
pub fn create_optimizer_rules(
    optimization_level: OptimizationLevel,
) -> Vec<CalculusOptimizerRuleRef> {
    let default_rules: Vec<CalculusOptimizerRuleRef> = vec![
        Arc::new(ConstantExpressionEqualityRule::new()),
        Arc::new(ConcatenationInEqualConditionRule::new()),
        Arc::new(CaseExpressionToConditionRule::new()),
    ];

    match optimization_level {
        OptimizationLevel::None => Vec::new(),
        OptimizationLevel::Default => default_rules,
        OptimizationLevel::Full => {
            let mut rules = default_rules;
            rules.push(Arc::new(SelfJoinRule::new()));
            rules.push(Arc::new(IsNullRule::new()));
            rules
        }
    }
}

/// Applies a list of [CalculusOptimizerRule]s until a fixpoint is reached.
#[derive(Debug, Clone)]
pub struct CalculusOptimizer {
    rules: Vec<CalculusOptimizerRuleRef>,
    max_iterations: usize,
}

impl CalculusOptimizer {
    const DEFAULT_MAX_ITERATIONS: usize = 8;

    pub fn new(rules: Vec<CalculusOptimizerRuleRef>) -> Self {
        Self {
            rules,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }

    /// An optimizer with the rules of `optimization_level`.
    pub fn with_level(optimization_level: OptimizationLevel) -> Self {
        Self::new(create_optimizer_rules(optimization_level))
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Optimizes the model of `query` and applies the recorded variable replacements to its
    /// value binders.
    pub fn optimize(&self, query: RelationalQuery) -> DFResult<Transformed<RelationalQuery>> {
        let mut context = OptimizerContext::new();
        let RelationalQuery {
            form,
            model,
            bindings,
        } = query;

        let simplified = simplify_model(model)?;
        let mut any_change = simplified.transformed;
        let mut model = simplified.data;
        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for rule in &self.rules {
                let result = rule.rewrite(model, &mut context)?;
                model = result.data;
                if result.transformed {
                    debug!("Optimizer rule {} changed the model", rule.name());
                    changed = true;
                    model = simplify_model(model)?.data;
                }
            }

            if !changed {
                trace!("Optimizers converged after {iteration} iterations");
                break;
            }
            any_change = true;
        }

        let query = RelationalQuery {
            form,
            model,
            bindings,
        };
        let mut substitution = VariableSubstitution::new();
        substitution.extend(context.substitution());
        let result = query.substitute(&mut substitution)?;
        any_change |= result.transformed;
        Ok(Transformed::new_transformed(result.data, any_change))
    }
}
