use crate::{CalculusOptimizerRule, OptimizerContext};
use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{CalculusModel, Expression, FilterCondition};
use relsparql_logical::rewrite::CalculusRewriter;

/// Folds equalities of two constants.
///
/// The comparison includes the kind of the constants: `'2' = 2` is `FALSE`.
#[derive(Debug, Default)]
pub struct ConstantExpressionEqualityRule {}

impl ConstantExpressionEqualityRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalculusOptimizerRule for ConstantExpressionEqualityRule {
    fn name(&self) -> &str {
        "constant-expression-equality"
    }

    fn rewrite(
        &self,
        model: CalculusModel,
        _context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>> {
        ConstantEqualityRewriter {}.rewrite_model(model)
    }
}

struct ConstantEqualityRewriter {}

impl CalculusRewriter for ConstantEqualityRewriter {
    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(match filter {
            FilterCondition::EqualExpressions(
                Expression::Constant(left),
                Expression::Constant(right),
            ) => Transformed::yes(if left == right {
                FilterCondition::AlwaysTrue
            } else {
                FilterCondition::AlwaysFalse
            }),
            filter => Transformed::no(filter),
        })
    }
}
