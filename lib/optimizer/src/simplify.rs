use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{
    CalculusModel, CalculusSource, CaseBranch, Expression, FilterCondition, SourceCondition,
};
use relsparql_logical::rewrite::CalculusRewriter;

/// Simplifies the boolean structure of a model.
///
/// - Constants are propagated through conjunctions, disjunctions and negations.
/// - Nested conjunctions (disjunctions) are flattened and duplicate operands are removed.
/// - `a == a` becomes `NOT a IS NULL`.
/// - Union branches that never produce a tuple are removed.
/// - A model whose filters contain `FALSE` keeps only that filter.
#[derive(Debug, Default)]
pub struct BooleanSimplification {}

impl BooleanSimplification {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies [BooleanSimplification] to `model` and all nested models.
pub fn simplify_model(model: CalculusModel) -> DFResult<Transformed<CalculusModel>> {
    BooleanSimplification::new().rewrite_model(model)
}

impl CalculusRewriter for BooleanSimplification {
    fn post_rewrite_model(
        &mut self,
        mut model: CalculusModel,
    ) -> DFResult<Transformed<CalculusModel>> {
        let mut transformed = false;
        let mut never_matches = false;
        for source in &mut model.sources {
            match source {
                SourceCondition::Union(union) => {
                    let before = union.branches.len();
                    if union.branches.iter().all(|b| b.model.is_always_false()) {
                        // One branch is kept so that the union still defines its variables.
                        union.branches.truncate(1);
                        never_matches = true;
                    } else {
                        union.branches.retain(|b| !b.model.is_always_false());
                    }
                    transformed |= union.branches.len() != before;
                }
                SourceCondition::Tuple(CalculusSource::Model(nested))
                    if nested.is_always_false() =>
                {
                    never_matches = true;
                }
                _ => {}
            }
        }

        let mut filters = Vec::with_capacity(model.filters.len());
        let mut push = |filter: FilterCondition, transformed: &mut bool| {
            if filters.contains(&filter) {
                *transformed = true;
            } else {
                filters.push(filter);
            }
        };
        for filter in std::mem::take(&mut model.filters) {
            match filter {
                FilterCondition::AlwaysTrue => transformed = true,
                FilterCondition::Conjunction(conditions) => {
                    transformed = true;
                    for condition in conditions {
                        push(condition, &mut transformed);
                    }
                }
                filter => push(filter, &mut transformed),
            }
        }

        if never_matches || filters.contains(&FilterCondition::AlwaysFalse) {
            if filters.as_slice() != [FilterCondition::AlwaysFalse] {
                filters = vec![FilterCondition::AlwaysFalse];
                transformed = true;
            }
        }
        model.filters = filters;
        Ok(Transformed::new_transformed(model, transformed))
    }

    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(simplify_filter(filter))
    }

    fn post_rewrite_expression(
        &mut self,
        expression: Expression,
    ) -> DFResult<Transformed<Expression>> {
        Ok(match expression {
            Expression::Case(branches) => simplify_case(branches),
            expression => Transformed::no(expression),
        })
    }
}

/// Removes branches that never apply and the branches after one that always applies.
fn simplify_case(branches: Vec<CaseBranch>) -> Transformed<Expression> {
    let before = branches.len();
    let mut result = Vec::with_capacity(before);
    for branch in branches {
        match branch.condition.as_constant() {
            Some(false) => {}
            Some(true) => {
                result.push(branch);
                break;
            }
            None => result.push(branch),
        }
    }

    let collapses = matches!(
        result.as_slice(),
        [] | [CaseBranch {
            condition: FilterCondition::AlwaysTrue,
            ..
        }]
    );
    if result.len() == before && !collapses {
        return Transformed::no(Expression::Case(result));
    }
    Transformed::yes(Expression::case(result))
}

fn simplify_filter(filter: FilterCondition) -> Transformed<FilterCondition> {
    match filter {
        FilterCondition::Conjunction(conditions) => simplify_junction(conditions, true),
        FilterCondition::Disjunction(conditions) => simplify_junction(conditions, false),
        FilterCondition::Negation(inner) => match *inner {
            FilterCondition::AlwaysTrue => Transformed::yes(FilterCondition::AlwaysFalse),
            FilterCondition::AlwaysFalse => Transformed::yes(FilterCondition::AlwaysTrue),
            FilterCondition::Negation(inner) => Transformed::yes(*inner),
            inner => Transformed::no(inner.negate()),
        },
        FilterCondition::EqualVariables(left, right) if left == right => {
            Transformed::yes(FilterCondition::is_not_null(&left))
        }
        filter => Transformed::no(filter),
    }
}

/// Simplifies a conjunction (`is_conjunction`) or disjunction. The operands are already
/// simplified.
fn simplify_junction(
    conditions: Vec<FilterCondition>,
    is_conjunction: bool,
) -> Transformed<FilterCondition> {
    let neutral = is_conjunction;
    let mut transformed = false;
    let mut result: Vec<FilterCondition> = Vec::with_capacity(conditions.len());

    let mut operands = Vec::with_capacity(conditions.len());
    for condition in conditions {
        match condition {
            FilterCondition::Conjunction(inner) if is_conjunction => {
                transformed = true;
                operands.extend(inner);
            }
            FilterCondition::Disjunction(inner) if !is_conjunction => {
                transformed = true;
                operands.extend(inner);
            }
            condition => operands.push(condition),
        }
    }

    for operand in operands {
        match operand.as_constant() {
            Some(value) if value == neutral => transformed = true,
            Some(_) => return Transformed::yes(operand),
            None => {
                if result.contains(&operand) {
                    transformed = true;
                } else {
                    result.push(operand);
                }
            }
        }
    }

    transformed |= result.len() < 2;
    let condition = if is_conjunction {
        FilterCondition::conjunction(result)
    } else {
        FilterCondition::disjunction(result)
    };
    Transformed::new_transformed(condition, transformed)
}
