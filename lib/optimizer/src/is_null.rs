use crate::{CalculusOptimizerRule, OptimizerContext};
use datafusion::common::tree_node::Transformed;
use relsparql_common::tree_node::map_until_stop;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{
    AssignmentCondition, CalculusModel, CalculusSource, CalculusVariable, Expression,
    FilterCondition, OrderingKey, SourceCondition, SourceId, VariableId,
};
use relsparql_logical::rewrite::CalculusRewriter;
use std::collections::{HashMap, HashSet};

/// Knowledge about variables that are `NULL` (or not) in every tuple of a model.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NullFacts {
    non_null: HashSet<VariableId>,
    null: HashSet<VariableId>,
}

impl NullFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_non_null(&mut self, variable: &CalculusVariable) {
        self.non_null.insert(variable.id());
    }

    pub fn insert_null(&mut self, variable: &CalculusVariable) {
        self.null.insert(variable.id());
    }

    /// Whether `variable IS NULL` is known to hold ([Some(true)]) or not ([Some(false)]).
    pub fn is_null(&self, variable: &CalculusVariable) -> Option<bool> {
        if self.non_null.contains(&variable.id()) {
            Some(false)
        } else if self.null.contains(&variable.id()) {
            Some(true)
        } else {
            None
        }
    }

    /// Adds the facts of `other`. Both hold.
    pub fn merge(&mut self, other: &NullFacts) {
        self.non_null.extend(other.non_null.iter().copied());
        self.null.extend(other.null.iter().copied());
    }

    /// The facts that hold if either `self` or `other` holds.
    #[must_use]
    pub fn intersect(&self, other: &NullFacts) -> NullFacts {
        NullFacts {
            non_null: self.non_null.intersection(&other.non_null).copied().collect(),
            null: self.null.intersection(&other.null).copied().collect(),
        }
    }
}

/// Derives [NullFacts] from the schema, the sources and the filters of models.
///
/// The facts of every model are computed once per calculator.
#[derive(Debug, Default)]
pub struct IsNullCalculator {
    model_facts: HashMap<SourceId, NullFacts>,
}

impl IsNullCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The facts that hold for every tuple that the sources of `model` provide, before the
    /// filters of `model` are applied.
    pub fn source_facts(&mut self, model: &CalculusModel) -> NullFacts {
        let mut facts = NullFacts::new();
        for source in &model.sources {
            match source {
                SourceCondition::Tuple(CalculusSource::Table(table)) => {
                    for column in table.columns().iter().filter(|c| !c.is_nullable()) {
                        facts.insert_non_null(column);
                    }
                }
                SourceCondition::Tuple(CalculusSource::Model(nested)) => {
                    let nested_facts = self.model_facts(nested);
                    for variable in &nested.variables {
                        match nested_facts.is_null(variable) {
                            Some(true) => facts.insert_null(variable),
                            Some(false) => facts.insert_non_null(variable),
                            None => {}
                        }
                    }
                }
                SourceCondition::Union(union) => {
                    facts.insert_non_null(&union.case_variable);
                    let branch_facts = union
                        .branches
                        .iter()
                        .map(|branch| self.model_facts(&branch.model))
                        .collect::<Vec<_>>();
                    for (slot, variable) in union.variables.iter().enumerate() {
                        let states = union
                            .branches
                            .iter()
                            .zip(&branch_facts)
                            .map(|(branch, facts)| match branch.bindings.get(slot) {
                                Some(Some(bound)) => facts.is_null(bound),
                                _ => Some(true),
                            })
                            .collect::<Vec<_>>();
                        if states.iter().all(|s| *s == Some(false)) {
                            facts.insert_non_null(variable);
                        } else if states.iter().all(|s| *s == Some(true)) {
                            facts.insert_null(variable);
                        }
                    }
                }
                // Every variable of the right-hand side may be NULL.
                SourceCondition::LeftJoin(_) => {}
            }
        }
        facts
    }

    /// The facts that hold for every tuple of `model`.
    pub fn model_facts(&mut self, model: &CalculusModel) -> NullFacts {
        if let Some(facts) = self.model_facts.get(&model.id) {
            return facts.clone();
        }

        let mut facts = self.source_facts(model);
        for filter in &model.filters {
            facts.merge(&Self::condition_facts(filter, true));
        }
        self.model_facts.insert(model.id, facts.clone());
        facts
    }

    /// The facts that hold if `condition` evaluates to `holds`. An unknown result (SQL `NULL`)
    /// is neither true nor false.
    pub fn condition_facts(condition: &FilterCondition, holds: bool) -> NullFacts {
        let mut facts = NullFacts::new();
        match condition {
            FilterCondition::IsNull(variable) => {
                if holds {
                    facts.insert_null(variable);
                } else {
                    facts.insert_non_null(variable);
                }
            }
            FilterCondition::Negation(inner) => return Self::condition_facts(inner, !holds),
            FilterCondition::Conjunction(conditions) | FilterCondition::Disjunction(conditions) => {
                let is_conjunction = matches!(condition, FilterCondition::Conjunction(_));
                let mut operands = conditions.iter().map(|c| Self::condition_facts(c, holds));
                if is_conjunction == holds {
                    for operand in operands {
                        facts.merge(&operand);
                    }
                } else if let Some(first) = operands.next() {
                    facts = operands.fold(first, |result, operand| result.intersect(&operand));
                }
            }
            // Comparisons are only true or false if their operands are not NULL.
            FilterCondition::EqualVariables(left, right) => {
                facts.insert_non_null(left);
                facts.insert_non_null(right);
            }
            FilterCondition::EqualExpressions(left, right)
            | FilterCondition::Comparison(_, left, right) => {
                insert_null_rejecting(left, &mut facts);
                insert_null_rejecting(right, &mut facts);
            }
            FilterCondition::Like(expression, _) | FilterCondition::LangMatches(expression, _) => {
                insert_null_rejecting(expression, &mut facts);
            }
            FilterCondition::AlwaysTrue | FilterCondition::AlwaysFalse => {}
        }
        facts
    }
}

/// Marks the variables that make `expression` `NULL` whenever they are `NULL`.
fn insert_null_rejecting(expression: &Expression, facts: &mut NullFacts) {
    match expression {
        Expression::Column(variable) => facts.insert_non_null(variable),
        Expression::Cast(inner, _) | Expression::IriSafe(inner) => {
            insert_null_rejecting(inner, facts);
        }
        Expression::Binary(_, left, right) => {
            insert_null_rejecting(left, facts);
            insert_null_rejecting(right, facts);
        }
        _ => {}
    }
}

/// Replaces `IS NULL` checks whose result is implied by the sources of their model.
///
/// Conditions of a left join additionally use the facts of the joined model.
#[derive(Debug, Default)]
pub struct IsNullRule {}

impl IsNullRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalculusOptimizerRule for IsNullRule {
    fn name(&self) -> &str {
        "is-null"
    }

    fn rewrite(
        &self,
        model: CalculusModel,
        _context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>> {
        IsNullRewriter {
            calculator: IsNullCalculator::new(),
        }
        .rewrite_model(model)
    }
}

struct IsNullRewriter {
    calculator: IsNullCalculator,
}

impl CalculusRewriter for IsNullRewriter {
    fn post_rewrite_model(
        &mut self,
        mut model: CalculusModel,
    ) -> DFResult<Transformed<CalculusModel>> {
        let facts = self.calculator.source_facts(&model);
        let mut applier = NullFactsApplier { facts: &facts };

        let filters = map_until_stop(std::mem::take(&mut model.filters), |filter| {
            applier.rewrite_filter(filter)
        })?;
        let assignments = map_until_stop(std::mem::take(&mut model.assignments), |assignment| {
            let AssignmentCondition {
                variable,
                expression,
            } = assignment;
            Ok(applier
                .rewrite_expression(expression)?
                .update_data(|expression| AssignmentCondition::new(variable, expression)))
        })?;
        let ordering = map_until_stop(std::mem::take(&mut model.modifiers.ordering), |key| {
            let OrderingKey {
                expression,
                ascending,
            } = key;
            Ok(applier
                .rewrite_expression(expression)?
                .update_data(|expression| OrderingKey {
                    expression,
                    ascending,
                }))
        })?;
        let mut transformed =
            filters.transformed || assignments.transformed || ordering.transformed;
        model.filters = filters.data;
        model.assignments = assignments.data;
        model.modifiers.ordering = ordering.data;

        for source in &mut model.sources {
            if let SourceCondition::LeftJoin(left_join) = source {
                let mut scoped = facts.clone();
                scoped.merge(&self.calculator.model_facts(&left_join.model));
                let condition =
                    std::mem::replace(&mut left_join.condition, FilterCondition::AlwaysTrue);
                let result = NullFactsApplier { facts: &scoped }.rewrite_filter(condition)?;
                transformed |= result.transformed;
                left_join.condition = result.data;
            }
        }

        Ok(Transformed::new_transformed(model, transformed))
    }
}

/// Replaces `IS NULL` atoms with constants.
struct NullFactsApplier<'facts> {
    facts: &'facts NullFacts,
}

impl CalculusRewriter for NullFactsApplier<'_> {
    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(match filter {
            FilterCondition::IsNull(variable) => match self.facts.is_null(&variable) {
                Some(true) => Transformed::yes(FilterCondition::AlwaysTrue),
                Some(false) => Transformed::yes(FilterCondition::AlwaysFalse),
                None => Transformed::no(FilterCondition::IsNull(variable)),
            },
            filter => Transformed::no(filter),
        })
    }
}
