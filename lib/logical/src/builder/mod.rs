//! Translation of the safe SPARQL algebra into a [CalculusModel].
//!
//! Every graph pattern is compiled into a [PatternResult]: a model whose tuples are the
//! solutions of the pattern and a [ValueBinder] per SPARQL variable that reads the bound term
//! from a tuple.

mod context;
mod expressions;
mod triples;

use crate::binders::{ExpressionSetValueBinder, SwitchValueBinder, ValueBinder};
use crate::calculus::{
    AssignmentCondition, CalculusModel, CalculusVariable, CaseBranch, Expression,
    FilterCondition, LeftJoinSource, ModelModifiers, OrderingKey, SourceCondition, UnionBranch,
    UnionedSources,
};
use crate::expression_sets::{all_of, any_of, negation};
use crate::query::RelationalQuery;
use datafusion::common::{internal_err, plan_err};
pub use context::QueryContext;
pub use expressions::ExpressionBuilder;
use relsparql_algebra::{Expression as SparqlExpression, GraphPattern, QueryForm, SparqlQuery};
use relsparql_common::{DFResult, SchemaProvider, SqlColumnTypeRef, SqlDialectRef};
use relsparql_mapping::R2RmlMapping;
use relsparql_model::Variable;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// The compiled form of a graph pattern.
#[derive(Debug, Clone)]
pub struct PatternResult {
    pub model: CalculusModel,
    pub binders: BTreeMap<Variable, ValueBinder>,
}

impl PatternResult {
    fn push_filter(&mut self, condition: FilterCondition) {
        if condition.as_constant() != Some(true) {
            self.model.filters.push(condition);
        }
    }
}

/// Builds the relational form of a query.
///
/// The pattern must be in safe form: triple patterns are restricted to single mapping rules and
/// no filter references a variable that is out of scope.
#[derive(Debug)]
pub struct RelationalBuilder {
    context: QueryContext,
}

impl RelationalBuilder {
    pub fn new(
        mapping: Arc<R2RmlMapping>,
        schema: Arc<dyn SchemaProvider>,
        dialect: SqlDialectRef,
    ) -> Self {
        Self {
            context: QueryContext::new(mapping, schema, dialect),
        }
    }

    /// Builds the relational query.
    pub fn build(mut self, query: &SparqlQuery) -> DFResult<RelationalQuery> {
        let PatternResult { mut model, binders } = self.build_pattern(&query.pattern)?;

        let bindings = match query.form {
            QueryForm::Select => query
                .output_variables()
                .into_iter()
                .map(|variable| {
                    let binder = binders.get(&variable).cloned().unwrap_or(ValueBinder::Empty);
                    (variable, binder)
                })
                .collect::<Vec<_>>(),
            QueryForm::Ask => Vec::new(),
        };

        model.modifiers = match query.form {
            QueryForm::Select => {
                let modifiers = &query.modifiers;
                let builder = ExpressionBuilder::new(&binders, self.context.dialect());
                let mut ordering = Vec::new();
                for order in &modifiers.order_by {
                    let value = builder.build_value(order.expression())?;
                    let category = Expression::case(vec![CaseBranch::new(
                        value.is_not_error.clone(),
                        value.type_category.clone(),
                    )]);
                    for expression in [category, value.numeric_value, value.string_value] {
                        if expression.as_constant().is_none()
                            && !matches!(expression, Expression::Null)
                        {
                            ordering.push(OrderingKey {
                                expression,
                                ascending: order.is_ascending(),
                            });
                        }
                    }
                }
                ModelModifiers {
                    distinct: modifiers.distinct,
                    offset: modifiers.offset,
                    limit: modifiers.limit,
                    ordering,
                }
            }
            QueryForm::Ask => ModelModifiers {
                limit: Some(1),
                ..ModelModifiers::default()
            },
        };

        let mut variables = Vec::new();
        for (_, binder) in &bindings {
            for variable in binder.needed_variables() {
                if !variables.contains(&variable) {
                    variables.push(variable);
                }
            }
        }
        model.variables = variables;

        debug!("Built relational model with {} outputs", bindings.len());
        Ok(RelationalQuery {
            form: query.form,
            model,
            bindings,
        })
    }

    fn build_pattern(&mut self, pattern: &GraphPattern) -> DFResult<PatternResult> {
        match pattern {
            GraphPattern::RestrictedTriple(triple) => self.build_restricted_triple(triple),
            GraphPattern::Join { left, right } => self.build_join(left, right),
            GraphPattern::Union(branches) => self.build_union(branches),
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => self.build_left_join(left, right, expression.as_ref()),
            GraphPattern::Filter { inner, expression } => self.build_filter(inner, expression),
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => self.build_extend(inner, variable, expression),
            GraphPattern::Empty => Ok(self.empty()),
            GraphPattern::NotMatching => {
                let mut result = self.empty();
                result.model.filters.push(FilterCondition::AlwaysFalse);
                Ok(result)
            }
            GraphPattern::Triple(triple) => {
                internal_err!("Triple pattern {triple} is not restricted to a mapping rule.")
            }
        }
    }

    fn empty(&mut self) -> PatternResult {
        PatternResult {
            model: CalculusModel::new(self.context.next_source_id()),
            binders: BTreeMap::new(),
        }
    }

    /// An inner join. Both models are merged into one.
    fn build_join(&mut self, left: &GraphPattern, right: &GraphPattern) -> DFResult<PatternResult> {
        let left_bound = left.always_bound_variables();
        let right_bound = right.always_bound_variables();
        let mut result = self.build_pattern(left)?;
        let right_result = self.build_pattern(right)?;
        result.model.merge(right_result.model);

        for (variable, right_binder) in right_result.binders {
            let Some(left_binder) = result.binders.remove(&variable) else {
                result.binders.insert(variable, right_binder);
                continue;
            };
            if left_bound.contains(&variable) && right_bound.contains(&variable) {
                let condition = self.term_equality(&left_binder, &right_binder)?;
                result.push_filter(condition);
                result.binders.insert(variable, left_binder);
            } else {
                let condition = self.compatibility(&left_binder, &right_binder)?;
                result.push_filter(condition);
                result
                    .binders
                    .insert(variable, ValueBinder::Coalesce(vec![left_binder, right_binder]));
            }
        }
        Ok(result)
    }

    /// A union. Each branch becomes a nested model and the union provides one variable per
    /// variable needed by the binders of the branches.
    fn build_union(&mut self, branches: &[GraphPattern]) -> DFResult<PatternResult> {
        let mut results = Vec::with_capacity(branches.len());
        for branch in branches {
            let result = self.build_pattern(branch)?;
            if !result.model.is_always_false() {
                results.push(result);
            }
        }
        match results.len() {
            0 => return self.build_pattern(&GraphPattern::NotMatching),
            1 => return Ok(results.remove(0)),
            _ => {}
        }

        let integer_type = self.context.dialect().integer_type();
        let case_variable = self.context.computed_variable(integer_type);
        let sparql_variables = results
            .iter()
            .flat_map(|result| result.binders.keys().cloned())
            .collect::<BTreeSet<_>>();

        let mut union_variables = Vec::new();
        let mut bindings = vec![Vec::new(); results.len()];
        let mut binders = BTreeMap::new();
        for sparql_variable in sparql_variables {
            let needed = results
                .iter()
                .map(|result| {
                    result
                        .binders
                        .get(&sparql_variable)
                        .map(ValueBinder::needed_variables)
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>();
            let slots = needed.iter().map(Vec::len).max().unwrap_or_default();

            let mut replacements = vec![HashMap::new(); results.len()];
            for slot in 0..slots {
                let union_variable = self.union_variable(&needed, slot)?;
                for (i, branch_variables) in needed.iter().enumerate() {
                    let binding = branch_variables.get(slot).cloned();
                    if let Some(variable) = &binding {
                        replacements[i].insert(variable.id(), union_variable.clone());
                    }
                    bindings[i].push(binding);
                }
                union_variables.push(union_variable);
            }

            let mut cases = Vec::new();
            for (i, result) in results.iter().enumerate() {
                if let Some(binder) = result.binders.get(&sparql_variable) {
                    let replacements = &replacements[i];
                    let binder = binder
                        .clone()
                        .map_variables(|variable| replacements.get(&variable.id()).cloned())?
                        .data;
                    cases.push((branch_case(i), binder));
                }
            }
            binders.insert(
                sparql_variable,
                ValueBinder::Switch(SwitchValueBinder {
                    case_variable: case_variable.clone(),
                    cases,
                }),
            );
        }

        let branches = results
            .into_iter()
            .zip(bindings)
            .enumerate()
            .map(|(i, (result, bindings))| {
                let mut model = result.model;
                model.variables = Vec::new();
                for variable in bindings.iter().flatten() {
                    if !model.variables.contains(variable) {
                        model.variables.push(variable.clone());
                    }
                }
                UnionBranch {
                    case: branch_case(i),
                    model,
                    bindings,
                }
            })
            .collect();

        let mut model = CalculusModel::new(self.context.next_source_id());
        model.sources.push(SourceCondition::Union(UnionedSources {
            id: self.context.next_source_id(),
            case_variable,
            variables: union_variables,
            branches,
        }));
        Ok(PatternResult { model, binders })
    }

    /// The union variable of a slot. Its type can hold the values of all branches.
    fn union_variable(
        &mut self,
        needed: &[Vec<CalculusVariable>],
        slot: usize,
    ) -> DFResult<CalculusVariable> {
        let mut sql_type: Option<SqlColumnTypeRef> = None;
        for variable in needed.iter().filter_map(|variables| variables.get(slot)) {
            sql_type = Some(match sql_type {
                None => Arc::clone(variable.sql_type()),
                Some(sql_type) => sql_type.common_type(variable.sql_type().as_ref())?,
            });
        }
        let Some(sql_type) = sql_type else {
            return internal_err!("Union slot {slot} is not used by any branch.");
        };
        Ok(self.context.computed_variable(sql_type))
    }

    /// An optional pattern. The right side becomes a nested model that is left joined.
    fn build_left_join(
        &mut self,
        left: &GraphPattern,
        right: &GraphPattern,
        expression: Option<&SparqlExpression>,
    ) -> DFResult<PatternResult> {
        let left_bound = left.always_bound_variables();
        let right_bound = right.always_bound_variables();
        let mut result = self.build_pattern(left)?;
        let right_result = self.build_pattern(right)?;
        if right_result.model.is_always_false() {
            return Ok(result);
        }

        let mut conditions = Vec::new();
        let mut scope = result.binders.clone();
        for (variable, right_binder) in &right_result.binders {
            match result.binders.get(variable) {
                Some(left_binder) => {
                    conditions.push(
                        if left_bound.contains(variable) && right_bound.contains(variable) {
                            self.term_equality(left_binder, right_binder)?
                        } else {
                            self.compatibility(left_binder, right_binder)?
                        },
                    );
                    scope.insert(
                        variable.clone(),
                        ValueBinder::Coalesce(vec![left_binder.clone(), right_binder.clone()]),
                    );
                }
                None => {
                    scope.insert(variable.clone(), right_binder.clone());
                }
            }
        }
        if let Some(expression) = expression {
            let builder = ExpressionBuilder::new(&scope, self.context.dialect());
            conditions.push(builder.build_boolean(expression)?.when_true);
        }

        let mut right_model = right_result.model;
        right_model.variables = Vec::new();
        for binder in right_result.binders.values() {
            for variable in binder.needed_variables() {
                if !right_model.variables.contains(&variable) {
                    right_model.variables.push(variable);
                }
            }
        }
        result
            .model
            .sources
            .push(SourceCondition::LeftJoin(LeftJoinSource {
                model: Box::new(right_model),
                condition: all_of(conditions),
            }));
        result.binders = scope;
        Ok(result)
    }

    fn build_filter(
        &mut self,
        inner: &GraphPattern,
        expression: &SparqlExpression,
    ) -> DFResult<PatternResult> {
        let mut result = self.build_pattern(inner)?;
        let condition = ExpressionBuilder::new(&result.binders, self.context.dialect())
            .build_boolean(expression)?
            .when_true;
        result.push_filter(condition);
        Ok(result)
    }

    /// A `BIND`. Each part of the computed term is assigned to its own variable.
    fn build_extend(
        &mut self,
        inner: &GraphPattern,
        variable: &Variable,
        expression: &SparqlExpression,
    ) -> DFResult<PatternResult> {
        let mut result = self.build_pattern(inner)?;
        if result.binders.contains_key(variable) {
            return plan_err!("Variable {variable} is already bound before BIND.");
        }
        let value = ExpressionBuilder::new(&result.binders, self.context.dialect())
            .build_value(expression)?;

        let dialect = self.context.dialect();
        let (integer, decimal, string) = (
            dialect.integer_type(),
            dialect.decimal_type(),
            dialect.string_type(),
        );
        let binder = ExpressionSetValueBinder {
            type_category: self.context.computed_variable(Arc::clone(&integer)),
            type_iri: self.context.computed_variable(Arc::clone(&string)),
            string_value: self.context.computed_variable(Arc::clone(&string)),
            numeric_value: self.context.computed_variable(decimal),
            boolean_value: self.context.computed_variable(integer),
            language: self.context.computed_variable(string),
        };

        let category = Expression::case(vec![CaseBranch::new(
            value.is_not_error,
            value.type_category,
        )]);
        let assignments = [
            (&binder.type_category, category),
            (&binder.type_iri, value.type_iri),
            (&binder.string_value, value.string_value),
            (&binder.numeric_value, value.numeric_value),
            (&binder.boolean_value, value.boolean_value),
            (&binder.language, value.language),
        ];
        for (target, expression) in assignments {
            result
                .model
                .assignments
                .push(AssignmentCondition::new(target.clone(), expression));
        }
        result
            .binders
            .insert(variable.clone(), ValueBinder::ExpressionSet(binder));
        Ok(result)
    }

    /// Holds if both binders produce the same term. Both must be bound.
    fn term_equality(&self, left: &ValueBinder, right: &ValueBinder) -> DFResult<FilterCondition> {
        if let (ValueBinder::Base(left), ValueBinder::Base(right)) = (left, right) {
            if left.has_same_shape(right) {
                return Ok(all_of(left.columns().iter().zip(right.columns()).map(
                    |((_, left), (_, right))| {
                        FilterCondition::EqualVariables(left.clone(), right.clone())
                    },
                )));
            }
        }

        let dialect = self.context.dialect();
        let left = left.expressions(dialect)?;
        let right = right.expressions(dialect)?;
        Ok(all_of([
            left.is_not_error.clone(),
            right.is_not_error.clone(),
            left.same_term(&right),
        ]))
    }

    /// Holds if the binders are compatible: one of them is unbound or both produce the same
    /// term.
    fn compatibility(&self, left: &ValueBinder, right: &ValueBinder) -> DFResult<FilterCondition> {
        Ok(any_of([
            negation(left.bound_condition()),
            negation(right.bound_condition()),
            self.term_equality(left, right)?,
        ]))
    }
}

fn branch_case(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}

