//! Rewriting of calculus models.
//!
//! A [CalculusRewriter] overrides the hooks of the node families it cares about. The default
//! implementation of every `rewrite_*` method recurses into the children and then calls the
//! `post_rewrite_*` hook. Subtrees that are not changed are returned as [Transformed::no].

use crate::calculus::{
    AssignmentCondition, CalculusModel, CalculusSource, CalculusVariable, CaseBranch,
    Expression, FilterCondition, LeftJoinSource, ModelModifiers, OrderingKey, SourceCondition,
    UnionBranch, UnionedSources, VariableId,
};
use datafusion::common::tree_node::{Transformed, TreeNodeRecursion};
use relsparql_common::tree_node::{map_pair, map_until_stop};
use relsparql_common::DFResult;
use std::collections::HashMap;

/// A rewrite of a [CalculusModel] and all of its parts.
pub trait CalculusRewriter {
    /// Whether `model` and its children should be visited.
    fn should_rewrite_model(&mut self, _model: &CalculusModel) -> bool {
        true
    }

    fn rewrite_model(&mut self, model: CalculusModel) -> DFResult<Transformed<CalculusModel>> {
        walk_model(self, model)
    }

    /// Called after the children of `model` have been rewritten.
    fn post_rewrite_model(
        &mut self,
        model: CalculusModel,
    ) -> DFResult<Transformed<CalculusModel>> {
        Ok(Transformed::no(model))
    }

    fn rewrite_source(
        &mut self,
        source: SourceCondition,
    ) -> DFResult<Transformed<SourceCondition>> {
        walk_source(self, source)
    }

    fn post_rewrite_source(
        &mut self,
        source: SourceCondition,
    ) -> DFResult<Transformed<SourceCondition>> {
        Ok(Transformed::no(source))
    }

    /// Whether `filter` and its children should be visited.
    fn should_rewrite_filter(&mut self, _filter: &FilterCondition) -> bool {
        true
    }

    fn rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        walk_filter(self, filter)
    }

    fn post_rewrite_filter(
        &mut self,
        filter: FilterCondition,
    ) -> DFResult<Transformed<FilterCondition>> {
        Ok(Transformed::no(filter))
    }

    fn rewrite_expression(&mut self, expression: Expression) -> DFResult<Transformed<Expression>> {
        walk_expression(self, expression)
    }

    fn post_rewrite_expression(
        &mut self,
        expression: Expression,
    ) -> DFResult<Transformed<Expression>> {
        Ok(Transformed::no(expression))
    }

    /// Called for every reference to a variable. Definitions (table columns, union variables,
    /// assignment targets) are not visited.
    fn rewrite_variable(
        &mut self,
        variable: CalculusVariable,
    ) -> DFResult<Transformed<CalculusVariable>> {
        Ok(Transformed::no(variable))
    }
}

/// Rewrites the children of `model` and applies [CalculusRewriter::post_rewrite_model].
pub fn walk_model<R: CalculusRewriter + ?Sized>(
    rewriter: &mut R,
    model: CalculusModel,
) -> DFResult<Transformed<CalculusModel>> {
    if !rewriter.should_rewrite_model(&model) {
        return Ok(Transformed::no(model));
    }

    let CalculusModel {
        id,
        variables,
        sources,
        assignments,
        filters,
        modifiers,
    } = model;
    let ModelModifiers {
        distinct,
        offset,
        limit,
        ordering,
    } = modifiers;

    let sources = map_until_stop(sources, |s| rewriter.rewrite_source(s))?;
    let assignments = map_until_stop(assignments, |assignment| {
        let AssignmentCondition {
            variable,
            expression,
        } = assignment;
        Ok(rewriter
            .rewrite_expression(expression)?
            .update_data(|expression| AssignmentCondition::new(variable, expression)))
    })?;
    let filters = map_until_stop(filters, |f| rewriter.rewrite_filter(f))?;
    let variables = map_until_stop(variables, |v| rewriter.rewrite_variable(v))?;
    let ordering = map_until_stop(ordering, |key| {
        let OrderingKey {
            expression,
            ascending,
        } = key;
        Ok(rewriter
            .rewrite_expression(expression)?
            .update_data(|expression| OrderingKey {
                expression,
                ascending,
            }))
    })?;

    let transformed = sources.transformed
        || assignments.transformed
        || filters.transformed
        || variables.transformed
        || ordering.transformed;
    let model = CalculusModel {
        id,
        variables: variables.data,
        sources: sources.data,
        assignments: assignments.data,
        filters: filters.data,
        modifiers: ModelModifiers {
            distinct,
            offset,
            limit,
            ordering: ordering.data,
        },
    };
    Transformed::new_transformed(model, transformed)
        .transform_parent(|m| rewriter.post_rewrite_model(m))
}

/// Rewrites the children of `source` and applies [CalculusRewriter::post_rewrite_source].
pub fn walk_source<R: CalculusRewriter + ?Sized>(
    rewriter: &mut R,
    source: SourceCondition,
) -> DFResult<Transformed<SourceCondition>> {
    let children = match source {
        SourceCondition::Tuple(CalculusSource::Model(model)) => rewriter
            .rewrite_model(*model)?
            .update_data(|m| SourceCondition::Tuple(CalculusSource::Model(Box::new(m)))),
        SourceCondition::Tuple(CalculusSource::Table(table)) => {
            Transformed::no(SourceCondition::Tuple(CalculusSource::Table(table)))
        }
        SourceCondition::Union(union) => {
            let UnionedSources {
                id,
                case_variable,
                variables,
                branches,
            } = union;
            map_until_stop(branches, |branch| walk_union_branch(rewriter, branch))?.update_data(
                |branches| {
                    SourceCondition::Union(UnionedSources {
                        id,
                        case_variable,
                        variables,
                        branches,
                    })
                },
            )
        }
        SourceCondition::LeftJoin(left_join) => {
            let model = rewriter.rewrite_model(*left_join.model)?;
            let condition = rewriter.rewrite_filter(left_join.condition)?;
            Transformed::new_transformed(
                SourceCondition::LeftJoin(LeftJoinSource {
                    model: Box::new(model.data),
                    condition: condition.data,
                }),
                model.transformed || condition.transformed,
            )
        }
    };
    children.transform_parent(|s| rewriter.post_rewrite_source(s))
}

fn walk_union_branch<R: CalculusRewriter + ?Sized>(
    rewriter: &mut R,
    branch: UnionBranch,
) -> DFResult<Transformed<UnionBranch>> {
    let UnionBranch {
        case,
        model,
        bindings,
    } = branch;
    let model = rewriter.rewrite_model(model)?;
    let mut transformed = model.transformed;
    let mut new_bindings = Vec::with_capacity(bindings.len());
    for binding in bindings {
        match binding {
            Some(variable) => {
                let result = rewriter.rewrite_variable(variable)?;
                transformed |= result.transformed;
                new_bindings.push(Some(result.data));
            }
            None => new_bindings.push(None),
        }
    }
    Ok(Transformed::new_transformed(
        UnionBranch {
            case,
            model: model.data,
            bindings: new_bindings,
        },
        transformed,
    ))
}

/// Rewrites the children of `filter` and applies [CalculusRewriter::post_rewrite_filter].
pub fn walk_filter<R: CalculusRewriter + ?Sized>(
    rewriter: &mut R,
    filter: FilterCondition,
) -> DFResult<Transformed<FilterCondition>> {
    if !rewriter.should_rewrite_filter(&filter) {
        return Ok(Transformed::no(filter));
    }

    let children = match filter {
        FilterCondition::Conjunction(conditions) => {
            map_until_stop(conditions, |c| rewriter.rewrite_filter(c))?
                .update_data(FilterCondition::Conjunction)
        }
        FilterCondition::Disjunction(conditions) => {
            map_until_stop(conditions, |c| rewriter.rewrite_filter(c))?
                .update_data(FilterCondition::Disjunction)
        }
        FilterCondition::Negation(inner) => rewriter
            .rewrite_filter(*inner)?
            .update_data(|inner| FilterCondition::Negation(Box::new(inner))),
        FilterCondition::Comparison(operator, left, right) => {
            map_pair(left, right, |e| rewriter.rewrite_expression(e))?
                .update_data(|(left, right)| FilterCondition::Comparison(operator, left, right))
        }
        FilterCondition::EqualExpressions(left, right) => {
            map_pair(left, right, |e| rewriter.rewrite_expression(e))?
                .update_data(|(left, right)| FilterCondition::EqualExpressions(left, right))
        }
        FilterCondition::EqualVariables(left, right) => {
            map_pair(left, right, |v| rewriter.rewrite_variable(v))?
                .update_data(|(left, right)| FilterCondition::EqualVariables(left, right))
        }
        FilterCondition::IsNull(variable) => rewriter
            .rewrite_variable(variable)?
            .update_data(FilterCondition::IsNull),
        FilterCondition::Like(expression, pattern) => rewriter
            .rewrite_expression(expression)?
            .update_data(|e| FilterCondition::Like(e, pattern)),
        FilterCondition::LangMatches(expression, range) => rewriter
            .rewrite_expression(expression)?
            .update_data(|e| FilterCondition::LangMatches(e, range)),
        leaf @ (FilterCondition::AlwaysTrue | FilterCondition::AlwaysFalse) => {
            Transformed::no(leaf)
        }
    };
    children.transform_parent(|f| rewriter.post_rewrite_filter(f))
}

/// Rewrites the children of `expression` and applies [CalculusRewriter::post_rewrite_expression].
pub fn walk_expression<R: CalculusRewriter + ?Sized>(
    rewriter: &mut R,
    expression: Expression,
) -> DFResult<Transformed<Expression>> {
    let children = match expression {
        Expression::Column(variable) => rewriter
            .rewrite_variable(variable)?
            .update_data(Expression::Column),
        Expression::Concatenation(parts) => {
            map_until_stop(parts, |e| rewriter.rewrite_expression(e))?
                .update_data(Expression::Concatenation)
        }
        Expression::Coalesce(parts) => map_until_stop(parts, |e| rewriter.rewrite_expression(e))?
            .update_data(Expression::Coalesce),
        Expression::Binary(operator, left, right) => {
            map_pair(*left, *right, |e| rewriter.rewrite_expression(e))?
                .update_data(|(left, right)| Expression::binary(operator, left, right))
        }
        Expression::Case(branches) => map_until_stop(branches, |branch| {
            let condition = rewriter.rewrite_filter(branch.condition)?;
            let value = rewriter.rewrite_expression(branch.value)?;
            Ok(Transformed::new(
                CaseBranch::new(condition.data, value.data),
                condition.transformed || value.transformed,
                TreeNodeRecursion::Continue,
            ))
        })?
        .update_data(Expression::Case),
        Expression::Cast(inner, sql_type) => rewriter
            .rewrite_expression(*inner)?
            .update_data(|inner| Expression::cast(inner, sql_type)),
        Expression::IriSafe(inner) => rewriter
            .rewrite_expression(*inner)?
            .update_data(Expression::iri_safe),
        leaf @ (Expression::Constant(_) | Expression::Null) => Transformed::no(leaf),
    };
    children.transform_parent(|e| rewriter.post_rewrite_expression(e))
}

/// Replaces variables by other variables everywhere in a model.
#[derive(Debug, Default)]
pub struct VariableSubstitution {
    replacements: HashMap<VariableId, CalculusVariable>,
}

impl VariableSubstitution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `from` by `to`. Existing replacements that yield `from` are redirected to `to`.
    pub fn insert(&mut self, from: &CalculusVariable, to: CalculusVariable) {
        for target in self.replacements.values_mut() {
            if *target == *from {
                *target = to.clone();
            }
        }
        self.replacements.insert(from.id(), to);
    }

    pub fn get(&self, variable: &CalculusVariable) -> Option<&CalculusVariable> {
        self.replacements.get(&variable.id())
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Adds all replacements of `other`.
    pub fn extend(&mut self, other: &VariableSubstitution) {
        for (from, to) in &other.replacements {
            for target in self.replacements.values_mut() {
                if target.id() == *from {
                    *target = to.clone();
                }
            }
            self.replacements.insert(*from, to.clone());
        }
    }
}

impl CalculusRewriter for VariableSubstitution {
    fn post_rewrite_model(
        &mut self,
        mut model: CalculusModel,
    ) -> DFResult<Transformed<CalculusModel>> {
        let before = model.variables.len();
        let mut seen = Vec::with_capacity(before);
        model.variables.retain(|v| {
            if seen.contains(v) {
                false
            } else {
                seen.push(v.clone());
                true
            }
        });
        let transformed = model.variables.len() != before;
        Ok(Transformed::new_transformed(model, transformed))
    }

    fn rewrite_variable(
        &mut self,
        variable: CalculusVariable,
    ) -> DFResult<Transformed<CalculusVariable>> {
        Ok(match self.get(&variable) {
            Some(replacement) => Transformed::yes(replacement.clone()),
            None => Transformed::no(variable),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculus::{CalculusIdGenerator, SqlTable, TableSource};
    use relsparql_common::{MsSqlDialect, SqlDialect};

    #[test]
    fn test_substitution_reaches_all_references() {
        let mut generator = CalculusIdGenerator::new();
        let a = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let b = generator.column_variable("id", MsSqlDialect.integer_type(), false);

        let mut table = SqlTable::new(
            generator.next_source_id(),
            TableSource::Table("person".to_owned()),
            Vec::new(),
        );
        table.add_column(a.clone());

        let mut model = CalculusModel::new(generator.next_source_id());
        model.variables = vec![a.clone(), b.clone()];
        model
            .sources
            .push(SourceCondition::Tuple(CalculusSource::Table(table)));
        model.filters.push(FilterCondition::EqualVariables(a.clone(), b.clone()));
        model.filters.push(FilterCondition::equal(
            Expression::column(&b),
            Expression::integer(1),
        ));

        let mut substitution = VariableSubstitution::new();
        substitution.insert(&b, a.clone());
        let result = substitution.rewrite_model(model).unwrap();
        assert!(result.transformed);
        insta::assert_snapshot!(result.data, @r"
        Model s1 [id#0]
          Table s0 person [id#0]
          Filter (id#0 == id#0)
          Filter (id#0 = 1)
        ");
    }

    #[test]
    fn test_unchanged_model_is_not_transformed() {
        let mut generator = CalculusIdGenerator::new();
        let a = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let mut model = CalculusModel::new(generator.next_source_id());
        model.filters.push(FilterCondition::is_not_null(&a));

        let result = VariableSubstitution::new().rewrite_model(model.clone()).unwrap();
        assert!(!result.transformed);
        assert_eq!(result.data, model);
    }
}
