use crate::binders::{SwitchValueBinder, ValueBinder};
use crate::calculus::{CaseBranch, Expression, FilterCondition};
use datafusion::common::tree_node::{Transformed, TreeNode, TreeNodeRecursion};
use relsparql_common::tree_node::{apply_until_stop, map_box, map_pair, map_until_stop};
use relsparql_common::DFResult;

/// The children of a condition are its sub-conditions. Expressions are not traversed.
impl TreeNode for FilterCondition {
    fn apply_children<'n, F: FnMut(&'n Self) -> DFResult<TreeNodeRecursion>>(
        &'n self,
        f: F,
    ) -> DFResult<TreeNodeRecursion> {
        match self {
            FilterCondition::Conjunction(conditions) | FilterCondition::Disjunction(conditions) => {
                apply_until_stop(conditions, f)
            }
            FilterCondition::Negation(inner) => apply_until_stop([inner.as_ref()], f),
            _ => Ok(TreeNodeRecursion::Continue),
        }
    }

    fn map_children<F: FnMut(Self) -> DFResult<Transformed<Self>>>(
        self,
        f: F,
    ) -> DFResult<Transformed<Self>> {
        Ok(match self {
            FilterCondition::Conjunction(conditions) => {
                map_until_stop(conditions, f)?.update_data(FilterCondition::Conjunction)
            }
            FilterCondition::Disjunction(conditions) => {
                map_until_stop(conditions, f)?.update_data(FilterCondition::Disjunction)
            }
            FilterCondition::Negation(inner) => {
                map_box(inner, f)?.update_data(FilterCondition::Negation)
            }
            leaf => Transformed::no(leaf),
        })
    }
}

/// The children of an expression are its sub-expressions, including the values of case
/// branches. Conditions of case branches are not traversed.
impl TreeNode for Expression {
    fn apply_children<'n, F: FnMut(&'n Self) -> DFResult<TreeNodeRecursion>>(
        &'n self,
        f: F,
    ) -> DFResult<TreeNodeRecursion> {
        match self {
            Expression::Concatenation(parts) | Expression::Coalesce(parts) => {
                apply_until_stop(parts, f)
            }
            Expression::Binary(_, left, right) => {
                apply_until_stop([left.as_ref(), right.as_ref()], f)
            }
            Expression::Case(branches) => apply_until_stop(branches.iter().map(|b| &b.value), f),
            Expression::Cast(inner, _) | Expression::IriSafe(inner) => {
                apply_until_stop([inner.as_ref()], f)
            }
            Expression::Constant(_) | Expression::Column(_) | Expression::Null => {
                Ok(TreeNodeRecursion::Continue)
            }
        }
    }

    fn map_children<F: FnMut(Self) -> DFResult<Transformed<Self>>>(
        self,
        mut f: F,
    ) -> DFResult<Transformed<Self>> {
        Ok(match self {
            Expression::Concatenation(parts) => {
                map_until_stop(parts, f)?.update_data(Expression::Concatenation)
            }
            Expression::Coalesce(parts) => {
                map_until_stop(parts, f)?.update_data(Expression::Coalesce)
            }
            Expression::Binary(operator, left, right) => map_pair(*left, *right, f)?
                .update_data(|(left, right)| Expression::binary(operator, left, right)),
            Expression::Case(branches) => map_until_stop(branches, |branch| {
                let CaseBranch { condition, value } = branch;
                Ok(f(value)?.update_data(|value| CaseBranch::new(condition, value)))
            })?
            .update_data(Expression::Case),
            Expression::Cast(inner, sql_type) => {
                map_box(inner, f)?.update_data(|inner| Expression::Cast(inner, sql_type))
            }
            Expression::IriSafe(inner) => map_box(inner, f)?.update_data(Expression::IriSafe),
            leaf @ (Expression::Constant(_) | Expression::Column(_) | Expression::Null) => {
                Transformed::no(leaf)
            }
        })
    }
}

/// The children of a binder are the binders it delegates to.
impl TreeNode for ValueBinder {
    fn apply_children<'n, F: FnMut(&'n Self) -> DFResult<TreeNodeRecursion>>(
        &'n self,
        f: F,
    ) -> DFResult<TreeNodeRecursion> {
        match self {
            ValueBinder::Coalesce(children) => apply_until_stop(children, f),
            ValueBinder::Switch(switch) => {
                apply_until_stop(switch.cases.iter().map(|(_, child)| child), f)
            }
            ValueBinder::Base(_) | ValueBinder::ExpressionSet(_) | ValueBinder::Empty => {
                Ok(TreeNodeRecursion::Continue)
            }
        }
    }

    fn map_children<F: FnMut(Self) -> DFResult<Transformed<Self>>>(
        self,
        mut f: F,
    ) -> DFResult<Transformed<Self>> {
        Ok(match self {
            ValueBinder::Coalesce(children) => {
                map_until_stop(children, f)?.update_data(ValueBinder::Coalesce)
            }
            ValueBinder::Switch(SwitchValueBinder {
                case_variable,
                cases,
            }) => map_until_stop(cases, |(case, child)| {
                Ok(f(child)?.update_data(|child| (case, child)))
            })?
            .update_data(|cases| {
                ValueBinder::Switch(SwitchValueBinder {
                    case_variable,
                    cases,
                })
            }),
            leaf @ (ValueBinder::Base(_) | ValueBinder::ExpressionSet(_) | ValueBinder::Empty) => {
                Transformed::no(leaf)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculus::{CalculusIdGenerator, SqlValue};
    use relsparql_common::{MsSqlDialect, SqlDialect};

    #[test]
    fn test_transform_conditions_bottom_up() {
        let condition = FilterCondition::Conjunction(vec![
            FilterCondition::AlwaysTrue,
            FilterCondition::Negation(Box::new(FilterCondition::AlwaysFalse)),
        ]);
        let result = condition
            .transform_up(|c| {
                Ok(match c {
                    FilterCondition::Negation(inner) if inner.as_constant() == Some(false) => {
                        Transformed::yes(FilterCondition::AlwaysTrue)
                    }
                    other => Transformed::no(other),
                })
            })
            .unwrap();
        assert!(result.transformed);
        assert_eq!(result.data.to_string(), "(TRUE AND TRUE)");
    }

    #[test]
    fn test_expression_children_include_case_values() {
        let mut generator = CalculusIdGenerator::new();
        let column = generator.column_variable("id", MsSqlDialect.integer_type(), false);
        let expression = Expression::Case(vec![CaseBranch::new(
            FilterCondition::IsNull(column.clone()),
            Expression::Concatenation(vec![Expression::string("a"), Expression::column(&column)]),
        )]);

        let mut constants = Vec::new();
        expression
            .apply(|e| {
                if let Expression::Constant(value) = e {
                    constants.push(value.clone());
                }
                Ok(TreeNodeRecursion::Continue)
            })
            .unwrap();
        assert_eq!(constants, vec![SqlValue::string("a")]);
    }
}
