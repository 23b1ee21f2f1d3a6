use crate::expression::Expression;
use crate::pattern::GraphPattern;
use datafusion::common::internal_err;
use datafusion::common::tree_node::{Transformed, TreeNode, TreeNodeRecursion};
use relsparql_common::tree_node::{apply_until_stop, map_box, map_pair, map_until_stop};
use relsparql_common::DFResult;

impl TreeNode for GraphPattern {
    fn apply_children<'n, F: FnMut(&'n Self) -> DFResult<TreeNodeRecursion>>(
        &'n self,
        f: F,
    ) -> DFResult<TreeNodeRecursion> {
        match self {
            GraphPattern::Join { left, right } | GraphPattern::LeftJoin { left, right, .. } => {
                apply_until_stop([left.as_ref(), right.as_ref()], f)
            }
            GraphPattern::Union(branches) => apply_until_stop(branches, f),
            GraphPattern::Filter { inner, .. } | GraphPattern::Extend { inner, .. } => {
                apply_until_stop([inner.as_ref()], f)
            }
            GraphPattern::Triple(_)
            | GraphPattern::RestrictedTriple(_)
            | GraphPattern::Empty
            | GraphPattern::NotMatching => Ok(TreeNodeRecursion::Continue),
        }
    }

    fn map_children<F: FnMut(Self) -> DFResult<Transformed<Self>>>(
        self,
        f: F,
    ) -> DFResult<Transformed<Self>> {
        Ok(match self {
            GraphPattern::Join { left, right } => map_pair(*left, *right, f)?
                .update_data(|(left, right)| GraphPattern::join(left, right)),
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => map_pair(*left, *right, f)?
                .update_data(|(left, right)| GraphPattern::left_join(left, right, expression)),
            GraphPattern::Union(branches) => {
                map_until_stop(branches, f)?.update_data(GraphPattern::Union)
            }
            GraphPattern::Filter { inner, expression } => map_box(inner, f)?
                .update_data(|inner| GraphPattern::Filter { inner, expression }),
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => map_box(inner, f)?.update_data(|inner| GraphPattern::Extend {
                inner,
                variable,
                expression,
            }),
            leaf @ (GraphPattern::Triple(_)
            | GraphPattern::RestrictedTriple(_)
            | GraphPattern::Empty
            | GraphPattern::NotMatching) => Transformed::no(leaf),
        })
    }
}

impl GraphPattern {
    /// Maps the expressions directly attached to this node (not the ones of its children).
    pub fn map_expressions<F: FnMut(Expression) -> DFResult<Transformed<Expression>>>(
        self,
        mut f: F,
    ) -> DFResult<Transformed<Self>> {
        Ok(match self {
            GraphPattern::LeftJoin {
                left,
                right,
                expression: Some(expression),
            } => f(expression)?.update_data(|expression| GraphPattern::LeftJoin {
                left,
                right,
                expression: Some(expression),
            }),
            GraphPattern::Filter { inner, expression } => {
                f(expression)?.update_data(|expression| GraphPattern::Filter { inner, expression })
            }
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => f(expression)?.update_data(|expression| GraphPattern::Extend {
                inner,
                variable,
                expression,
            }),
            other => Transformed::no(other),
        })
    }
}

impl TreeNode for Expression {
    fn apply_children<'n, F: FnMut(&'n Self) -> DFResult<TreeNodeRecursion>>(
        &'n self,
        f: F,
    ) -> DFResult<TreeNodeRecursion> {
        match self {
            Expression::Variable(_)
            | Expression::NamedNode(_)
            | Expression::Literal(_)
            | Expression::Bound(_) => Ok(TreeNodeRecursion::Continue),
            Expression::Or(left, right)
            | Expression::And(left, right)
            | Expression::Compare(_, left, right)
            | Expression::SameTerm(left, right)
            | Expression::Arithmetic(_, left, right) => {
                apply_until_stop([left.as_ref(), right.as_ref()], f)
            }
            Expression::Not(inner) | Expression::UnaryPlus(inner) | Expression::UnaryMinus(inner) => {
                apply_until_stop([inner.as_ref()], f)
            }
            Expression::If(test, then, otherwise) => {
                apply_until_stop([test.as_ref(), then.as_ref(), otherwise.as_ref()], f)
            }
            Expression::Coalesce(args) | Expression::FunctionCall(_, args) => {
                apply_until_stop(args, f)
            }
            Expression::In(needle, haystack) => {
                apply_until_stop(std::iter::once(needle.as_ref()).chain(haystack), f)
            }
        }
    }

    fn map_children<F: FnMut(Self) -> DFResult<Transformed<Self>>>(
        self,
        f: F,
    ) -> DFResult<Transformed<Self>> {
        let boxed = |(left, right): (Expression, Expression)| (Box::new(left), Box::new(right));
        Ok(match self {
            leaf @ (Expression::Variable(_)
            | Expression::NamedNode(_)
            | Expression::Literal(_)
            | Expression::Bound(_)) => Transformed::no(leaf),
            Expression::Or(left, right) => map_pair(*left, *right, f)?
                .update_data(|pair| {
                    let (left, right) = boxed(pair);
                    Expression::Or(left, right)
                }),
            Expression::And(left, right) => map_pair(*left, *right, f)?
                .update_data(|pair| {
                    let (left, right) = boxed(pair);
                    Expression::And(left, right)
                }),
            Expression::Compare(operator, left, right) => map_pair(*left, *right, f)?
                .update_data(|pair| {
                    let (left, right) = boxed(pair);
                    Expression::Compare(operator, left, right)
                }),
            Expression::SameTerm(left, right) => map_pair(*left, *right, f)?
                .update_data(|pair| {
                    let (left, right) = boxed(pair);
                    Expression::SameTerm(left, right)
                }),
            Expression::Arithmetic(operator, left, right) => map_pair(*left, *right, f)?
                .update_data(|pair| {
                    let (left, right) = boxed(pair);
                    Expression::Arithmetic(operator, left, right)
                }),
            Expression::Not(inner) => map_box(inner, f)?.update_data(Expression::Not),
            Expression::UnaryPlus(inner) => map_box(inner, f)?.update_data(Expression::UnaryPlus),
            Expression::UnaryMinus(inner) => {
                map_box(inner, f)?.update_data(Expression::UnaryMinus)
            }
            Expression::If(test, then, otherwise) => {
                map_until_stop(vec![*test, *then, *otherwise], f)?.map_data(|args| {
                    match <[Expression; 3]>::try_from(args) {
                        Ok([test, then, otherwise]) => Ok(Expression::If(
                            Box::new(test),
                            Box::new(then),
                            Box::new(otherwise),
                        )),
                        Err(_) => internal_err!("IF must keep its three arguments."),
                    }
                })?
            }
            Expression::Coalesce(args) => map_until_stop(args, f)?.update_data(Expression::Coalesce),
            Expression::FunctionCall(function, args) => map_until_stop(args, f)?
                .update_data(|args| Expression::FunctionCall(function, args)),
            Expression::In(needle, haystack) => {
                let mut args = Vec::with_capacity(haystack.len() + 1);
                args.push(*needle);
                args.extend(haystack);
                map_until_stop(args, f)?.update_data(|mut args| {
                    let needle = args.remove(0);
                    Expression::In(Box::new(needle), args)
                })
            }
        })
    }
}
