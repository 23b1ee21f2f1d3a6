use crate::{CalculusOptimizerRule, OptimizerContext};
use datafusion::common::internal_err;
use datafusion::common::tree_node::Transformed;
use relsparql_common::DFResult;
use relsparql_logical::calculus::{
    CalculusModel, CalculusSource, Expression, FilterCondition, SourceCondition, SqlTable,
    SqlValue, TableSource, VariableId,
};
use relsparql_logical::rewrite::{CalculusRewriter, VariableSubstitution};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Removes joins of a table with itself on a unique key.
///
/// Two occurrences of the same table in a model are merged if the filters of the model imply
/// that they agree on all columns of a primary key or unique key. The columns of the removed
/// occurrence are replaced by the columns of the remaining one.
#[derive(Debug, Default)]
pub struct SelfJoinRule {}

impl SelfJoinRule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalculusOptimizerRule for SelfJoinRule {
    fn name(&self) -> &str {
        "self-join-elimination"
    }

    fn rewrite(
        &self,
        model: CalculusModel,
        context: &mut OptimizerContext,
    ) -> DFResult<Transformed<CalculusModel>> {
        let mut merger = SelfJoinMerger::default();
        let result = merger.rewrite_model(model)?;
        if merger.substitution.is_empty() {
            return Ok(result);
        }

        // Enclosing models may reference the exported variables of a model with merged tables.
        context.replace_variables(&merger.substitution);
        result.transform_data(|model| merger.substitution.rewrite_model(model))
    }
}

#[derive(Debug, Default)]
struct SelfJoinMerger {
    substitution: VariableSubstitution,
}

impl CalculusRewriter for SelfJoinMerger {
    fn post_rewrite_model(
        &mut self,
        mut model: CalculusModel,
    ) -> DFResult<Transformed<CalculusModel>> {
        let mut transformed = false;
        while let Some((kept, removed)) = find_mergeable_pair(&model) {
            model = self.merge(model, kept, removed)?;
            transformed = true;
        }
        Ok(Transformed::new_transformed(model, transformed))
    }
}

impl SelfJoinMerger {
    /// Merges the table at `removed` into the table at `kept`.
    fn merge(
        &mut self,
        mut model: CalculusModel,
        kept: usize,
        removed: usize,
    ) -> DFResult<CalculusModel> {
        let SourceCondition::Tuple(CalculusSource::Table(removed_table)) =
            model.sources.remove(removed)
        else {
            return internal_err!("Expected a table at source position {removed}");
        };
        let Some(SourceCondition::Tuple(CalculusSource::Table(kept_table))) =
            model.sources.get_mut(kept)
        else {
            return internal_err!("Expected a table at source position {kept}");
        };
        debug!(
            "Merging table occurrences {} and {} of {}",
            kept_table.id(),
            removed_table.id(),
            kept_table.source()
        );

        let mut substitution = VariableSubstitution::new();
        for column in removed_table.columns() {
            let existing = column
                .column_name()
                .and_then(|name| kept_table.column(name))
                .cloned();
            match existing {
                Some(existing) => substitution.insert(column, existing),
                None => kept_table.add_column(column.clone()),
            }
        }

        self.substitution.extend(&substitution);
        Ok(substitution.rewrite_model(model)?.data)
    }
}

/// Finds two occurrences of the same table that agree on a unique key. Returns the positions of
/// both sources.
fn find_mergeable_pair(model: &CalculusModel) -> Option<(usize, usize)> {
    let tables = model
        .sources
        .iter()
        .enumerate()
        .filter_map(|(i, source)| match source {
            SourceCondition::Tuple(CalculusSource::Table(table))
                if matches!(table.source(), TableSource::Table(_))
                    && !table.unique_keys().is_empty() =>
            {
                Some((i, table))
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    if tables.len() < 2 {
        return None;
    }

    let satisfied = SatisfactionMap::from_filters(&model.filters);
    for (n, (i, left)) in tables.iter().enumerate() {
        for (j, right) in &tables[n + 1..] {
            if left.source() == right.source() && satisfied.identifies_same_row(left, right) {
                return Some((*i, *j));
            }
        }
    }
    None
}

/// The column equalities and constant bindings that every tuple satisfying a condition has.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct SatisfactionMap {
    equal_columns: HashSet<(VariableId, VariableId)>,
    constants: HashMap<VariableId, SqlValue>,
}

impl SatisfactionMap {
    fn from_filters(filters: &[FilterCondition]) -> Self {
        let mut result = Self::default();
        for filter in filters {
            result.merge_with(Self::from_condition(filter));
        }
        result
    }

    fn from_condition(condition: &FilterCondition) -> Self {
        let mut result = Self::default();
        match condition {
            FilterCondition::EqualVariables(left, right) => {
                result.insert_equality(left.id(), right.id());
            }
            FilterCondition::EqualExpressions(
                Expression::Column(variable),
                Expression::Constant(value),
            )
            | FilterCondition::EqualExpressions(
                Expression::Constant(value),
                Expression::Column(variable),
            ) => {
                result.constants.insert(variable.id(), value.clone());
            }
            FilterCondition::Conjunction(conditions) => {
                for condition in conditions {
                    result.merge_with(Self::from_condition(condition));
                }
            }
            FilterCondition::Disjunction(conditions) => {
                let mut alternatives = conditions.iter().map(Self::from_condition);
                if let Some(first) = alternatives.next() {
                    result = alternatives.fold(first, Self::intersect);
                }
            }
            _ => {}
        }
        result
    }

    fn insert_equality(&mut self, left: VariableId, right: VariableId) {
        self.equal_columns.insert((left.min(right), left.max(right)));
    }

    /// Both `self` and `other` hold.
    fn merge_with(&mut self, other: Self) {
        self.equal_columns.extend(other.equal_columns);
        for (variable, value) in other.constants {
            self.constants.entry(variable).or_insert(value);
        }
    }

    /// `self` or `other` holds.
    fn intersect(self, other: Self) -> Self {
        let equal_columns = self
            .equal_columns
            .intersection(&other.equal_columns)
            .copied()
            .collect();
        let constants = self
            .constants
            .into_iter()
            .filter(|(variable, value)| other.constants.get(variable) == Some(value))
            .collect();
        Self {
            equal_columns,
            constants,
        }
    }

    fn is_equal(&self, left: VariableId, right: VariableId) -> bool {
        if self.equal_columns.contains(&(left.min(right), left.max(right))) {
            return true;
        }
        matches!(
            (self.constants.get(&left), self.constants.get(&right)),
            (Some(l), Some(r)) if l == r
        )
    }

    /// Whether both occurrences agree on all columns of one of their unique keys.
    fn identifies_same_row(&self, left: &SqlTable, right: &SqlTable) -> bool {
        left.unique_keys().iter().any(|key| {
            key.iter().all(|column| {
                match (left.column(column), right.column(column)) {
                    (Some(l), Some(r)) => self.is_equal(l.id(), r.id()),
                    _ => false,
                }
            })
        })
    }
}
