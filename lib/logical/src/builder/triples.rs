use crate::binders::{BaseValueBinder, ValueBinder};
use crate::builder::{PatternResult, RelationalBuilder};
use crate::calculus::{CalculusModel, CalculusSource, FilterCondition, SourceCondition, SqlTable};
use crate::expression_sets::ExpressionsSet;
use relsparql_algebra::{ObjectTarget, PatternTerm, RestrictedTriplePattern};
use relsparql_common::DFResult;
use relsparql_mapping::TermMap;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::trace;

impl RelationalBuilder {
    /// A triple pattern matched against a single mapping rule.
    ///
    /// The rows of the logical table (joined with the parent table for referencing object
    /// maps) produce the triples. Rows with `NULL` in a referenced column produce no triple.
    pub(super) fn build_restricted_triple(
        &mut self,
        triple: &RestrictedTriplePattern,
    ) -> DFResult<PatternResult> {
        let triples_map = &triple.triples_map;
        let mut table = self.context.new_table(&triples_map.logical_table)?;
        let mut parent_table = None;
        let mut join_conditions = Vec::new();

        let subject = self.base_binder(&mut table, &triples_map.subject_map.term_map)?;
        let predicate = self.base_binder(&mut table, &triple.predicate_map)?;
        let object = match &triple.object {
            ObjectTarget::Map(object_map) => self.base_binder(&mut table, object_map)?,
            ObjectTarget::Ref(ref_object_map) => {
                let parent = std::sync::Arc::clone(
                    self.context
                        .triples_map(&ref_object_map.parent_triples_map)?,
                );
                if ref_object_map.join_conditions.is_empty() {
                    self.base_binder(&mut table, &parent.subject_map.term_map)?
                } else {
                    let mut parent = (self.context.new_table(&parent.logical_table)?, parent);
                    for condition in &ref_object_map.join_conditions {
                        let child = self.context.column(&mut table, &condition.child_column)?;
                        let parent_column = self
                            .context
                            .column(&mut parent.0, &condition.parent_column)?;
                        join_conditions.push(FilterCondition::EqualVariables(child, parent_column));
                    }
                    let binder =
                        self.base_binder(&mut parent.0, &parent.1.subject_map.term_map)?;
                    parent_table = Some(parent.0);
                    binder
                }
            }
        };
        let graph = match &triple.graph_map {
            Some(graph_map) => Some(self.base_binder(&mut table, graph_map)?),
            None => None,
        };

        let mut model = CalculusModel::new(self.context.next_source_id());
        let mut binders = BTreeMap::new();

        let all_binders = [Some(&subject), Some(&predicate), Some(&object), graph.as_ref()];
        let mut guarded = Vec::new();
        for binder in all_binders.into_iter().flatten() {
            for (_, variable) in binder.columns() {
                if !guarded.contains(variable) {
                    guarded.push(variable.clone());
                    model.filters.push(FilterCondition::is_not_null(variable));
                }
            }
        }
        model.filters.extend(join_conditions);

        let pattern = &triple.pattern;
        let mut positions = vec![
            (&pattern.subject, subject),
            (&pattern.predicate, predicate),
            (&pattern.object, object),
        ];
        match (&pattern.graph, graph) {
            (Some(term), Some(graph)) => positions.push((term, graph)),
            (Some(_), None) => model.filters.push(FilterCondition::AlwaysFalse),
            (None, _) => {}
        }
        for (term, binder) in positions {
            let binder = ValueBinder::Base(binder);
            match term {
                PatternTerm::Variable(variable) => match binders.entry(variable.clone()) {
                    Entry::Vacant(entry) => {
                        entry.insert(binder);
                    }
                    Entry::Occupied(entry) => {
                        let condition = self.term_equality(entry.get(), &binder)?;
                        model.filters.push(condition);
                    }
                },
                PatternTerm::Term(term) => {
                    let value = binder.expressions(self.context.dialect())?;
                    let constant = ExpressionsSet::from_term(term.as_ref());
                    model.filters.push(value.same_term(&constant));
                }
            }
        }
        model
            .filters
            .retain(|filter| filter.as_constant() != Some(true));

        model
            .sources
            .push(SourceCondition::Tuple(CalculusSource::Table(table)));
        if let Some(parent_table) = parent_table {
            model
                .sources
                .push(SourceCondition::Tuple(CalculusSource::Table(parent_table)));
        }
        trace!("Built triple {} from {}", pattern, triples_map.id);
        Ok(PatternResult { model, binders })
    }

    fn base_binder(&mut self, table: &mut SqlTable, term_map: &TermMap) -> DFResult<BaseValueBinder> {
        let columns = term_map
            .columns()
            .into_iter()
            .map(|column| Ok((column.to_owned(), self.context.column(table, column)?)))
            .collect::<DFResult<Vec<_>>>()?;
        Ok(BaseValueBinder::new(term_map.clone(), columns))
    }
}
