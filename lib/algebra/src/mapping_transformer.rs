use crate::pattern::{
    GraphPattern, ObjectTarget, PatternTerm, RestrictedTriplePattern, TriplePattern,
};
use datafusion::common::tree_node::{Transformed, TreeNode};
use relsparql_common::DFResult;
use relsparql_mapping::{R2RmlMapping, TermMap, TermPosition, TriplesMap};
use std::sync::Arc;

/// Replaces every triple pattern with the union of the mapping rules that may produce a
/// matching triple.
///
/// One [RestrictedTriplePattern] is created per (triples map, predicate-object map, predicate
/// map, object map or ref-object map) and per (triples map, class), each multiplied by the
/// graph maps of the subject map and the predicate-object map. A rule is only left out if it
/// provably cannot produce a matching triple.
#[derive(Debug, Clone)]
pub struct MappingTransformer {
    mapping: Arc<R2RmlMapping>,
}

impl MappingTransformer {
    pub fn new(mapping: Arc<R2RmlMapping>) -> Self {
        Self { mapping }
    }

    /// Expands all triple patterns of `pattern`.
    pub fn transform(&self, pattern: GraphPattern) -> DFResult<Transformed<GraphPattern>> {
        pattern.transform_up(|pattern| match pattern {
            GraphPattern::Triple(triple) => Ok(Transformed::yes(self.expand(&triple))),
            other => Ok(Transformed::no(other)),
        })
    }

    /// Expands a single triple pattern.
    pub fn expand(&self, pattern: &TriplePattern) -> GraphPattern {
        let mut branches = Vec::new();
        for triples_map in self.mapping.triples_maps() {
            self.expand_triples_map(pattern, triples_map, &mut branches);
        }

        tracing::trace!("Expanded {pattern} into {} branches", branches.len());
        GraphPattern::union(
            branches
                .into_iter()
                .map(|branch| GraphPattern::RestrictedTriple(Box::new(branch)))
                .collect(),
        )
    }

    fn expand_triples_map(
        &self,
        pattern: &TriplePattern,
        triples_map: &Arc<TriplesMap>,
        branches: &mut Vec<RestrictedTriplePattern>,
    ) {
        let subject_map = &triples_map.subject_map;
        if !can_match(&subject_map.term_map, &pattern.subject) {
            return;
        }

        for pom in &triples_map.predicate_object_maps {
            let graph_maps = subject_map
                .graph_maps
                .iter()
                .chain(pom.graph_maps.iter())
                .collect::<Vec<_>>();

            for predicate_map in &pom.predicate_maps {
                if !can_match(predicate_map, &pattern.predicate) {
                    continue;
                }

                for object_map in &pom.object_maps {
                    if !can_match(object_map, &pattern.object) {
                        continue;
                    }
                    push_graph_branches(
                        branches,
                        pattern,
                        triples_map,
                        predicate_map,
                        &ObjectTarget::Map(object_map.clone()),
                        &graph_maps,
                    );
                }

                for ref_object_map in &pom.ref_object_maps {
                    let parent_matches = self
                        .mapping
                        .triples_map(&ref_object_map.parent_triples_map)
                        .is_some_and(|parent| {
                            can_match(&parent.subject_map.term_map, &pattern.object)
                        });
                    if !parent_matches {
                        continue;
                    }
                    push_graph_branches(
                        branches,
                        pattern,
                        triples_map,
                        predicate_map,
                        &ObjectTarget::Ref(ref_object_map.clone()),
                        &graph_maps,
                    );
                }
            }
        }

        let rdf_type = TermMap::rdf_type();
        if !can_match(&rdf_type, &pattern.predicate) {
            return;
        }
        let graph_maps = subject_map.graph_maps.iter().collect::<Vec<_>>();
        for class in &subject_map.classes {
            let class_map = TermMap::constant(TermPosition::Object, class.clone());
            if !can_match(&class_map, &pattern.object) {
                continue;
            }
            push_graph_branches(
                branches,
                pattern,
                triples_map,
                &rdf_type,
                &ObjectTarget::Map(class_map),
                &graph_maps,
            );
        }
    }
}

fn push_graph_branches(
    branches: &mut Vec<RestrictedTriplePattern>,
    pattern: &TriplePattern,
    triples_map: &Arc<TriplesMap>,
    predicate_map: &TermMap,
    object: &ObjectTarget,
    graph_maps: &[&TermMap],
) {
    let branch = |graph_map: Option<&TermMap>| RestrictedTriplePattern {
        pattern: pattern.clone(),
        triples_map: Arc::clone(triples_map),
        predicate_map: predicate_map.clone(),
        object: object.clone(),
        graph_map: graph_map.cloned(),
    };

    if graph_maps.is_empty() {
        // Only the default graph is produced.
        if pattern.graph.is_none() {
            branches.push(branch(None));
        }
        return;
    }

    for graph_map in graph_maps {
        let applicable = match &pattern.graph {
            None => true,
            Some(graph) => !graph_map.is_default_graph() && can_match(graph_map, graph),
        };
        if applicable {
            branches.push(branch(Some(graph_map)));
        }
    }
}

/// Checks whether the term map may produce a term matching the pattern term.
fn can_match(term_map: &TermMap, pattern_term: &PatternTerm) -> bool {
    match pattern_term {
        PatternTerm::Variable(_) => true,
        PatternTerm::Term(term) => term_map.can_produce(term.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relsparql_mapping::{
        LogicalTable, PredicateObjectMap, RefObjectMap, SubjectMap, TriplesMap,
    };
    use relsparql_model::{NamedNode, Term, Variable};

    fn iri(value: &str) -> NamedNode {
        NamedNode::new_unchecked(value)
    }

    fn var(name: &str) -> PatternTerm {
        PatternTerm::Variable(Variable::new_unchecked(name))
    }

    fn term(term: impl Into<Term>) -> PatternTerm {
        PatternTerm::Term(term.into())
    }

    fn pattern(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> TriplePattern {
        TriplePattern {
            subject,
            predicate,
            object,
            graph: None,
        }
    }

    fn subject_map(graphs: usize) -> SubjectMap {
        let mut subject = SubjectMap::new(
            TermMap::template(TermPosition::Subject, "http://ex.org/person/{id}").unwrap(),
        )
        .with_class(iri("http://ex.org/Person"))
        .with_class(iri("http://ex.org/Agent"));
        for i in 0..graphs {
            subject = subject.with_graph_map(TermMap::constant(
                TermPosition::Graph,
                iri(&format!("http://ex.org/graph/{i}")),
            ));
        }
        subject
    }

    fn person_mapping(graphs: usize) -> Arc<R2RmlMapping> {
        let person = TriplesMap::new(
            "person",
            LogicalTable::Table("person".to_owned()),
            subject_map(graphs),
        )
        .with_predicate_object_map(
            PredicateObjectMap::new()
                .with_predicate(iri("http://xmlns.com/foaf/0.1/name"))
                .with_predicate(iri("http://www.w3.org/2000/01/rdf-schema#label"))
                .with_object_map(TermMap::column(TermPosition::Object, "name"))
                .with_object_map(TermMap::column(TermPosition::Object, "nickname")),
        )
        .with_predicate_object_map(
            PredicateObjectMap::new()
                .with_predicate(iri("http://ex.org/dept"))
                .with_ref_object_map(RefObjectMap::new("dept").with_join_condition("dept", "id")),
        );
        let dept = TriplesMap::new(
            "dept",
            LogicalTable::Table("dept".to_owned()),
            SubjectMap::new(
                TermMap::template(TermPosition::Subject, "http://ex.org/dept/{id}").unwrap(),
            ),
        );
        Arc::new(R2RmlMapping::try_new([person, dept]).unwrap())
    }

    fn branch_count(pattern: &GraphPattern) -> usize {
        match pattern {
            GraphPattern::Union(branches) => branches.len(),
            GraphPattern::RestrictedTriple(_) => 1,
            GraphPattern::NotMatching => 0,
            other => panic!("Unexpected pattern {other}"),
        }
    }

    #[test]
    fn test_expansion_is_complete_without_graphs() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let result = transformer.expand(&pattern(var("s"), var("p"), var("o")));
        // person: 2 predicates x 2 objects + 1 ref + 2 classes; dept: nothing.
        assert_eq!(branch_count(&result), 7);
    }

    #[test]
    fn test_expansion_is_multiplied_by_graph_maps() {
        let transformer = MappingTransformer::new(person_mapping(3));
        let result = transformer.expand(&pattern(var("s"), var("p"), var("o")));
        assert_eq!(branch_count(&result), 3 * 7);
    }

    #[test]
    fn test_bound_predicate_prunes_branches() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let result = transformer.expand(&pattern(
            var("s"),
            term(iri("http://xmlns.com/foaf/0.1/name")),
            var("o"),
        ));
        assert_eq!(branch_count(&result), 2);
    }

    #[test]
    fn test_class_assertions() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let result = transformer.expand(&pattern(
            var("s"),
            term(relsparql_model::vocab::rdf::TYPE.into_owned()),
            term(iri("http://ex.org/Agent")),
        ));
        let GraphPattern::RestrictedTriple(branch) = result else {
            panic!("Expected a single branch");
        };
        assert_eq!(branch.triples_map.id, "person");
        assert_eq!(
            branch.object,
            ObjectTarget::Map(TermMap::constant(
                TermPosition::Object,
                iri("http://ex.org/Agent")
            ))
        );
    }

    #[test]
    fn test_subject_template_mismatch_yields_not_matching() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let result = transformer.expand(&pattern(
            term(iri("http://other.org/1")),
            var("p"),
            var("o"),
        ));
        assert_eq!(result, GraphPattern::NotMatching);
    }

    #[test]
    fn test_ref_object_checks_parent_subject() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let matching = transformer.expand(&pattern(
            var("s"),
            term(iri("http://ex.org/dept")),
            term(iri("http://ex.org/dept/3")),
        ));
        assert_eq!(branch_count(&matching), 1);

        let not_matching = transformer.expand(&pattern(
            var("s"),
            term(iri("http://ex.org/dept")),
            term(iri("http://ex.org/person/3")),
        ));
        assert_eq!(not_matching, GraphPattern::NotMatching);
    }

    #[test]
    fn test_named_graph_patterns_skip_default_graph_rules() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let mut triple = pattern(var("s"), var("p"), var("o"));
        triple.graph = Some(var("g"));
        assert_eq!(transformer.expand(&triple), GraphPattern::NotMatching);

        let transformer = MappingTransformer::new(person_mapping(2));
        triple.graph = Some(term(iri("http://ex.org/graph/1")));
        assert_eq!(branch_count(&transformer.expand(&triple)), 7);
    }

    #[test]
    fn test_transform_replaces_nested_triples() {
        let transformer = MappingTransformer::new(person_mapping(0));
        let name = pattern(var("s"), term(iri("http://xmlns.com/foaf/0.1/name")), var("n"));
        let input = GraphPattern::left_join(
            GraphPattern::Triple(name.clone()),
            GraphPattern::Triple(name),
            None,
        );
        let result = transformer.transform(input).unwrap();
        assert!(result.transformed);
        let GraphPattern::LeftJoin { left, right, .. } = result.data else {
            panic!("Expected a left join");
        };
        assert_eq!(branch_count(&left), 2);
        assert_eq!(branch_count(&right), 2);
    }
}
