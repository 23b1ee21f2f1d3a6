use crate::term_map::{TermMap, TermPosition};
use datafusion::common::plan_err;
use relsparql_common::DFResult;
use relsparql_model::NamedNode;

/// The rows a [TriplesMap] is evaluated on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalTable {
    /// A table or view.
    Table(String),
    /// An R2RML view, a literal SQL query.
    SqlQuery(String),
}

/// The subject map of a [TriplesMap].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectMap {
    pub term_map: TermMap,
    /// `rr:class` values. Each one produces an `rdf:type` triple.
    pub classes: Vec<NamedNode>,
    pub graph_maps: Vec<TermMap>,
}

impl SubjectMap {
    pub fn new(term_map: TermMap) -> Self {
        Self {
            term_map,
            classes: Vec::new(),
            graph_maps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_class(mut self, class: NamedNode) -> Self {
        self.classes.push(class);
        self
    }

    #[must_use]
    pub fn with_graph_map(mut self, graph_map: TermMap) -> Self {
        self.graph_maps.push(graph_map);
        self
    }
}

/// Joins the logical table of the child triples map with the one of the parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinCondition {
    pub child_column: String,
    pub parent_column: String,
}

/// An object map that refers to the subjects of another triples map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefObjectMap {
    /// The id of the parent triples map.
    pub parent_triples_map: String,
    /// Without join conditions both triples maps must share the logical table.
    pub join_conditions: Vec<JoinCondition>,
}

impl RefObjectMap {
    pub fn new(parent_triples_map: impl Into<String>) -> Self {
        Self {
            parent_triples_map: parent_triples_map.into(),
            join_conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_join_condition(
        mut self,
        child_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        self.join_conditions.push(JoinCondition {
            child_column: child_column.into(),
            parent_column: parent_column.into(),
        });
        self
    }
}

/// A `rr:predicateObjectMap`: every predicate map is combined with every object map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PredicateObjectMap {
    pub predicate_maps: Vec<TermMap>,
    pub object_maps: Vec<TermMap>,
    pub ref_object_maps: Vec<RefObjectMap>,
    pub graph_maps: Vec<TermMap>,
}

impl PredicateObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant predicate.
    #[must_use]
    pub fn with_predicate(self, predicate: NamedNode) -> Self {
        self.with_predicate_map(TermMap::constant(TermPosition::Predicate, predicate))
    }

    #[must_use]
    pub fn with_predicate_map(mut self, predicate_map: TermMap) -> Self {
        self.predicate_maps.push(predicate_map);
        self
    }

    #[must_use]
    pub fn with_object_map(mut self, object_map: TermMap) -> Self {
        self.object_maps.push(object_map);
        self
    }

    #[must_use]
    pub fn with_ref_object_map(mut self, ref_object_map: RefObjectMap) -> Self {
        self.ref_object_maps.push(ref_object_map);
        self
    }

    #[must_use]
    pub fn with_graph_map(mut self, graph_map: TermMap) -> Self {
        self.graph_maps.push(graph_map);
        self
    }
}

/// An R2RML triples map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplesMap {
    pub id: String,
    pub logical_table: LogicalTable,
    pub subject_map: SubjectMap,
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMap {
    pub fn new(id: impl Into<String>, logical_table: LogicalTable, subject_map: SubjectMap) -> Self {
        Self {
            id: id.into(),
            logical_table,
            subject_map,
            predicate_object_maps: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_predicate_object_map(mut self, predicate_object_map: PredicateObjectMap) -> Self {
        self.predicate_object_maps.push(predicate_object_map);
        self
    }

    /// Checks the positions of all term maps.
    pub fn validate(&self) -> DFResult<()> {
        check_position(&self.subject_map.term_map, TermPosition::Subject)?;
        for graph_map in &self.subject_map.graph_maps {
            check_position(graph_map, TermPosition::Graph)?;
        }
        for pom in &self.predicate_object_maps {
            for map in &pom.predicate_maps {
                check_position(map, TermPosition::Predicate)?;
            }
            for map in &pom.object_maps {
                check_position(map, TermPosition::Object)?;
            }
            for map in &pom.graph_maps {
                check_position(map, TermPosition::Graph)?;
            }
        }
        Ok(())
    }
}

fn check_position(term_map: &TermMap, expected: TermPosition) -> DFResult<()> {
    if term_map.position() != expected {
        return plan_err!(
            "Term map {:?} used as {expected:?} map but was created for {:?}.",
            term_map.value(),
            term_map.position()
        );
    }
    Ok(())
}
