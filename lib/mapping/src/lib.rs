//! The R2RML mapping model consumed by the query compiler.
//!
//! Mappings are built programmatically. A [R2RmlMapping] is an ordered, immutable list of
//! [TriplesMap]s, each describing how the rows of one logical table are turned into triples.

mod mapping;
mod template;
mod term_map;
mod triples_map;

pub use mapping::R2RmlMapping;
pub use template::{appears_in_iri_safe, iri_safe, iri_unsafe, Template, TemplatePart};
pub use term_map::{TermGenerationContext, TermMap, TermMapValue, TermPosition, TermType};
pub use triples_map::{
    JoinCondition, LogicalTable, PredicateObjectMap, RefObjectMap, SubjectMap, TriplesMap,
};
