//! Vocabularies used while compiling and materializing queries.

pub use oxrdf::vocab::{rdf, xsd};

/// [R2RML](https://www.w3.org/TR/r2rml/) vocabulary.
pub mod rr {
    use oxrdf::NamedNodeRef;

    /// The default graph of an R2RML mapping.
    pub const DEFAULT_GRAPH: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/r2rml#defaultGraph");
}
