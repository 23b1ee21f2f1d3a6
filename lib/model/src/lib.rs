mod error;
mod type_category;
pub mod vocab;

pub use error::*;
pub use type_category::{is_numeric_datatype, TypeCategory};

// Re-export some oxrdf types.
pub use oxiri::{Iri, IriParseError};
pub use oxrdf::{
    BlankNode, BlankNodeRef, GraphName, Literal, LiteralRef, NamedNode, NamedNodeRef,
    NamedOrBlankNode, Subject, Term, TermRef, Variable, VariableRef,
};
