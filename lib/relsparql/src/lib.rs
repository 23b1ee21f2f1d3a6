#![doc = include_str!("../README.md")]
#![doc(test(attr(deny(warnings))))]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod engine;
pub mod error;
mod naming;
mod results;
mod sql;

pub use engine::{CompiledQuery, QueryOptions, RelSparqlEngine};
pub use naming::QueryNaming;
pub use relsparql_optimizer::OptimizationLevel;
pub use results::{QueryResults, QuerySolutionIter};
pub use sparesults::QuerySolution;
pub use sql::SqlWriter;

pub mod model {
    pub use relsparql_model::*;
}

pub mod common {
    pub use relsparql_common::*;
}

pub mod mapping {
    pub use relsparql_mapping::*;
}

pub mod algebra {
    pub use relsparql_algebra::*;
}

pub mod logical {
    pub use relsparql_logical::*;
}

pub mod optimizer {
    pub use relsparql_optimizer::*;
}
