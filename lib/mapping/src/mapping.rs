use crate::triples_map::TriplesMap;
use datafusion::common::plan_err;
use relsparql_common::DFResult;
use std::collections::HashMap;
use std::sync::Arc;

/// An ordered, immutable collection of triples maps.
#[derive(Debug, Clone, Default)]
pub struct R2RmlMapping {
    triples_maps: Vec<Arc<TriplesMap>>,
    index: HashMap<String, usize>,
}

impl R2RmlMapping {
    /// Creates a mapping. Fails on duplicate ids, dangling parent references or term maps in
    /// the wrong position.
    pub fn try_new(triples_maps: impl IntoIterator<Item = TriplesMap>) -> DFResult<Self> {
        let triples_maps = triples_maps
            .into_iter()
            .map(Arc::new)
            .collect::<Vec<_>>();

        let mut index = HashMap::new();
        for (position, triples_map) in triples_maps.iter().enumerate() {
            triples_map.validate()?;
            if index.insert(triples_map.id.clone(), position).is_some() {
                return plan_err!("Duplicate triples map '{}'.", triples_map.id);
            }
        }

        for triples_map in &triples_maps {
            let parents = triples_map
                .predicate_object_maps
                .iter()
                .flat_map(|pom| pom.ref_object_maps.iter());
            for parent in parents {
                if !index.contains_key(&parent.parent_triples_map) {
                    return plan_err!(
                        "Triples map '{}' refers to unknown triples map '{}'.",
                        triples_map.id,
                        parent.parent_triples_map
                    );
                }
            }
        }

        Ok(Self {
            triples_maps,
            index,
        })
    }

    pub fn triples_maps(&self) -> &[Arc<TriplesMap>] {
        &self.triples_maps
    }

    /// Looks up a triples map by id.
    pub fn triples_map(&self, id: &str) -> Option<&Arc<TriplesMap>> {
        self.index.get(id).map(|position| &self.triples_maps[*position])
    }
}
