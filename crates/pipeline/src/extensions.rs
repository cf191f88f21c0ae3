//! Named custom functions referenced from configuration.
//!
//! A `custom` filter names a predicate through `customFn`, a `custom`
//! formatter names a transform through `options.transformFn` and a `custom`
//! aggregate names an aggregator through `customFn`. Names that are not
//! registered here fall back to the documented pass-through (filter,
//! formatter) or `concat` (aggregator) behaviour.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::PipelineResult;

/// Element predicate for the `custom` filter mode.
pub type FilterPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Payload transform for the `custom` formatter.
pub type Transform = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

/// Combination function for the `custom` aggregate strategy.
pub type Aggregator = Arc<dyn Fn(&[PipelineResult]) -> Value + Send + Sync>;

/// Registry of named custom functions, shared read-only through the
/// [`crate::RuntimeContext`].
#[derive(Clone, Default)]
pub struct Extensions {
    predicates: HashMap<String, FilterPredicate>,
    transforms: HashMap<String, Transform>,
    aggregators: HashMap<String, Aggregator>,
}

impl Extensions {
    /// An empty set; every custom reference falls back.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.insert(name.into(), Arc::new(predicate));
        self
    }

    pub fn with_transform(
        mut self,
        name: impl Into<String>,
        transform: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    pub fn with_aggregator(
        mut self,
        name: impl Into<String>,
        aggregator: impl Fn(&[PipelineResult]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.aggregators.insert(name.into(), Arc::new(aggregator));
        self
    }

    pub fn predicate(&self, name: &str) -> Option<&FilterPredicate> {
        self.predicates.get(name)
    }

    pub fn transform(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    pub fn aggregator(&self, name: &str) -> Option<&Aggregator> {
        self.aggregators.get(name)
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut names: Vec<_> = map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }
        f.debug_struct("Extensions")
            .field("predicates", &names(&self.predicates))
            .field("transforms", &names(&self.transforms))
            .field("aggregators", &names(&self.aggregators))
            .finish()
    }
}
