//! Weighted action catalog.
//!
//! Actions are registered on a [`CatalogBuilder`] during setup. `build()`
//! validates the weights and freezes the set into an [`ActionCatalog`], which
//! has no mutating methods and is shared read-only between all users.
//!
//! Selection is a cumulative-weight draw: prefix sums of the weights are
//! computed once, then each draw picks a uniform value in `[0, total)` and
//! binary-searches for its bucket. The cost of a draw depends only on the
//! catalog size.

use rand::rngs::StdRng;
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::intent::RequestIntent;
use crate::state::VirtualUserState;

/// Produces a request for one action invocation.
///
/// Generators may draw from the user's random source and advance its
/// sequence counter. They must not perform I/O.
pub type Generator = Arc<dyn Fn(&mut VirtualUserState, &mut StdRng) -> RequestIntent + Send + Sync>;

/// Immutable definition of one selectable action.
#[derive(Clone)]
pub struct ActionSpec {
    name: String,
    weight: u32,
    generate: Generator,
}

impl ActionSpec {
    pub fn new<F>(name: impl Into<String>, weight: u32, generate: F) -> Self
    where
        F: Fn(&mut VirtualUserState, &mut StdRng) -> RequestIntent + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            weight,
            generate: Arc::new(generate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn generate(&self, state: &mut VirtualUserState, rng: &mut StdRng) -> RequestIntent {
        (self.generate)(state, rng)
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Setup-time registry of actions.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    actions: Vec<ActionSpec>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, spec: ActionSpec) -> Self {
        self.actions.push(spec);
        self
    }

    /// Shorthand for registering an [`ActionSpec::new`].
    pub fn action<F>(self, name: impl Into<String>, weight: u32, generate: F) -> Self
    where
        F: Fn(&mut VirtualUserState, &mut StdRng) -> RequestIntent + Send + Sync + 'static,
    {
        self.register(ActionSpec::new(name, weight, generate))
    }

    /// Validate and freeze the catalog.
    pub fn build(self) -> LoadResult<ActionCatalog> {
        if self.actions.is_empty() {
            return Err(LoadError::EmptyCatalog);
        }

        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.name.as_str()) {
                return Err(LoadError::DuplicateAction(action.name.clone()));
            }
        }

        let mut cumulative = Vec::with_capacity(self.actions.len());
        let mut total: u64 = 0;
        for action in &self.actions {
            total = total
                .checked_add(u64::from(action.weight))
                .ok_or(LoadError::WeightOverflow)?;
            cumulative.push(total);
        }

        if total == 0 {
            return Err(LoadError::ZeroTotalWeight);
        }
        if let Some(action) = self.actions.iter().find(|a| a.weight == 0) {
            return Err(LoadError::ZeroWeight(action.name.clone()));
        }

        Ok(ActionCatalog {
            actions: self.actions,
            cumulative,
            total_weight: total,
        })
    }
}

/// Frozen, validated set of weighted actions.
#[derive(Debug)]
pub struct ActionCatalog {
    actions: Vec<ActionSpec>,
    cumulative: Vec<u64>,
    total_weight: u64,
}

impl ActionCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    /// Weighted draw with replacement.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> &ActionSpec {
        let draw = rng.gen_range(0..self.total_weight);
        // First bucket whose prefix sum exceeds the draw.
        let idx = self.cumulative.partition_point(|&upper| upper <= draw);
        &self.actions[idx]
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false: empty catalogs are rejected by `build()`.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[ActionSpec] {
        &self.actions
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Expected selection frequency of an action.
    pub fn probability(&self, name: &str) -> Option<f64> {
        self.get(name)
            .map(|a| f64::from(a.weight) / self.total_weight as f64)
    }
}
