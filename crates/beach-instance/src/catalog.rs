//! Registry of actor constructors, keyed by actor type name.
//!
//! Replaces `hostmanager.py`'s load-actor-class-by-dotted-path indirection
//! with a compile-time registry: every actor type a worker-instance process
//! can host is registered once, by name, when the process starts, rather
//! than imported dynamically at `start_actor` time. This is a distinct key
//! from `category`, which groups actors in the directory for discovery —
//! two actors of the same registered type can run under different
//! categories, and a category can mix actors of different types.

use std::collections::HashMap;
use std::sync::Arc;

use beach_runtime::Actor;

/// Builds one fresh `Actor` instance for a registered actor name.
pub type ActorConstructor = Arc<dyn Fn() -> Arc<dyn Actor> + Send + Sync>;

/// A name -> constructor table consulted on every `start_actor` request.
#[derive(Clone, Default)]
pub struct ActorCatalog {
    constructors: HashMap<String, ActorConstructor>,
}

impl ActorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the actor type under `actor_name`.
    pub fn register<F>(&mut self, actor_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn Actor> + Send + Sync + 'static,
    {
        self.constructors.insert(actor_name.into(), Arc::new(constructor));
    }

    /// Build a fresh instance of the actor registered under `actor_name`, if any.
    pub fn build(&self, actor_name: &str) -> Option<Arc<dyn Actor>> {
        self.constructors.get(actor_name).map(|ctor| ctor())
    }

    pub fn contains(&self, actor_name: &str) -> bool {
        self.constructors.contains_key(actor_name)
    }

    pub fn actor_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}
