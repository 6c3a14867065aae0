//! Name-keyed registry for shared component instances.
//!
//! Circuit breakers and write queues are meant to be constructed once per
//! named dependency and shared by every caller of that dependency. The
//! registry makes that sharing explicit: instances are created at process
//! start (or lazily via [`Registry::get_or_insert_with`]) and handed out by
//! name, instead of living in hidden module-level globals.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A thread-safe container of named `Arc<T>` instances.
///
/// Lookups never suspend; the registry is backed by a `std::sync::RwLock`
/// and is safe to use from both sync and async contexts.
///
/// # Example
///
/// ```rust
/// use orderflow_core::Registry;
///
/// let registry: Registry<String> = Registry::new();
/// let db = registry.get_or_insert_with("database", || "db-handle".to_string());
/// assert_eq!(*db, "db-handle");
/// assert!(registry.get("database").is_some());
/// ```
pub struct Registry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> Registry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the instance registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Returns the instance registered under `name`, constructing and
    /// registering it with `make` if absent.
    ///
    /// If two threads race on the same missing name, only one constructed
    /// instance is kept; both callers receive the same `Arc`.
    pub fn get_or_insert_with<F>(&self, name: &str, make: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let mut entries = self.entries.write().expect("registry lock poisoned");
        Arc::clone(
            entries
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(make())),
        )
    }

    /// Registers `instance` under `name`, returning the previous instance
    /// if one was registered.
    pub fn insert(&self, name: impl Into<String>, instance: T) -> Option<Arc<T>> {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(name.into(), Arc::new(instance))
    }

    /// Removes and returns the instance registered under `name`.
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(name)
    }

    /// Returns the names of all registered instances.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Returns the number of registered instances.
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    /// Returns true if no instances are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}
