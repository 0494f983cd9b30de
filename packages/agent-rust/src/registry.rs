use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use rmi_core::Value;

use crate::profile::Profile;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Positional and keyword arguments for a constructor or a method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub args: Vec<Value>,
    pub kws: BTreeMap<String, Value>,
}

impl Arguments {
    #[must_use]
    pub fn new(args: Vec<Value>, kws: BTreeMap<String, Value>) -> Self {
        Self { args, kws }
    }

    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    #[must_use]
    pub fn keyword(&self, name: &str) -> Option<&Value> {
        self.kws.get(name)
    }

    /// The injected process profile, present on every method call.
    #[must_use]
    pub fn profile(&self) -> Option<&Value> {
        self.kws.get(Profile::KEYWORD)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kws.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Invokable trait
// ---------------------------------------------------------------------------

/// An object whose methods can be called by name.
///
/// Instances are constructed per request by a [`ClassFactory`] and dropped once
/// the call returns.
#[async_trait]
pub trait Invokable: Send + Sync {
    /// Whether `method` names a callable method on this instance.
    fn responds_to(&self, method: &str) -> bool;

    /// Invoke `method`. Only called after `responds_to(method)` returned `true`.
    async fn invoke(&self, method: &str, arguments: Arguments) -> anyhow::Result<Value>;
}

// ---------------------------------------------------------------------------
// ClassFactory trait
// ---------------------------------------------------------------------------

/// Constructs [`Invokable`] instances from constructor arguments.
pub trait ClassFactory: Send + Sync {
    /// Build a new instance. Errors are reported to the caller as application failures.
    fn construct(&self, arguments: Arguments) -> anyhow::Result<Box<dyn Invokable>>;
}

impl<F> ClassFactory for F
where
    F: Fn(Arguments) -> anyhow::Result<Box<dyn Invokable>> + Send + Sync,
{
    fn construct(&self, arguments: Arguments) -> anyhow::Result<Box<dyn Invokable>> {
        self(arguments)
    }
}

// ---------------------------------------------------------------------------
// ClassRegistry
// ---------------------------------------------------------------------------

/// Name-to-factory table consulted when resolving a request's `classname`.
///
/// Registration may happen concurrently with lookups; re-registering a name
/// replaces the previous factory.
pub struct ClassRegistry {
    classes: DashMap<String, Arc<dyn ClassFactory>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: DashMap::new(),
        }
    }

    /// Register a factory under `name`.
    pub fn register(&self, name: impl Into<String>, factory: impl ClassFactory + 'static) {
        self.classes.insert(name.into(), Arc::new(factory));
    }

    /// Register a type that takes no constructor arguments.
    ///
    /// Construction with any positional or keyword arguments fails.
    pub fn register_default<T>(&self, name: impl Into<String>)
    where
        T: Invokable + Default + 'static,
    {
        let name = name.into();
        let class = name.clone();
        self.register(name, move |arguments: Arguments| {
            if !arguments.is_empty() {
                anyhow::bail!("{class}() takes no arguments");
            }
            Ok(Box::new(T::default()) as Box<dyn Invokable>)
        });
    }

    /// Retrieve the factory registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ClassFactory>> {
        self.classes.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registered class names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
