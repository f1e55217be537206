//! # State providers: where persisted values come from and go to.
//!
//! The engine never inspects values; it asks a [`StateProvider`] for a
//! snapshot of a named state before writing, and hands parsed values back
//! after loading. [`MemoryState`] is a ready-made provider keeping every
//! state as a `serde_json::Value` behind one `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Source and destination of named state values.
pub trait StateProvider: Send + Sync + 'static {
    /// Returns a deep copy of the current value, taken under the provider's guard.
    fn snapshot(&self, name: &str) -> Result<Value, ProviderError>;

    /// Replaces the current value.
    fn install(&self, name: &str, value: Value) -> Result<(), ProviderError>;

    /// Turns a freshly parsed value into its in-memory form. Identity by default.
    fn reconstruct(&self, name: &str, raw: Value) -> Result<Value, ProviderError> {
        let _ = name;
        Ok(raw)
    }
}

type Reconstructor = Box<dyn Fn(Value) -> Result<Value, ProviderError> + Send + Sync>;

/// In-memory provider backed by a `RwLock<HashMap<String, Value>>`.
///
/// ```rust
/// use serde_json::json;
/// use snapvisor::{MemoryState, StateProvider};
///
/// let state = MemoryState::with_names(["db"]);
/// state.update("db", |v| v["hits"] = json!(1)).unwrap();
/// assert_eq!(state.snapshot("db").unwrap(), json!({"hits": 1}));
/// ```
#[derive(Default)]
pub struct MemoryState {
    values: RwLock<HashMap<String, Value>>,
    reconstructors: HashMap<String, Reconstructor>,
}

impl MemoryState {
    /// Creates an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider holding an empty mapping under each name.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = names
            .into_iter()
            .map(|n| (n.into(), Value::Object(Map::new())))
            .collect();
        Self {
            values: RwLock::new(values),
            reconstructors: HashMap::new(),
        }
    }

    /// Registers a reconstruction hook for one name.
    pub fn with_reconstructor<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ProviderError> + Send + Sync + 'static,
    {
        self.reconstructors.insert(name.into(), Box::new(f));
        self
    }

    /// Current value, if any.
    pub fn get(&self, name: &str) -> Result<Option<Value>, ProviderError> {
        let values = self.values.read().map_err(|_| poisoned(name))?;
        Ok(values.get(name).cloned())
    }

    /// Sets a value, creating the name if needed.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ProviderError> {
        let mut values = self.values.write().map_err(|_| poisoned(name))?;
        values.insert(name.to_string(), value);
        Ok(())
    }

    /// Mutates a value in place under the write guard.
    pub fn update<F>(&self, name: &str, f: F) -> Result<(), ProviderError>
    where
        F: FnOnce(&mut Value),
    {
        let mut values = self.values.write().map_err(|_| poisoned(name))?;
        let value = values.get_mut(name).ok_or_else(|| ProviderError::Unknown {
            name: name.to_string(),
        })?;
        f(value);
        Ok(())
    }
}

fn poisoned(name: &str) -> ProviderError {
    ProviderError::Poisoned {
        name: name.to_string(),
    }
}

impl StateProvider for MemoryState {
    fn snapshot(&self, name: &str) -> Result<Value, ProviderError> {
        self.get(name)?.ok_or_else(|| ProviderError::Unknown {
            name: name.to_string(),
        })
    }

    fn install(&self, name: &str, value: Value) -> Result<(), ProviderError> {
        self.set(name, value)
    }

    fn reconstruct(&self, name: &str, raw: Value) -> Result<Value, ProviderError> {
        match self.reconstructors.get(name) {
            Some(f) => f(raw),
            None => Ok(raw),
        }
    }
}

impl std::fmt::Debug for MemoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut reconstructors: Vec<&String> = self.reconstructors.keys().collect();
        reconstructors.sort();
        f.debug_struct("MemoryState")
            .field("values", &self.values)
            .field("reconstructors", &reconstructors)
            .finish()
    }
}
