//! Key/value store scoped to one flow.
//!
//! Every flow owns one `ScopedStore`. A sub-flow's store keeps a weak link to
//! the store of the flow that embeds it: reads fall back up that chain, and
//! global writes are republished to every ancestor under a key qualified by
//! the names of the scopes crossed.

use crate::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

/// Joins a scope name and a key when a value is republished to an ancestor
pub const QUALIFIED_KEY_SEPARATOR: &str = "-";

#[derive(Debug)]
pub struct ScopedStore {
    name: String,
    values: RwLock<HashMap<String, Value>>,
    parent: Option<Weak<ScopedStore>>,
}

impl ScopedStore {
    /// Store of a top-level flow
    pub fn root(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            values: RwLock::new(HashMap::new()),
            parent: None,
        })
    }

    /// Store of a sub-flow embedded in the flow owning `parent`
    pub fn child(name: impl Into<String>, parent: &Arc<ScopedStore>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            values: RwLock::new(HashMap::new()),
            parent: Some(Arc::downgrade(parent)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this store belongs to a sub-flow
    pub fn is_scoped(&self) -> bool {
        self.parent.is_some()
    }

    /// Enclosing store, if it is still alive
    pub fn parent(&self) -> Option<Arc<ScopedStore>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Write into this store only. Empty keys are ignored.
    pub async fn set_local(&self, key: &str, value: Value) {
        if key.is_empty() {
            return;
        }
        self.values.write().await.insert(key.to_string(), value);
    }

    /// Read from this store only
    pub async fn get_local(&self, key: &str) -> Option<Value> {
        self.values.read().await.get(key).cloned()
    }

    /// Read from this store, falling back to each enclosing store in turn
    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.get_local(key).await {
            return Some(value);
        }
        let mut scope = self.parent();
        while let Some(store) = scope {
            if let Some(value) = store.get_local(key).await {
                return Some(value);
            }
            scope = store.parent();
        }
        None
    }

    /// Write locally, then republish to every ancestor.
    ///
    /// Each level up prefixes the key with the name of the scope it came
    /// from, so a value set as `k` in `inner` nested in `outer` lands in the
    /// parent of `outer` as `outer-inner-k`.
    pub async fn set_global(&self, key: &str, value: Value) {
        if key.is_empty() {
            return;
        }
        self.set_local(key, value.clone()).await;

        let mut qualified = key.to_string();
        let mut from = self.name.clone();
        let mut scope = self.parent();
        while let Some(store) = scope {
            qualified = format!("{}{}{}", from, QUALIFIED_KEY_SEPARATOR, qualified);
            tracing::trace!("store {}: republish {} as {}", store.name, key, qualified);
            store.set_local(&qualified, value.clone()).await;
            from = store.name.clone();
            scope = store.parent();
        }
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.values.read().await.contains_key(key)
    }

    /// Copy of the values held locally
    pub async fn snapshot(&self) -> HashMap<String, Value> {
        self.values.read().await.clone()
    }
}
