//! Document-wide resources and the resource object pool.
//!
//! All pages share one resources dictionary. Entries that must live in their
//! own indirect objects (font programs, image XObjects, optional content
//! groups) are added to a [`ResourcePool`] and referenced through
//! [`Token::LocalRef`]; the writer rebases those references once it knows
//! where the pool lands in the object numbering.

use crate::object::{Dict, IntoTokens, Token};
use indexmap::IndexMap;

/// One indirect object waiting in the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolObject {
    /// Object body
    pub dict: Dict,
    /// Optional stream payload (unencoded unless `dict` names a filter)
    pub stream: Option<Vec<u8>>,
}

/// Indirect objects owned by the resources dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePool {
    objects: Vec<PoolObject>,
}

impl ResourcePool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object; returns a pool-local reference to it.
    pub fn add(&mut self, dict: Dict, stream: Option<Vec<u8>>) -> Token {
        self.objects.push(PoolObject { dict, stream });
        Token::LocalRef((self.objects.len() - 1) as u32)
    }

    /// Number of pooled objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Pooled objects in insertion order.
    pub fn objects(&self) -> &[PoolObject] {
        &self.objects
    }
}

/// The shared resources dictionary, by category then resource name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    categories: IndexMap<String, IndexMap<String, Vec<Token>>>,
}

impl Resources {
    /// Create an empty resources dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `/category /name value`.
    pub fn insert(&mut self, category: &str, name: &str, value: impl IntoTokens) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string(), value.into_tokens());
    }

    /// Look up a resource.
    pub fn get(&self, category: &str, name: &str) -> Option<&[Token]> {
        self.categories
            .get(category)
            .and_then(|entries| entries.get(name))
            .map(Vec::as_slice)
    }

    /// Whether a resource of that name exists in `category`.
    pub fn contains(&self, category: &str, name: &str) -> bool {
        self.get(category, name).is_some()
    }

    /// Names defined in `category`, in insertion order.
    pub fn names(&self, category: &str) -> Vec<&str> {
        self.categories
            .get(category)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Whether no resources are defined.
    pub fn is_empty(&self) -> bool {
        self.categories.values().all(IndexMap::is_empty)
    }

    /// Build the dictionary; pool-local references stay unresolved.
    pub fn to_dict(&self) -> Dict {
        let mut dict = Dict::new();
        for (category, entries) in &self.categories {
            if entries.is_empty() {
                continue;
            }
            let mut sub = Dict::new();
            for (name, value) in entries {
                sub.insert(name, value.clone());
            }
            dict.insert(category, sub);
        }
        dict
    }
}
