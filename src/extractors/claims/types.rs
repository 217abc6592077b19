/*
 * Responsibility
 * - Handler から見える「検証済み claims」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 */
use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// Claims decoded as a free-form JSON object.
pub type MapClaims = serde_json::Map<String, serde_json::Value>;

/// Validated claims of the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims<C = MapClaims>(pub C);

impl<C> std::ops::Deref for Claims<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

/// String-keyed values attached to one request.
///
/// Lives in the request extensions; values are shared, so cloning the map is cheap.
#[derive(Clone, Default)]
pub struct Locals(HashMap<String, Arc<dyn Any + Send + Sync>>);

impl Locals {
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.0.insert(key.into(), Arc::new(value));
    }

    /// `None` when the key is absent or holds a value of another type.
    pub fn get<T>(&self, key: &str) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        self.0.get(key).and_then(|value| value.downcast_ref::<T>())
    }
}

impl fmt::Debug for Locals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.0.keys().collect();
        keys.sort();
        f.debug_struct("Locals").field("keys", &keys).finish()
    }
}
