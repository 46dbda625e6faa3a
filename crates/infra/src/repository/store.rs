use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ami_core::{DomainError, DomainResult, Entity, ExpectedVersion, Versioned};

/// Row storage for one entity type.
///
/// Mutations run their closure under the store's write lock, so a
/// read-check-modify sequence is atomic per row. A closure error leaves the
/// row untouched.
pub trait EntityStore<V: Entity>: Send + Sync {
    fn get(&self, id: &V::Id) -> DomainResult<Option<V>>;

    /// Insert a new row at version 1. Conflict when the id is taken.
    fn insert(&self, value: V) -> DomainResult<V>;

    /// Apply `f` to the stored row and bump its version. `Ok(None)` when the
    /// row does not exist.
    fn modify(
        &self,
        id: &V::Id,
        expected: ExpectedVersion,
        f: &mut dyn FnMut(&mut V) -> DomainResult<()>,
    ) -> DomainResult<Option<V>>;

    /// Remove the row if `check` accepts it. `Ok(None)` when the row does not exist.
    fn remove(&self, id: &V::Id, check: &dyn Fn(&V) -> DomainResult<()>) -> DomainResult<Option<V>>;

    /// Every row matching `filter`, in unspecified order.
    fn scan(&self, filter: &dyn Fn(&V) -> bool) -> DomainResult<Vec<V>>;
}

impl<V, S> EntityStore<V> for Arc<S>
where
    V: Entity,
    S: EntityStore<V> + ?Sized,
{
    fn get(&self, id: &V::Id) -> DomainResult<Option<V>> {
        (**self).get(id)
    }

    fn insert(&self, value: V) -> DomainResult<V> {
        (**self).insert(value)
    }

    fn modify(
        &self,
        id: &V::Id,
        expected: ExpectedVersion,
        f: &mut dyn FnMut(&mut V) -> DomainResult<()>,
    ) -> DomainResult<Option<V>> {
        (**self).modify(id, expected, f)
    }

    fn remove(&self, id: &V::Id, check: &dyn Fn(&V) -> DomainResult<()>) -> DomainResult<Option<V>> {
        (**self).remove(id, check)
    }

    fn scan(&self, filter: &dyn Fn(&V) -> bool) -> DomainResult<Vec<V>> {
        (**self).scan(filter)
    }
}

/// In-memory store for tests/dev.
#[derive(Debug)]
pub struct InMemoryEntityStore<V: Entity> {
    inner: RwLock<HashMap<V::Id, V>>,
}

impl<V: Entity> InMemoryEntityStore<V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl<V: Entity> Default for InMemoryEntityStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> DomainError {
    DomainError::invariant("entity store lock poisoned")
}

impl<V> EntityStore<V> for InMemoryEntityStore<V>
where
    V: Entity + Versioned + Clone + Send + Sync + 'static,
    V::Id: Send + Sync,
{
    fn get(&self, id: &V::Id) -> DomainResult<Option<V>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(id).cloned())
    }

    fn insert(&self, mut value: V) -> DomainResult<V> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let id = *value.id();
        if map.contains_key(&id) {
            return Err(DomainError::conflict(format!("{} {id} already exists", V::KIND)));
        }
        value.set_version(1);
        map.insert(id, value.clone());
        Ok(value)
    }

    fn modify(
        &self,
        id: &V::Id,
        expected: ExpectedVersion,
        f: &mut dyn FnMut(&mut V) -> DomainResult<()>,
    ) -> DomainResult<Option<V>> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(stored) = map.get_mut(id) else {
            return Ok(None);
        };
        expected.check(stored.version())?;

        let mut next = stored.clone();
        f(&mut next)?;
        next.set_version(stored.version() + 1);
        *stored = next.clone();
        Ok(Some(next))
    }

    fn remove(&self, id: &V::Id, check: &dyn Fn(&V) -> DomainResult<()>) -> DomainResult<Option<V>> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get(id) {
            None => Ok(None),
            Some(row) => {
                check(row)?;
                Ok(map.remove(id))
            }
        }
    }

    fn scan(&self, filter: &dyn Fn(&V) -> bool) -> DomainResult<Vec<V>> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().filter(|v| filter(v)).cloned().collect())
    }
}
