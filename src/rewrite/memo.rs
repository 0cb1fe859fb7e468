//! Memo tables for rewrite results.
//!
//! A [`Memo`] is either a plain locked map, used when everything runs on one
//! thread, or a concurrent map whose values sit behind a per-key lock so that
//! concurrent callers asking for the same key compute it exactly once and the
//! others wait for that result.
//!
//! ```text
//!   Plain:       Mutex<HashMap<K, V>>              lock only to read/insert
//!   Concurrent:  DashMap<K, Arc<Mutex<Option<V>>>> lock the slot while computing
//! ```
//!
//! Holding a slot lock while computing is safe for tree rewriting because a
//! tree can never contain itself: two workers can only wait on each other if
//! the content graph had a cycle.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

pub(crate) enum Memo<K, V> {
    Plain(Mutex<HashMap<K, V>>),
    Concurrent(DashMap<K, Arc<Mutex<Option<V>>>>),
}

/// A memo lookup result: the value and whether this call computed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Lookup<V> {
    pub value: V,
    pub computed: bool,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn plain() -> Self {
        Self::Plain(Mutex::new(HashMap::new()))
    }

    pub fn concurrent() -> Self {
        Self::Concurrent(DashMap::new())
    }

    pub fn is_concurrent(&self) -> bool {
        matches!(self, Self::Concurrent(_))
    }

    /// Cached value for `key`, if one has been computed.
    pub fn get(&self, key: &K) -> Option<V> {
        match self {
            Self::Plain(map) => map.lock().get(key).cloned(),
            Self::Concurrent(map) => {
                let slot = map.get(key).map(|slot| Arc::clone(&*slot))?;
                let value = slot.lock().clone();
                value
            }
        }
    }

    /// Return the cached value for `key`, computing it with `compute` on a miss.
    ///
    /// A failed computation caches nothing. The plain table never holds its
    /// lock across `compute`, so `compute` may recurse into the same memo.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, compute: F) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        match self {
            Self::Plain(map) => {
                if let Some(value) = map.lock().get(key) {
                    return Ok(Lookup {
                        value: value.clone(),
                        computed: false,
                    });
                }

                let value = compute()?;
                map.lock().insert(key.clone(), value.clone());
                Ok(Lookup { value, computed: true })
            }
            Self::Concurrent(map) => {
                // never hold the shard guard while computing
                let slot = Arc::clone(&*map.entry(key.clone()).or_default());

                let mut guard = slot.lock();
                if let Some(value) = guard.as_ref() {
                    return Ok(Lookup {
                        value: value.clone(),
                        computed: false,
                    });
                }

                let value = compute()?;
                *guard = Some(value.clone());
                Ok(Lookup { value, computed: true })
            }
        }
    }

    /// Number of keys holding a computed value.
    pub fn len(&self) -> usize {
        match self {
            Self::Plain(map) => map.lock().len(),
            Self::Concurrent(map) => map.iter().filter(|slot| slot.value().lock().is_some()).count(),
        }
    }
}
