//! Thread-safe handle table for server instances.
//!
//! This module provides the arena behind the instance registry: a concurrent
//! map backed by `DashMap` from opaque integer handles to values.
//!
//! # Handle Lifecycle
//!
//! 1. **Insert**: `insert_next` allocates the next handle and stores the value
//! 2. **Get**: look the value up by handle
//! 3. **Remove**: take the value out; its handle is retired for good
//!
//! Handles come from a monotonically increasing counter starting at zero and
//! are never handed out twice, not even after their entry was removed or the
//! table was drained. A stale handle therefore misses instead of aliasing a
//! newer entry.

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Opaque identifier of a registered server instance.
///
/// Always non-negative: negative integers are reserved for error codes at the
/// C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerHandle(i32);

impl ServerHandle {
    /// Interpret a raw boundary integer as a handle.
    ///
    /// Returns `None` for negative values, which can never name an instance.
    pub fn from_raw(raw: i32) -> Option<Self> {
        (raw >= 0).then_some(Self(raw))
    }

    /// The raw integer handed across the boundary.
    pub fn as_raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const MAX_HANDLE: u32 = i32::MAX as u32;

/// Thread-safe handle table with monotonic, never-reused handles.
///
/// # Example
///
/// ```
/// use davhost_core::HandleTable;
///
/// let table: HandleTable<String> = HandleTable::new();
///
/// let first = table.insert_next("a".to_string()).unwrap();
/// let second = table.insert_next("b".to_string()).unwrap();
/// assert_eq!(first.as_raw(), 0);
/// assert_eq!(second.as_raw(), 1);
///
/// assert_eq!(table.remove(first), Some("a".to_string()));
/// let third = table.insert_next("c".to_string()).unwrap();
/// assert_eq!(third.as_raw(), 2);
/// ```
#[derive(Debug)]
pub struct HandleTable<V> {
    /// The handle map.
    handles: DashMap<ServerHandle, V>,
    /// Next handle to allocate. Only ever grows, and passes `i32::MAX` by
    /// exactly one once the range is spent.
    next_id: AtomicU32,
}

impl<V> HandleTable<V> {
    /// Create an empty table whose first handle will be `0`.
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Insert a value under a freshly allocated handle.
    ///
    /// Every handle in `0..=i32::MAX` is issued once. Returns `None` after
    /// that; the counter never wraps, so exhaustion is permanent for this
    /// table.
    pub fn insert_next(&self, value: V) -> Option<ServerHandle> {
        let id = self
            .next_id
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current <= MAX_HANDLE).then_some(current + 1)
            })
            .ok()?;
        let handle = ServerHandle(i32::try_from(id).ok()?);
        self.handles.insert(handle, value);
        Some(handle)
    }

    /// Get a reference to a value by handle.
    ///
    /// The returned guard holds a shard lock; keep it short-lived.
    pub fn get(&self, handle: ServerHandle) -> Option<Ref<'_, ServerHandle, V>> {
        self.handles.get(&handle)
    }

    /// Clone the value out of the table, releasing the shard lock immediately.
    pub fn get_cloned(&self, handle: ServerHandle) -> Option<V>
    where
        V: Clone,
    {
        self.handles.get(&handle).map(|entry| entry.value().clone())
    }

    /// Remove a value by handle and return it. The handle is retired.
    pub fn remove(&self, handle: ServerHandle) -> Option<V> {
        self.handles.remove(&handle).map(|(_, v)| v)
    }

    /// Check if a handle is currently registered.
    pub fn contains(&self, handle: ServerHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    /// Number of registered values.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Snapshot of the registered handles in ascending order.
    pub fn handles(&self) -> Vec<ServerHandle> {
        let mut handles: Vec<_> = self.handles.iter().map(|entry| *entry.key()).collect();
        handles.sort_unstable();
        handles
    }

    /// Remove every value and return them in ascending handle order.
    ///
    /// The allocation counter is left untouched. Values inserted concurrently
    /// with the drain may survive it.
    pub fn drain(&self) -> Vec<(ServerHandle, V)> {
        self.handles()
            .into_iter()
            .filter_map(|handle| self.handles.remove(&handle))
            .collect()
    }
}

impl<V> Default for HandleTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
