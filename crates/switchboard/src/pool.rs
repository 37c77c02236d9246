//! A small free-list for per-dispatch scratch state

use std::{
    fmt, mem,
    ops::{Deref, DerefMut},
};

use parking_lot::Mutex;

/// State that can be cleared for reuse
pub trait Reset {
    /// Return this value to its freshly-constructed state
    fn reset(&mut self);
}

/// A bounded pool of reusable values
///
/// Values are reset when they are returned, so everything handed out by
/// [`acquire`](Self::acquire) is indistinguishable from a new value.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    max_idle: usize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle.lock().len())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl<T: Default + Reset> Pool<T> {
    /// Construct a new pool retaining at most `max_idle` values
    #[inline]
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Take a value from the pool, creating one if none are idle
    #[must_use]
    pub fn acquire(&self) -> Pooled<'_, T> {
        let item = self.idle.lock().pop().unwrap_or_default();
        Pooled { pool: self, item }
    }

    /// The number of values currently waiting for reuse
    #[must_use]
    pub fn idle(&self) -> usize { self.idle.lock().len() }

    fn release(&self, mut item: T) {
        item.reset();
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }
}

/// A value borrowed from a [`Pool`], returned to it on drop
pub struct Pooled<'a, T: Default + Reset> {
    pool: &'a Pool<T>,
    item: T,
}

impl<'a, T: Default + Reset + fmt::Debug> fmt::Debug for Pooled<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.item.fmt(f) }
}

impl<'a, T: Default + Reset> Deref for Pooled<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T { &self.item }
}

impl<'a, T: Default + Reset> DerefMut for Pooled<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T { &mut self.item }
}

impl<'a, T: Default + Reset> Drop for Pooled<'a, T> {
    fn drop(&mut self) { self.pool.release(mem::take(&mut self.item)); }
}
