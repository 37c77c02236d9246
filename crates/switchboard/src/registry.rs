//! Handler tables keyed by component or modal custom ID
//!
//! Lookups take a read lock and release it before the handler runs, so a
//! handler is free to register or unregister entries (including its own)
//! without deadlocking.  Retirement of one-shot entries happens after the
//! handler reports success, under the write lock.

use std::{
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use futures_util::{future::BoxFuture, FutureExt};
use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::trace;

/// The result of a handler invocation
///
/// `Ok(true)` means the event was consumed, `Ok(false)` means the handler
/// declined it (for example because a guard condition did not hold).
pub type HandlerResult = Result<bool, anyhow::Error>;

/// A type-erased asynchronous event handler
pub type HandlerFn<C> = Arc<dyn Fn(C) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Box an async closure into a [`HandlerFn`]
pub fn handler<C, F, R>(f: F) -> HandlerFn<C>
where
    F: Fn(C) -> R + Send + Sync + 'static,
    R: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// What happens to an entry after its handler consumes an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The entry stays registered
    Persistent,
    /// The entry is removed
    OneShot,
    /// The entry and every other ID in the group are removed together
    OneShotGroup(Arc<[String]>),
}

struct Entry<C> {
    handler: HandlerFn<C>,
    disposition: Disposition,
    generation: u64,
}

impl<C> fmt::Debug for Entry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("disposition", &self.disposition)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// A concurrent map from custom ID to handler
pub struct Registry<C> {
    map: RwLock<HashMap<String, Entry<C>>>,
    generation: AtomicU64,
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("map", &*self.map.read())
            .finish_non_exhaustive()
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }
}

/// Removes a registration when called
#[derive(Debug)]
#[must_use = "dropping an Unregister leaves the handler registered"]
pub struct Unregister<C> {
    registry: Weak<Registry<C>>,
    id: String,
}

impl<C: Send + 'static> Unregister<C> {
    /// Remove the registration this guard was created for
    ///
    /// Does nothing if the entry was already removed.
    pub fn unregister(self) {
        if let Some(reg) = self.registry.upgrade() {
            reg.unregister([&self.id]);
        }
    }
}

impl<C: Send + 'static> Registry<C> {
    /// Construct an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::default() }

    #[inline]
    fn next_generation(&self) -> u64 { self.generation.fetch_add(1, Ordering::Relaxed) }

    /// Register a handler, replacing any existing entry with the same ID
    pub fn register(
        self: &Arc<Self>,
        id: impl Into<String>,
        handler: HandlerFn<C>,
        disposition: Disposition,
    ) -> Unregister<C> {
        let id = id.into();
        let generation = self.next_generation();
        self.map.write().insert(id.clone(), Entry {
            handler,
            disposition,
            generation,
        });

        Unregister {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Register several handlers under a single write lock
    pub fn register_all(&self, entries: impl IntoIterator<Item = (String, HandlerFn<C>, Disposition)>) {
        let mut map = self.map.write();
        for (id, handler, disposition) in entries {
            let generation = self.next_generation();
            map.insert(id, Entry {
                handler,
                disposition,
                generation,
            });
        }
    }

    /// Remove the given IDs, ignoring any that are not registered
    pub fn unregister<S: AsRef<str>>(&self, ids: impl IntoIterator<Item = S>) {
        let mut map = self.map.write();
        for id in ids {
            map.remove(id.as_ref());
        }
    }

    /// Remove the given IDs and run `f` while still holding the write lock
    ///
    /// Used to keep a handler table and the component tree it mirrors in
    /// step.
    pub fn retire_with<S: AsRef<str>, T>(&self, ids: &[S], f: impl FnOnce() -> T) -> T {
        let mut map = self.map.write();
        for id in ids {
            map.remove(id.as_ref());
        }
        f()
    }

    /// Return the handler and disposition registered under `id`
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<(HandlerFn<C>, Disposition)> {
        let map = self.map.read();
        let entry = map.get(id)?;
        Some((Arc::clone(&entry.handler), entry.disposition.clone()))
    }

    /// Returns true if a handler is registered under `id`
    #[must_use]
    pub fn contains(&self, id: &str) -> bool { self.map.read().contains_key(id) }

    /// The number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize { self.map.read().len() }

    /// Returns true if no handlers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }

    /// Invoke the handler registered under `id`, returning `None` if there is
    /// none
    ///
    /// If the handler consumes the event, one-shot entries are retired
    /// according to their [`Disposition`].  A lone one-shot entry is only
    /// removed if it was not replaced while the handler ran.
    pub async fn fire(&self, id: &str, ctx: C) -> Option<HandlerResult> {
        let (handler, disposition, generation) = {
            let map = self.map.read();
            let entry = map.get(id)?;
            (
                Arc::clone(&entry.handler),
                entry.disposition.clone(),
                entry.generation,
            )
        };

        let res = handler(ctx).await;

        if matches!(res, Ok(true)) {
            match disposition {
                Disposition::Persistent => (),
                Disposition::OneShot => {
                    let mut map = self.map.write();
                    if map.get(id).is_some_and(|e| e.generation == generation) {
                        trace!(id, "Retiring one-shot handler");
                        map.remove(id);
                    }
                },
                Disposition::OneShotGroup(ids) => {
                    trace!(id, len = ids.len(), "Retiring one-shot handler group");
                    self.unregister(ids.iter());
                },
            }
        }

        Some(res)
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::{handler, Disposition, HandlerFn, Registry};

    fn counter(hits: &Arc<AtomicUsize>, consume: bool) -> HandlerFn<()> {
        let hits = Arc::clone(hits);
        handler(move |()| {
            hits.fetch_add(1, Ordering::SeqCst);
            async move { Ok(consume) }
        })
    }

    #[tokio::test]
    async fn missing_id_is_ignored() {
        let reg = Registry::<()>::new();
        assert!(reg.fire("nope", ()).await.is_none());
    }

    #[tokio::test]
    async fn persistent_survives() {
        let reg = Registry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _unreg = reg.register("a", counter(&hits, true), Disposition::Persistent);

        assert!(matches!(reg.fire("a", ()).await, Some(Ok(true))));
        assert!(matches!(reg.fire("a", ()).await, Some(Ok(true))));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(reg.contains("a"));
        assert!(matches!(reg.lookup("a"), Some((_, Disposition::Persistent))));
        assert!(reg.lookup("b").is_none());
    }

    #[tokio::test]
    async fn one_shot_retires_only_on_success() {
        let reg = Registry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _unreg = reg.register("a", counter(&hits, false), Disposition::OneShot);

        assert!(matches!(reg.fire("a", ()).await, Some(Ok(false))));
        assert!(reg.contains("a"));

        let _unreg = reg.register("a", counter(&hits, true), Disposition::OneShot);
        assert!(matches!(reg.fire("a", ()).await, Some(Ok(true))));
        assert!(!reg.contains("a"));
        assert!(reg.fire("a", ()).await.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_handler_stays_registered() {
        let reg = Registry::new();
        let _unreg = reg.register(
            "a",
            handler(|()| async { Err(anyhow::anyhow!("boom")) }),
            Disposition::OneShot,
        );

        assert!(matches!(reg.fire("a", ()).await, Some(Err(_))));
        assert!(reg.contains("a"));
    }

    #[tokio::test]
    async fn group_retires_siblings() {
        let reg = Registry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let group: Arc<[String]> = ["a".to_owned(), "b".to_owned()].into();
        reg.register_all(["a", "b"].map(|id| {
            (
                id.to_owned(),
                counter(&hits, true),
                Disposition::OneShotGroup(Arc::clone(&group)),
            )
        }));
        let _unreg = reg.register("c", counter(&hits, true), Disposition::Persistent);

        assert!(matches!(reg.fire("b", ()).await, Some(Ok(true))));
        assert!(reg.fire("a", ()).await.is_none());
        assert!(reg.fire("b", ()).await.is_none());
        assert!(reg.contains("c"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_can_unregister_itself() {
        let reg = Registry::new();
        let weak = Arc::downgrade(&reg);
        let _unreg = reg.register(
            "a",
            handler(move |()| {
                if let Some(reg) = weak.upgrade() {
                    reg.unregister(["a"]);
                }
                async { Ok(false) }
            }),
            Disposition::Persistent,
        );

        assert!(matches!(reg.fire("a", ()).await, Some(Ok(false))));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn replaced_one_shot_is_kept() {
        let reg = Registry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&reg);
        let replacement = counter(&hits, true);
        let _unreg = reg.register(
            "a",
            handler(move |()| {
                if let Some(reg) = weak.upgrade() {
                    let _unreg = reg.register("a", Arc::clone(&replacement), Disposition::OneShot);
                }
                async { Ok(true) }
            }),
            Disposition::OneShot,
        );

        assert!(matches!(reg.fire("a", ()).await, Some(Ok(true))));
        assert!(reg.contains("a"));
        assert!(matches!(reg.fire("a", ()).await, Some(Ok(true))));
        assert!(!reg.contains("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_guard_is_idempotent() {
        let reg = Registry::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let first = reg.register("a", counter(&hits, true), Disposition::Persistent);
        reg.unregister(["a"]);
        first.unregister();
        reg.unregister(["a", "missing"]);
        assert!(reg.is_empty());
    }

    #[test]
    fn unregister_guard_removes_only_its_entry() {
        let reg = Registry::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = reg.register("a", counter(&hits, true), Disposition::Persistent);
        let _b = reg.register("b", counter(&hits, true), Disposition::Persistent);

        a.unregister();

        assert!(!reg.contains("a"));
        assert!(reg.contains("b"));
    }

    #[test]
    fn unregister_guard_outliving_registry_is_inert() {
        let reg = Registry::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let guard = reg.register("a", counter(&hits, true), Disposition::Persistent);
        drop(reg);
        guard.unregister();
    }
}
