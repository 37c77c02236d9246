use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use tokio::time::Instant;
use tracing::trace;

use super::{LimitedCommand, Limiter};

const SWEEP_INTERVAL: usize = 256;

/// A limiter shared between concurrent invocations
pub type SharedLimiter = Arc<Mutex<Limiter>>;

/// The partition a limiter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared across every guild and direct message channel
    Global,
    /// Direct messages
    Dm,
    /// A single guild
    Guild(GuildId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("__global__"),
            Self::Dm => f.write_str("__dm__"),
            Self::Guild(id) => write!(f, "{id}"),
        }
    }
}

/// Identifies a single limiter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimiterKey {
    /// The command name
    pub command: String,
    /// The partition the limiter applies to
    pub scope: Scope,
    /// The limited user
    pub user: UserId,
}

impl fmt::Display for LimiterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            command,
            scope,
            user,
        } = self;
        write!(f, "{command}:{scope}:{user}")
    }
}

/// A source of limiters
pub trait LimiterStore: fmt::Debug + Send + Sync {
    /// Get the limiter for `key`, creating it from the settings of `cmd` if
    /// it does not exist
    fn limiter(&self, key: LimiterKey, cmd: &dyn LimitedCommand) -> SharedLimiter;
}

/// The default in-memory [`LimiterStore`]
///
/// Limiters are created lazily and evicted once they have been idle long
/// enough to refill completely, at which point a fresh limiter is
/// indistinguishable from the evicted one.
#[derive(Debug, Default)]
pub struct LimiterManager {
    limiters: DashMap<LimiterKey, SharedLimiter>,
    lookups: AtomicUsize,
}

impl LimiterManager {
    /// Construct an empty manager
    #[inline]
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// The number of live limiters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize { self.limiters.len() }

    /// Returns true if there are no live limiters
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.limiters.is_empty() }

    /// Drop every idle limiter, returning how many were removed
    pub fn evict(&self) -> usize {
        let now = Instant::now();
        let before = self.limiters.len();
        self.limiters.retain(|_, l| !l.lock().is_idle(now));
        let removed = before.saturating_sub(self.limiters.len());
        trace!(removed, "Evicted idle limiters");
        removed
    }
}

impl LimiterStore for LimiterManager {
    fn limiter(&self, key: LimiterKey, cmd: &dyn LimitedCommand) -> SharedLimiter {
        if self.lookups.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.evict();
        }

        let lim = self
            .limiters
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Limiter::new(cmd.burst(), cmd.restoration()))));
        Arc::clone(&lim)
    }
}
