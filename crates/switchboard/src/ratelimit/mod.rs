//! Per-user token bucket rate limiting for commands
//!
//! Commands opt in through [`Command::as_limited`](crate::dispatch::Command::as_limited).
//! The [`RateLimit`] middleware takes a token before each limited command and
//! refunds it if the command fails or asks to be skipped with [`skip`].

mod limiter;
mod manager;

use std::{sync::Arc, time::Duration};

pub use limiter::Limiter;
pub use manager::{LimiterKey, LimiterManager, LimiterStore, Scope, SharedLimiter};
use tracing::debug;

use crate::{
    context::Ctx,
    dispatch::{After, Before, Middleware},
    response::Respond,
};

/// Context key holding the [`SharedLimiter`] used for the current command
pub const LIMITER_KEY: &str = "switchboard.ratelimit.limiter";
/// Context key which, when set to `true`, refunds the token taken for the
/// current command
pub const SKIP_KEY: &str = "switchboard.ratelimit.skip";

/// Settings for a rate-limited command
pub trait LimitedCommand: Send + Sync {
    /// The maximum number of invocations available at once
    fn burst(&self) -> u32;

    /// The time taken to restore a single invocation
    fn restoration(&self) -> Duration;

    /// Whether one limiter is shared across every guild, rather than one per
    /// guild
    #[inline]
    fn is_global(&self) -> bool { false }
}

/// Refund the token taken for the current command once it finishes
#[inline]
pub fn skip(ctx: &mut Ctx<'_>) { ctx.set(SKIP_KEY, true); }

/// Middleware enforcing [`LimitedCommand`] settings
#[derive(Debug)]
pub struct RateLimit {
    store: Arc<dyn LimiterStore>,
    force: bool,
}

impl Default for RateLimit {
    fn default() -> Self { Self::new(Arc::new(LimiterManager::new())) }
}

impl RateLimit {
    /// Construct a middleware drawing limiters from `store`
    #[must_use]
    pub fn new(store: Arc<dyn LimiterStore>) -> Self {
        Self {
            store,
            force: false,
        }
    }

    /// Never refund tokens, even for failed or skipped commands
    #[must_use]
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

fn wait_message(wait: Duration) -> String {
    let secs = (wait.as_millis() + 500) / 1000;
    format!("You are being rate limited.\nWait {secs}s until you can use this command again.")
}

impl Middleware for RateLimit {
    fn as_before(&self) -> Option<&dyn Before> { Some(self) }

    fn as_after(&self) -> Option<&dyn After> { Some(self) }
}

#[async_trait::async_trait]
impl Before for RateLimit {
    async fn before(&self, ctx: &mut Ctx<'_>) -> Result<bool, anyhow::Error> {
        let cmd = Arc::clone(ctx.command());
        let Some(limited) = cmd.as_limited() else {
            return Ok(true);
        };

        let int = ctx.interaction();
        let scope = if limited.is_global() {
            Scope::Global
        } else {
            int.guild_id.map_or(Scope::Dm, Scope::Guild)
        };
        let key = LimiterKey {
            command: cmd.name().into(),
            scope,
            user: int.user.id,
        };

        let limiter = self.store.limiter(key, limited);
        let res = limiter.lock().take();
        if let Err(wait) = res {
            debug!(?wait, "Rate limiting command");
            ctx.respond_error(&wait_message(wait), "Rate Limited")
                .await?;
            return Ok(false);
        }

        if !self.force {
            ctx.set(LIMITER_KEY, limiter);
        }

        Ok(true)
    }
}

#[async_trait::async_trait]
impl After for RateLimit {
    async fn after(&self, ctx: &mut Ctx<'_>, err: Option<&anyhow::Error>) -> Result<(), anyhow::Error> {
        if self.force {
            return Ok(());
        }

        let skipped = ctx.get::<bool>(SKIP_KEY).copied().unwrap_or(false);
        if err.is_some() || skipped {
            if let Some(limiter) = ctx.get::<SharedLimiter>(LIMITER_KEY) {
                limiter.lock().restore();
            }
        }

        Ok(())
    }
}
