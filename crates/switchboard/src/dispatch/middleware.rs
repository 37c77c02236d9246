//! Hooks run around every command

use std::fmt;

use crate::context::Ctx;

/// A middleware registered with the dispatcher
///
/// A middleware must expose at least one of the two hooks.  Both chains run
/// in registration order.
pub trait Middleware: fmt::Debug + Send + Sync {
    /// Returns `Some` if this middleware runs before commands
    #[inline]
    fn as_before(&self) -> Option<&dyn Before> { None }

    /// Returns `Some` if this middleware runs after commands
    #[inline]
    fn as_after(&self) -> Option<&dyn After> { None }
}

/// A hook run before a command
#[async_trait::async_trait]
pub trait Before: Send + Sync {
    /// Inspect the command about to run
    ///
    /// Returning `Ok(false)` stops the chain: later before-hooks, the command
    /// and every after-hook are skipped.  An error is reported to the error
    /// sink and stops the chain in the same way.
    async fn before(&self, ctx: &mut Ctx<'_>) -> Result<bool, anyhow::Error>;
}

/// A hook run after a command
#[async_trait::async_trait]
pub trait After: Send + Sync {
    /// Inspect the command that just ran, and its error if it failed
    ///
    /// After-hooks all run regardless of earlier failures.
    async fn after(&self, ctx: &mut Ctx<'_>, err: Option<&anyhow::Error>)
        -> Result<(), anyhow::Error>;
}
