//! The command trait and its optional capabilities

use std::fmt;

use crate::{
    completion::Completion,
    context::{AutocompleteCtx, Ctx},
    help::HelpProvider,
    interaction::CommandKind,
    ratelimit::LimitedCommand,
};

/// A command that can be dispatched to
///
/// Only [`name`](Self::name) and [`run`](Self::run) are required.  The
/// `as_*` methods expose optional capabilities; a command opts into one by
/// implementing the capability trait and returning `Some(self)`.
#[async_trait::async_trait]
pub trait Command: fmt::Debug + Send + Sync {
    /// The name the command is invoked by
    fn name(&self) -> &str;

    /// A short description of the command
    #[inline]
    fn description(&self) -> &str { "" }

    /// The type of the command
    #[inline]
    fn kind(&self) -> CommandKind { CommandKind::Slash }

    /// Run the command
    ///
    /// Errors returned here are passed to every after-middleware and then to
    /// the dispatcher's error sink.  Commands that want the user to see a
    /// failure should report it themselves, e.g. with
    /// [`respond_error`](crate::response::Respond::respond_error).
    async fn run(&self, ctx: &mut Ctx<'_>) -> Result<(), anyhow::Error>;

    /// Returns `Some` if the command may be run in direct messages
    #[inline]
    fn as_dm_capable(&self) -> Option<&dyn DmCapable> { None }

    /// The response settings applied before any middleware runs
    #[inline]
    fn response_policy(&self) -> Option<ResponsePolicy> { None }

    /// Returns `Some` if the command answers autocomplete requests
    #[inline]
    fn as_autocomplete(&self) -> Option<&dyn Autocomplete> { None }

    /// Returns `Some` if the command is rate limited
    #[inline]
    fn as_limited(&self) -> Option<&dyn LimitedCommand> { None }

    /// Returns `Some` if the command provides its own help page
    #[inline]
    fn as_help_provider(&self) -> Option<&dyn HelpProvider> { None }
}

/// Marker for commands that may be run in direct messages
///
/// Commands without this capability are refused before any middleware runs
/// when invoked outside a guild.
pub trait DmCapable: Send + Sync {}

/// Response settings for a command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponsePolicy {
    /// Send every response privately to the invoking user
    pub ephemeral: bool,
}

/// A command that suggests values for its options while they are typed
#[async_trait::async_trait]
pub trait Autocomplete: Send + Sync {
    /// Produce suggestions for the focused option
    ///
    /// At most 25 suggestions are sent; any beyond that are dropped.
    async fn complete(&self, ctx: &mut AutocompleteCtx<'_>)
        -> Result<Vec<Completion>, anyhow::Error>;
}
