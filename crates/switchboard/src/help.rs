//! A `help` sub-command for every command that asks for one

use std::sync::Arc;

use tracing::debug;

use crate::{
    context::{Ctx, SubCommandCtx},
    dispatch::{Before, Middleware},
    response::{Embed, Respond},
};

/// A command that describes itself in an embed
pub trait HelpProvider: Send + Sync {
    /// Build the help page for this command
    ///
    /// # Errors
    /// Errors are reported to the dispatcher's error sink, and the command is
    /// not run.
    fn help(&self, ctx: &SubCommandCtx<'_, '_>) -> Result<Embed, anyhow::Error>;
}

/// Middleware answering the help sub-command of [`HelpProvider`] commands
///
/// The command itself never sees the help sub-command.
#[derive(Debug)]
pub struct Help {
    sub_command: String,
}

impl Default for Help {
    fn default() -> Self { Self::new("help") }
}

impl Help {
    /// Construct a middleware answering the sub-command with the given name
    #[must_use]
    pub fn new(sub_command: impl Into<String>) -> Self {
        Self {
            sub_command: sub_command.into(),
        }
    }
}

impl Middleware for Help {
    fn as_before(&self) -> Option<&dyn Before> { Some(self) }
}

#[async_trait::async_trait]
impl Before for Help {
    async fn before(&self, ctx: &mut Ctx<'_>) -> Result<bool, anyhow::Error> {
        let cmd = Arc::clone(ctx.command());
        let Some(provider) = cmd.as_help_provider() else {
            return Ok(true);
        };
        let Some(mut sub) = ctx.sub_command() else {
            return Ok(true);
        };
        if sub.group().is_some() || sub.name() != self.sub_command {
            return Ok(true);
        }

        debug!("Responding with command help");
        let embed = provider.help(&sub)?;
        sub.respond_embed(embed).await?;
        Ok(false)
    }
}
