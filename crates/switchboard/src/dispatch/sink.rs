use std::fmt;

use crate::interaction::Interaction;

/// Receives errors that occur while handling events
pub trait ErrorSink: fmt::Debug + Send + Sync {
    /// An error not tied to any interaction
    fn system_error(&self, err: &anyhow::Error);

    /// An error raised while running a command or its middleware
    fn command_error(&self, int: &Interaction, command: &str, err: &anyhow::Error);

    /// An error raised while handling an autocomplete, component or modal
    /// event
    fn event_error(&self, int: &Interaction, err: &anyhow::Error);
}

/// The default sink, which logs every error
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn system_error(&self, err: &anyhow::Error) {
        tracing::error!(?err, "Unexpected error");
    }

    fn command_error(&self, int: &Interaction, command: &str, err: &anyhow::Error) {
        tracing::error!(?err, id = %int.id, user = %int.user.name, command, "Error handling command");
    }

    fn event_error(&self, int: &Interaction, err: &anyhow::Error) {
        tracing::error!(?err, id = %int.id, kind = ?int.kind(), "Error handling interaction");
    }
}
