//! The reply state machine shared by every interaction context
//!
//! # Notes
//!
//! Discord enforces a few rules on the flow of interaction responses:
//! - Exactly one initial response acknowledges an interaction, and it must be
//!   sent within a few seconds of receiving it
//! - Once acknowledged, the edit and delete endpoints refer to the message
//!   created (or updated) by the initial response
//! - Follow-up messages are independent of the initial response and can be
//!   sent at any time
//!
//! Contexts track this with a [`ResponseState`].  The first successful reply
//! flips the `responded` flag; any later message reply is turned into an edit
//! of the original response.  A reply that fails leaves the state untouched,
//! so a context never believes it acknowledged an interaction it did not.
//!
//! ## Valid Responses
//!
//! |                | `Command` | `Component` | `Modal`  |
//! |---------------:|-----------|-------------|----------|
//! |      `Message` | Yes       | Yes         | Yes      |
//! |        `Defer` | Yes       | Yes         | Yes      |
//! |  `DeferUpdate` | **No**    | Yes         | Yes      |
//! |       `Update` | **No**    | Yes         | Yes      |
//! |        `Modal` | Yes       | Yes         | **No**   |
//!
//! Autocomplete interactions only accept a list of choices and never go
//! through this state machine.

mod private {
    use std::sync::Arc;

    use super::ResponseState;
    use crate::{dispatch::Core, interaction::Interaction};

    /// Borrowed view of everything needed to respond to an interaction
    #[derive(Debug)]
    #[doc(hidden)]
    pub struct Parts<'a> {
        pub(crate) core: &'a Arc<Core>,
        pub(crate) int: &'a Arc<Interaction>,
        pub(crate) state: &'a mut ResponseState,
    }

    pub trait Responder: Send {
        fn parts(&mut self) -> Parts<'_>;

        fn state(&self) -> &ResponseState;
    }
}

use std::sync::Arc;

pub(crate) use private::{Parts, Responder};
use tracing::{trace, warn};

use super::{Embed, MessageBody, MessageRef, Response};
use crate::{
    component::{Assembler, ComponentBuilder},
    dispatch::Core,
    interaction::{Interaction, InteractionKind},
    modal::{self, ModalReceiver},
    transport::{Transport, TransportError},
};

/// An error arising from sending an interaction response
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The requested response requires an unacknowledged interaction
    #[error("Interaction has already been responded to")]
    AlreadyResponded,
    /// The requested operation requires an acknowledged interaction
    #[error("Interaction has not been responded to yet")]
    NotResponded,
    /// The response type is not valid for this kind of interaction
    #[error("Response type not valid for {0:?} interaction")]
    Unsupported(InteractionKind),
    /// The transport failed to deliver the request
    #[error("Transport error")]
    Transport(#[from] TransportError),
}

/// Per-interaction reply bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseState {
    responded: bool,
    ephemeral: bool,
}

impl ResponseState {
    /// Whether an initial response has been delivered
    #[inline]
    #[must_use]
    pub fn responded(&self) -> bool { self.responded }

    /// Whether outgoing messages are sent privately
    #[inline]
    #[must_use]
    pub fn ephemeral(&self) -> bool { self.ephemeral }

    #[inline]
    pub(crate) fn set_ephemeral(&mut self, ephemeral: bool) { self.ephemeral = ephemeral; }

    fn check(kind: InteractionKind, res: &Response) -> Result<(), ResponseError> {
        let ok = match (kind, res) {
            (InteractionKind::Autocomplete, _)
            | (InteractionKind::Command, Response::Update(_) | Response::DeferUpdate)
            | (InteractionKind::Modal, Response::Modal(_)) => false,
            (InteractionKind::Command | InteractionKind::Component | InteractionKind::Modal, _) => {
                true
            },
        };

        if ok {
            Ok(())
        } else {
            Err(ResponseError::Unsupported(kind))
        }
    }

    /// Send `res` as the initial response, or as an edit of it if one was
    /// already delivered
    ///
    /// # Errors
    /// Returns an error if the response is not valid for this interaction, or
    /// if the transport fails.  The state is unchanged on error.
    pub(crate) async fn reply(
        &mut self,
        transport: &dyn Transport,
        int: &Interaction,
        res: Response,
    ) -> Result<(), ResponseError> {
        let res = res.with_ephemeral(self.ephemeral);

        if self.responded {
            return match res {
                Response::Message(mut body) | Response::Update(mut body) => {
                    body.tts = false;
                    body.ephemeral = false;
                    transport.edit_response(int, body).await?;
                    Ok(())
                },
                Response::Defer { .. } | Response::DeferUpdate => {
                    trace!("Ignoring deferral of acknowledged interaction");
                    Ok(())
                },
                Response::Modal(_) => Err(ResponseError::AlreadyResponded),
            };
        }

        Self::check(int.kind(), &res)?;

        match transport.create_response(int, res).await {
            Ok(()) => {
                self.responded = true;
                Ok(())
            },
            Err(err) => {
                if err.is_ambiguous() {
                    warn!(
                        %err,
                        "Initial response may or may not have been delivered; \
                         treating interaction as unacknowledged"
                    );
                }
                Err(err.into())
            },
        }
    }
}

/// A follow-up message created by a responder
#[derive(Debug)]
pub struct Followup {
    core: Arc<Core>,
    int: Arc<Interaction>,
    message: MessageRef,
}

impl Followup {
    /// The message this follow-up refers to
    #[inline]
    #[must_use]
    pub fn message(&self) -> MessageRef { self.message }

    /// Replace the contents of this follow-up
    ///
    /// # Errors
    /// Returns an error if the transport fails.
    pub async fn edit(&mut self, body: MessageBody) -> Result<(), ResponseError> {
        self.message = self
            .core
            .transport
            .edit_followup(&self.int, self.message.id, body)
            .await?;
        Ok(())
    }

    /// Delete this follow-up
    ///
    /// # Errors
    /// Returns an error if the transport fails.
    pub async fn delete(self) -> Result<(), ResponseError> {
        self.core
            .transport
            .delete_followup(&self.int, self.message.id)
            .await?;
        Ok(())
    }

    /// Attach interactive components to this follow-up
    #[must_use]
    pub fn components(&self) -> ComponentBuilder {
        ComponentBuilder::new(Arc::clone(&self.core), self.message)
    }
}

/// Reply, edit and follow-up operations for every interaction context
#[async_trait::async_trait]
pub trait Respond: private::Responder {
    /// Whether an initial response has been delivered
    #[inline]
    fn responded(&self) -> bool { self.state().responded() }

    /// Whether outgoing messages are sent privately
    #[inline]
    fn ephemeral(&self) -> bool { self.state().ephemeral() }

    /// Set whether outgoing messages are sent privately
    ///
    /// The flag is read when each message is sent, so it only affects
    /// messages sent after this call.
    #[inline]
    fn set_ephemeral(&mut self, ephemeral: bool) { self.parts().state.set_ephemeral(ephemeral); }

    /// Respond to this interaction, or edit the existing response
    ///
    /// # Errors
    /// Returns an error if the response is not valid in the current state or
    /// the transport fails.
    async fn reply(&mut self, res: Response) -> Result<(), ResponseError> {
        let Parts { core, int, state } = self.parts();
        state.reply(&*core.transport, int, res).await
    }

    /// Respond with a message
    ///
    /// # Errors
    /// See [`reply`](Self::reply).
    #[inline]
    async fn reply_message(&mut self, body: MessageBody) -> Result<(), ResponseError> {
        self.reply(Response::Message(body)).await
    }

    /// Acknowledge this interaction and send a message later
    ///
    /// Does nothing if the interaction was already acknowledged.
    ///
    /// # Errors
    /// See [`reply`](Self::reply).
    #[inline]
    async fn defer(&mut self) -> Result<(), ResponseError> {
        self.reply(Response::Defer { ephemeral: false }).await
    }

    /// Respond with a single embed, using the default color if it has none
    ///
    /// # Errors
    /// See [`reply`](Self::reply).
    async fn respond_embed(&mut self, mut embed: Embed) -> Result<(), ResponseError> {
        embed.color = embed.color.or(Some(self.parts().core.colors.default));
        self.reply(Response::Message(embed.into())).await
    }

    /// Respond with an error embed
    ///
    /// # Errors
    /// See [`reply`](Self::reply).
    async fn respond_error(&mut self, content: &str, title: &str) -> Result<(), ResponseError> {
        let embed = Embed::default()
            .title(title)
            .desc_plain(content)
            .color(self.parts().core.colors.error);
        self.reply(Response::Message(embed.into())).await
    }

    /// Edit the initial response
    ///
    /// # Errors
    /// Returns an error if the interaction has not been acknowledged or the
    /// transport fails.
    async fn edit(&mut self, body: MessageBody) -> Result<MessageRef, ResponseError> {
        let Parts { core, int, state } = self.parts();
        if !state.responded() {
            return Err(ResponseError::NotResponded);
        }
        Ok(core.transport.edit_response(int, body).await?)
    }

    /// Delete the initial response
    ///
    /// # Errors
    /// Returns an error if the interaction has not been acknowledged or the
    /// transport fails.
    async fn delete_response(&mut self) -> Result<(), ResponseError> {
        let Parts { core, int, state } = self.parts();
        if !state.responded() {
            return Err(ResponseError::NotResponded);
        }
        Ok(core.transport.delete_response(int).await?)
    }

    /// Send a follow-up message
    ///
    /// Follow-ups do not acknowledge the interaction, and may be sent whether
    /// or not an initial response was delivered.
    ///
    /// # Errors
    /// Returns an error if the transport fails.
    async fn follow_up(&mut self, mut body: MessageBody) -> Result<Followup, ResponseError> {
        let Parts { core, int, state } = self.parts();
        body.ephemeral |= state.ephemeral();
        let message = core.transport.create_followup(int, body).await?;
        Ok(Followup {
            core: Arc::clone(core),
            int: Arc::clone(int),
            message,
        })
    }

    /// Send a follow-up with a single embed, using the default color if it
    /// has none
    ///
    /// # Errors
    /// See [`follow_up`](Self::follow_up).
    async fn follow_up_embed(&mut self, mut embed: Embed) -> Result<Followup, ResponseError> {
        embed.color = embed.color.or(Some(self.parts().core.colors.default));
        self.follow_up(embed.into()).await
    }

    /// Send a follow-up error embed
    ///
    /// # Errors
    /// See [`follow_up`](Self::follow_up).
    async fn follow_up_error(&mut self, content: &str, title: &str) -> Result<Followup, ResponseError> {
        let embed = Embed::default()
            .title(title)
            .desc_plain(content)
            .color(self.parts().core.colors.error);
        self.follow_up(embed.into()).await
    }

    /// Open a modal dialog built by `build` and wait for its submission
    /// through the returned receiver
    ///
    /// Handlers added to the assembler are ignored; modal fields do not fire
    /// their own events.
    ///
    /// # Errors
    /// Returns an error if the interaction was already acknowledged, is
    /// itself a modal submission, or the transport fails.
    async fn open_modal<F>(&mut self, title: String, build: F) -> Result<ModalReceiver, ResponseError>
    where F: FnOnce(&mut Assembler) + Send {
        modal::open(self.parts(), title, build).await
    }
}

impl<R: private::Responder> Respond for R {}
