//! The outbound edge of the dispatcher
//!
//! Everything that talks to Discord goes through a [`Transport`], and every
//! cache or REST lookup of channels and guilds goes through a
//! [`StateLookup`].  [`gateway`](crate::gateway) implements both on top of
//! Serenity; tests substitute recording fakes.

use std::fmt;

use serenity::model::id::{ChannelId, GuildId, MessageId};

use crate::{
    completion::Completion,
    interaction::Interaction,
    response::{Component, MessageBody, MessageRef, Response},
};

/// An error arising from a transport call
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A [`serenity`] (or Discord) error occurred
    #[error("Serenity error")]
    Serenity(#[from] serenity::Error),
    /// The request did not complete in time and may or may not have been
    /// delivered
    #[error("Request timed out")]
    Timeout,
    /// The transport has no connection to send requests over yet
    #[error("Transport is not connected")]
    Unbound,
    /// The interaction was not received through this transport
    #[error("Interaction has no transport payload attached")]
    Detached,
    /// A component tree could not be expressed in the wire format
    #[error("Invalid component layout: {0}")]
    Layout(&'static str),
    /// The request was rejected
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Whether the request may have been delivered despite the error
    #[inline]
    #[must_use]
    pub fn is_ambiguous(&self) -> bool { matches!(self, Self::Timeout) }
}

/// Sends interaction responses and message edits
#[async_trait::async_trait]
pub trait Transport: fmt::Debug + Send + Sync {
    /// Send the initial response to an interaction
    async fn create_response(&self, int: &Interaction, res: Response) -> Result<(), TransportError>;

    /// Edit the message created by the initial response
    async fn edit_response(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError>;

    /// Delete the message created by the initial response
    async fn delete_response(&self, int: &Interaction) -> Result<(), TransportError>;

    /// Send a follow-up message
    async fn create_followup(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError>;

    /// Edit a follow-up message
    async fn edit_followup(
        &self,
        int: &Interaction,
        id: MessageId,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError>;

    /// Delete a follow-up message
    async fn delete_followup(&self, int: &Interaction, id: MessageId) -> Result<(), TransportError>;

    /// Replace the component rows of an existing message
    async fn edit_message_components(
        &self,
        msg: MessageRef,
        components: Vec<Component>,
    ) -> Result<(), TransportError>;

    /// Answer an autocomplete request
    async fn autocomplete(
        &self,
        int: &Interaction,
        choices: Vec<Completion>,
    ) -> Result<(), TransportError>;
}

/// The kind of a channel, as far as dispatch cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A channel belonging to a guild
    Guild,
    /// A one-on-one direct message channel
    Dm,
    /// A group direct message channel
    GroupDm,
    /// Anything else
    Other,
}

impl ChannelKind {
    /// Whether this is a direct message channel of either kind
    #[inline]
    #[must_use]
    pub fn is_dm(self) -> bool { matches!(self, Self::Dm | Self::GroupDm) }
}

/// Information about a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// The channel ID
    pub id: ChannelId,
    /// The channel name, if it has one
    pub name: Option<String>,
    /// The channel kind
    pub kind: ChannelKind,
}

/// Information about a guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    /// The guild ID
    pub id: GuildId,
    /// The guild name
    pub name: String,
}

/// Resolves channels and guilds referenced by interactions
#[async_trait::async_trait]
pub trait StateLookup: fmt::Debug + Send + Sync {
    /// Look up a channel
    async fn channel(&self, id: ChannelId) -> Result<ChannelInfo, TransportError>;

    /// Look up a guild
    async fn guild(&self, id: GuildId) -> Result<GuildInfo, TransportError>;
}
