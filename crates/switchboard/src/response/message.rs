use serenity::{
    model::id::{ChannelId, MessageId, RoleId, UserId},
    utils::MessageBuilder,
};

use super::{Component, Embed};

/// A handle to a message that has been sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// The channel containing the message
    pub channel_id: ChannelId,
    /// The ID of the message
    pub id: MessageId,
}

impl From<(ChannelId, MessageId)> for MessageRef {
    #[inline]
    fn from((channel_id, id): (ChannelId, MessageId)) -> Self { Self { channel_id, id } }
}

/// Which mentions in a message are allowed to ping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedMentions {
    /// Whether the replied-to user is allowed to be pinged
    pub replied_user: bool,
    /// Users allowed to be pinged
    pub users: Vec<UserId>,
    /// Guild roles allowed to be pinged
    pub roles: Vec<RoleId>,
}

/// A file uploaded alongside a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// The file name shown in the client
    pub filename: String,
    /// The file contents
    pub data: Vec<u8>,
}

/// The body of a message
///
/// The same shape is used for initial replies, edits and follow-ups.  Edits
/// ignore `tts` and `ephemeral`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBody {
    /// Text content
    pub content: Option<String>,
    /// Rich embeds
    pub embeds: Vec<Embed>,
    /// Component rows, or `None` to leave existing components untouched
    pub components: Option<Vec<Component>>,
    /// Uploaded files
    pub attachments: Vec<Attachment>,
    /// Ping permissions, or `None` for the transport default
    pub mentions: Option<AllowedMentions>,
    /// Whether this message should be read by screen readers
    pub tts: bool,
    /// Whether this message should be a private temporary response
    pub ephemeral: bool,
}

impl MessageBody {
    /// Construct a new rich-text message using the given closure
    #[inline]
    pub fn rich(f: impl FnOnce(&mut MessageBuilder) -> &mut MessageBuilder) -> Self {
        let mut content = MessageBuilder::new();
        f(&mut content);
        Self {
            content: Some(content.build()),
            ..Self::default()
        }
    }

    /// Construct a new plaintext message
    #[inline]
    pub fn plain(c: impl Into<serenity::utils::Content>) -> Self {
        Self::rich(|mb| mb.push_safe(c))
    }

    /// Add an embed to this message
    #[must_use]
    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    /// Replace the component rows of this message
    #[must_use]
    pub fn components(mut self, components: Vec<Component>) -> Self {
        self.components = Some(components);
        self
    }

    /// Add a file attachment to this message
    #[must_use]
    pub fn attach(mut self, filename: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachments.push(Attachment {
            filename: filename.into(),
            data,
        });
        self
    }

    /// Set which mentions in this message may ping
    #[must_use]
    pub fn mentions(mut self, mentions: AllowedMentions) -> Self {
        self.mentions = Some(mentions);
        self
    }

    /// Set whether this message should be read by screen readers
    #[must_use]
    pub fn tts(mut self, tts: bool) -> Self {
        self.tts = tts;
        self
    }

    /// Set whether this message should be a private temporary response
    #[must_use]
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }
}

impl From<Embed> for MessageBody {
    fn from(embed: Embed) -> Self { Self::default().embed(embed) }
}

/// A modal dialog
#[derive(Debug, Clone, PartialEq)]
pub struct Modal {
    /// Modal ID for the submission callback
    pub custom_id: String,
    /// Dialog title
    pub title: String,
    /// Rows of text inputs
    pub components: Vec<Component>,
}

/// An initial response to an interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Reply with a new message
    Message(MessageBody),
    /// Acknowledge now and send a message later
    Defer {
        /// Whether the eventual message is private
        ephemeral: bool,
    },
    /// Replace the message a component is attached to
    Update(MessageBody),
    /// Acknowledge a component interaction without changing its message
    DeferUpdate,
    /// Open a modal dialog
    Modal(Modal),
}

impl Response {
    /// Apply the given visibility to this response if it creates a message
    #[must_use]
    pub(crate) fn with_ephemeral(mut self, eph: bool) -> Self {
        match &mut self {
            Self::Message(b) => b.ephemeral |= eph,
            Self::Defer { ephemeral } => *ephemeral |= eph,
            Self::Update(_) | Self::DeferUpdate | Self::Modal(_) => (),
        }
        self
    }

    /// Returns the message body of this response, if any
    #[must_use]
    pub fn body(&self) -> Option<&MessageBody> {
        match self {
            Self::Message(b) | Self::Update(b) => Some(b),
            Self::Defer { .. } | Self::DeferUpdate | Self::Modal(_) => None,
        }
    }
}

impl From<MessageBody> for Response {
    #[inline]
    fn from(body: MessageBody) -> Self { Self::Message(body) }
}

impl From<Modal> for Response {
    #[inline]
    fn from(modal: Modal) -> Self { Self::Modal(modal) }
}
