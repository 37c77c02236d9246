//! The inbound interaction model handed to the dispatcher

use std::sync::Arc;

use serenity::model::id::{AttachmentId, ChannelId, GuildId, InteractionId, RoleId, UserId};

use crate::response::{Component, MessageRef};

/// The user who triggered an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// The user's ID
    pub id: UserId,
    /// The user's account name
    pub name: String,
}

/// A single inbound interaction event
///
/// Exactly one of these exists per event received from the transport; the
/// dispatcher shares it between every context created for the event.
#[derive(Debug, Clone)]
pub struct Interaction {
    /// The ID assigned to this interaction by Discord
    pub id: InteractionId,
    /// The invoking user
    pub user: User,
    /// The channel the interaction was triggered from
    pub channel_id: ChannelId,
    /// The guild the interaction was triggered from, if any
    pub guild_id: Option<GuildId>,
    /// The kind-specific payload
    pub data: InteractionData,
    pub(crate) raw: Option<Arc<serenity::model::application::Interaction>>,
}

impl Interaction {
    /// Construct a new interaction with no attached transport payload
    #[must_use]
    pub fn new(
        id: InteractionId,
        user: User,
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
        data: InteractionData,
    ) -> Self {
        Self {
            id,
            user,
            channel_id,
            guild_id,
            data,
            raw: None,
        }
    }

    /// Return the kind tag of this interaction
    #[inline]
    #[must_use]
    pub fn kind(&self) -> InteractionKind {
        match self.data {
            InteractionData::Command(_) => InteractionKind::Command,
            InteractionData::Autocomplete(_) => InteractionKind::Autocomplete,
            InteractionData::Component(_) => InteractionKind::Component,
            InteractionData::Modal(_) => InteractionKind::Modal,
        }
    }
}

/// Discriminant for [`InteractionData`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    /// An application command invocation
    Command,
    /// An autocomplete request for a command option
    Autocomplete,
    /// A message component interaction
    Component,
    /// A modal submission
    Modal,
}

/// The kind-specific payload of an [`Interaction`]
#[derive(Debug, Clone)]
pub enum InteractionData {
    /// An application command invocation
    Command(CommandData),
    /// An autocomplete request for a command option
    Autocomplete(CommandData),
    /// A message component interaction
    Component(ComponentData),
    /// A modal submission
    Modal(ModalData),
}

/// The type of an application command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// A chat-input (slash) command
    #[default]
    Slash,
    /// A user context-menu command
    User,
    /// A message context-menu command
    Message,
}

/// Payload of a command or autocomplete interaction
#[derive(Debug, Clone)]
pub struct CommandData {
    /// The name of the invoked command
    pub name: String,
    /// The type of the invoked command
    pub kind: CommandKind,
    /// The options passed to the command
    pub options: CommandOptions,
}

/// Payload of a component interaction
#[derive(Debug, Clone)]
pub struct ComponentData {
    /// The custom ID of the component interacted with
    pub custom_id: String,
    /// Selected values, for select menus
    pub values: Vec<String>,
    /// The message the component is attached to
    pub message: MessageRef,
}

/// Payload of a modal submission
#[derive(Debug, Clone)]
pub struct ModalData {
    /// The custom ID of the submitted modal
    pub custom_id: String,
    /// The submitted fields, in the same row/leaf shape as they were sent
    pub components: Vec<Component>,
}

/// A list of command options, with lookup helpers
#[derive(Debug, Clone, Default, PartialEq)]
#[repr(transparent)]
pub struct CommandOptions(pub Vec<CommandOption>);

/// The sub-command selected by a command invocation
#[derive(Debug, Clone, Copy)]
pub struct SubCommand<'a> {
    /// The sub-command group, if the sub-command is nested in one
    pub group: Option<&'a str>,
    /// The name of the sub-command
    pub name: &'a str,
    /// The options passed to the sub-command
    pub options: &'a CommandOptions,
}

impl CommandOptions {
    /// Get an option by position
    #[inline]
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&CommandOption> { self.0.get(idx) }

    /// Get an option by name
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&CommandOption> {
        self.0.iter().find(|o| o.name == name)
    }

    /// Iterate over the top-level options
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, CommandOption> { self.0.iter() }

    /// Returns true if no options were passed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Returns the number of top-level options
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Resolve the invoked sub-command, descending through at most one
    /// sub-command group
    #[must_use]
    pub fn sub_command(&self) -> Option<SubCommand<'_>> {
        match self.0.first()? {
            CommandOption {
                name,
                value: OptionValue::SubCommand(options),
            } => Some(SubCommand {
                group: None,
                name,
                options,
            }),
            CommandOption {
                name: group,
                value: OptionValue::SubCommandGroup(inner),
            } => match inner.0.first()? {
                CommandOption {
                    name,
                    value: OptionValue::SubCommand(options),
                } => Some(SubCommand {
                    group: Some(group),
                    name,
                    options,
                }),
                _ => None,
            },
            _ => None,
        }
    }

    /// Walk every option depth-first, including options nested inside
    /// sub-commands and sub-command groups
    pub fn walk(&self) -> impl Iterator<Item = &CommandOption> {
        let mut stk = vec![self.0.iter()];
        std::iter::from_fn(move || loop {
            let it = stk.last_mut()?;
            let Some(next) = it.next() else {
                stk.pop();
                continue;
            };
            if let OptionValue::SubCommand(o) | OptionValue::SubCommandGroup(o) = &next.value {
                stk.push(o.0.iter());
            }
            break Some(next);
        })
    }

    /// Find the option currently being autocompleted, if any
    #[must_use]
    pub fn focused(&self) -> Option<&CommandOption> {
        self.walk()
            .find(|o| matches!(o.value, OptionValue::Focused(_)))
    }
}

impl<'a> IntoIterator for &'a CommandOptions {
    type IntoIter = std::slice::Iter<'a, CommandOption>;
    type Item = &'a CommandOption;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

impl FromIterator<CommandOption> for CommandOptions {
    fn from_iter<T: IntoIterator<Item = CommandOption>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single named command option
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOption {
    /// The option name
    pub name: String,
    /// The option value
    pub value: OptionValue,
}

/// The value of a [`CommandOption`]
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A string value
    String(String),
    /// An integer value
    Integer(i64),
    /// A real number value
    Number(f64),
    /// A boolean value
    Boolean(bool),
    /// A user reference
    User(UserId),
    /// A channel reference
    Channel(ChannelId),
    /// A role reference
    Role(RoleId),
    /// A user or role reference
    Mentionable(u64),
    /// An uploaded attachment
    Attachment(AttachmentId),
    /// A sub-command and its options
    SubCommand(CommandOptions),
    /// A sub-command group and its sub-command
    SubCommandGroup(CommandOptions),
    /// The partial input of the option being autocompleted
    Focused(String),
    /// A value type not understood by this crate
    Unknown,
}

impl CommandOption {
    /// Construct a new option
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, value: OptionValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Read this option as a string, including partial autocomplete input
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            OptionValue::String(s) | OptionValue::Focused(s) => Some(s),
            _ => None,
        }
    }

    /// Read this option as an integer
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            OptionValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Read this option as a real number, widening integers
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            OptionValue::Number(n) => Some(n),
            OptionValue::Integer(i) => Some(i as f64),
            _ => None,
        }
    }

    /// Read this option as a boolean
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            OptionValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Read this option as a user reference
    #[must_use]
    pub fn as_user(&self) -> Option<UserId> {
        match self.value {
            OptionValue::User(u) => Some(u),
            _ => None,
        }
    }

    /// Read this option as a channel reference
    #[must_use]
    pub fn as_channel(&self) -> Option<ChannelId> {
        match self.value {
            OptionValue::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Read this option as a role reference
    #[must_use]
    pub fn as_role(&self) -> Option<RoleId> {
        match self.value {
            OptionValue::Role(r) => Some(r),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CommandOption, CommandOptions, OptionValue};

    fn opts(it: impl IntoIterator<Item = CommandOption>) -> CommandOptions {
        it.into_iter().collect()
    }

    #[test]
    fn sub_command_resolves_through_groups() {
        let plain = opts([CommandOption::new(
            "add",
            OptionValue::SubCommand(opts([CommandOption::new(
                "n",
                OptionValue::Integer(3),
            )])),
        )]);
        let sub = plain.sub_command().unwrap();
        assert_eq!(sub.group, None);
        assert_eq!(sub.name, "add");
        assert_eq!(sub.options.by_name("n").and_then(CommandOption::as_i64), Some(3));

        let grouped = opts([CommandOption::new(
            "math",
            OptionValue::SubCommandGroup(plain.clone()),
        )]);
        let sub = grouped.sub_command().unwrap();
        assert_eq!(sub.group, Some("math"));
        assert_eq!(sub.name, "add");

        let flat = opts([CommandOption::new("n", OptionValue::Integer(1))]);
        assert!(flat.sub_command().is_none());
        assert!(CommandOptions::default().sub_command().is_none());
    }

    #[test]
    fn walk_finds_nested_focus() {
        let options = opts([CommandOption::new(
            "search",
            OptionValue::SubCommand(opts([
                CommandOption::new("limit", OptionValue::Integer(5)),
                CommandOption::new("query", OptionValue::Focused("fo".into())),
            ])),
        )]);

        let names: Vec<_> = options.walk().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["search", "limit", "query"]);

        let focused = options.focused().unwrap();
        assert_eq!(focused.name, "query");
        assert_eq!(focused.as_str(), Some("fo"));
    }
}
