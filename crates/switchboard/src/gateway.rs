//! [`Transport`] and [`StateLookup`] on top of a Serenity gateway client

use std::{
    fmt,
    future::Future,
    sync::{Arc, OnceLock},
    time::Duration,
};

use serenity::{
    builder::{
        CreateActionRow, CreateAllowedMentions, CreateAttachment, CreateButton, CreateInputText,
        CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateModal, CreateSelectMenu, CreateSelectMenuKind,
        CreateSelectMenuOption, EditInteractionResponse, EditMessage,
    },
    client::{Context, EventHandler},
    http::Http,
    model::{
        application::{
            ActionRowComponent, CommandData as RawCommandData, CommandDataOption,
            CommandDataOptionValue, CommandType, ComponentInteractionDataKind, InputTextStyle,
            Interaction as RawInteraction,
        },
        channel::{Channel, Message},
        gateway::Ready,
        id::{ChannelId, GuildId, MessageId},
    },
};
use tracing::{debug, info};

use crate::{
    completion::{self, Completion},
    dispatch::Dispatcher,
    interaction::{
        CommandData, CommandKind, CommandOption, CommandOptions, ComponentData, Interaction,
        InteractionData, ModalData, OptionValue, User,
    },
    response::{
        ActionRow, AllowedMentions, Attachment, Button, ButtonKind, Component, MessageBody,
        MessageRef, Modal, Response, SelectMenu, TextInput, TextInputStyle,
    },
    transport::{
        ChannelInfo, ChannelKind, GuildInfo, StateLookup, Transport, TransportError,
    },
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ROWS: usize = 5;
const MAX_BUTTONS: usize = 5;

mod private {
    use serenity::{
        builder::{
            CreateInteractionResponse, CreateInteractionResponseFollowup, EditInteractionResponse,
        },
        http::Http,
        model::{
            application::{CommandInteraction, ComponentInteraction, ModalInteraction},
            channel::Message,
            id::MessageId,
        },
    };

    #[async_trait::async_trait]
    pub trait RawResponder: Sync {
        async fn create_response(
            &self,
            http: &Http,
            res: CreateInteractionResponse,
        ) -> Result<(), serenity::Error>;

        async fn edit_response(
            &self,
            http: &Http,
            res: EditInteractionResponse,
        ) -> Result<Message, serenity::Error>;

        async fn delete_response(&self, http: &Http) -> Result<(), serenity::Error>;

        async fn create_followup(
            &self,
            http: &Http,
            fup: CreateInteractionResponseFollowup,
        ) -> Result<Message, serenity::Error>;

        async fn edit_followup(
            &self,
            http: &Http,
            id: MessageId,
            fup: CreateInteractionResponseFollowup,
        ) -> Result<Message, serenity::Error>;

        async fn delete_followup(&self, http: &Http, id: MessageId) -> Result<(), serenity::Error>;
    }

    macro_rules! raw_responder {
        ($ty:ident) => {
            #[async_trait::async_trait]
            impl RawResponder for $ty {
                #[inline]
                async fn create_response(
                    &self,
                    http: &Http,
                    res: CreateInteractionResponse,
                ) -> Result<(), serenity::Error> {
                    $ty::create_response(self, http, res).await
                }

                #[inline]
                async fn edit_response(
                    &self,
                    http: &Http,
                    res: EditInteractionResponse,
                ) -> Result<Message, serenity::Error> {
                    $ty::edit_response(self, http, res).await
                }

                #[inline]
                async fn delete_response(&self, http: &Http) -> Result<(), serenity::Error> {
                    $ty::delete_response(self, http).await
                }

                #[inline]
                async fn create_followup(
                    &self,
                    http: &Http,
                    fup: CreateInteractionResponseFollowup,
                ) -> Result<Message, serenity::Error> {
                    $ty::create_followup(self, http, fup).await
                }

                #[inline]
                async fn edit_followup(
                    &self,
                    http: &Http,
                    id: MessageId,
                    fup: CreateInteractionResponseFollowup,
                ) -> Result<Message, serenity::Error> {
                    $ty::edit_followup(self, http, id, fup).await
                }

                #[inline]
                async fn delete_followup(
                    &self,
                    http: &Http,
                    id: MessageId,
                ) -> Result<(), serenity::Error> {
                    $ty::delete_followup(self, http, id).await
                }
            }
        };
    }

    raw_responder!(CommandInteraction);
    raw_responder!(ComponentInteraction);
    raw_responder!(ModalInteraction);
}

use private::RawResponder;

trait FoldOpt: Sized {
    #[inline]
    fn fold_opt<T>(self, opt: Option<T>, f: impl FnOnce(Self, T) -> Self) -> Self {
        match opt {
            Some(val) => f(self, val),
            None => self,
        }
    }
}

impl<T> FoldOpt for T {}

// ---- outbound conversions ----

fn button(button: Button) -> CreateButton {
    let Button {
        kind,
        label,
        disabled,
    } = button;

    let builder = match kind {
        ButtonKind::Link(url) => CreateButton::new_link(url.to_string()),
        ButtonKind::Custom { custom_id, style } => CreateButton::new(custom_id).style(style.into()),
    };
    builder.label(label).disabled(disabled)
}

fn menu(menu: SelectMenu) -> CreateSelectMenu {
    let SelectMenu {
        custom_id,
        items,
        placeholder,
        min_values,
        max_values,
        disabled,
    } = menu;

    let options = items
        .into_iter()
        .map(|i| {
            CreateSelectMenuOption::new(i.label, i.value)
                .fold_opt(i.description, CreateSelectMenuOption::description)
                .default_selection(i.default)
        })
        .collect();

    CreateSelectMenu::new(custom_id, CreateSelectMenuKind::String { options })
        .fold_opt(placeholder, CreateSelectMenu::placeholder)
        .min_values(min_values)
        .fold_opt(max_values, CreateSelectMenu::max_values)
        .disabled(disabled)
}

fn text_input(input: TextInput) -> CreateInputText {
    let TextInput {
        custom_id,
        style,
        label,
        min_len,
        max_len,
        required,
        value,
        placeholder,
    } = input;

    let style = match style {
        TextInputStyle::Short => InputTextStyle::Short,
        TextInputStyle::Paragraph => InputTextStyle::Paragraph,
    };

    CreateInputText::new(style, label, custom_id)
        .fold_opt(min_len, CreateInputText::min_length)
        .fold_opt(max_len, CreateInputText::max_length)
        .required(required)
        .fold_opt(value, CreateInputText::value)
        .fold_opt(placeholder, CreateInputText::placeholder)
}

fn row(children: Vec<Component>) -> Result<CreateActionRow, TransportError> {
    let mut children = children.into_iter();
    let Some(first) = children.next() else {
        return Err(TransportError::Layout("Action rows cannot be empty"));
    };

    match first {
        Component::Button(first) => {
            let buttons = std::iter::once(Ok(button(first)))
                .chain(children.map(|c| match c {
                    Component::Button(b) => Ok(button(b)),
                    _ => Err(TransportError::Layout(
                        "Buttons cannot share a row with other components",
                    )),
                }))
                .collect::<Result<Vec<_>, _>>()?;

            if buttons.len() > MAX_BUTTONS {
                return Err(TransportError::Layout("Too many buttons in one row"));
            }

            Ok(CreateActionRow::Buttons(buttons))
        },
        Component::Menu(m) if children.as_slice().is_empty() => Ok(CreateActionRow::SelectMenu(menu(m))),
        Component::TextInput(t) if children.as_slice().is_empty() => {
            Ok(CreateActionRow::InputText(text_input(t)))
        },
        Component::Menu(_) | Component::TextInput(_) => Err(TransportError::Layout(
            "Select menus and text inputs must be alone in their row",
        )),
        Component::Row(_) => Err(TransportError::Layout("Action rows cannot be nested")),
    }
}

fn rows(components: Vec<Component>) -> Result<Vec<CreateActionRow>, TransportError> {
    if components.len() > MAX_ROWS {
        return Err(TransportError::Layout("Too many action rows"));
    }

    components
        .into_iter()
        .map(|c| match c {
            Component::Row(ActionRow(children)) => row(children),
            leaf => row(vec![leaf]),
        })
        .collect()
}

fn allowed_mentions(mentions: AllowedMentions) -> CreateAllowedMentions {
    let AllowedMentions {
        replied_user,
        users,
        roles,
    } = mentions;
    CreateAllowedMentions::new()
        .replied_user(replied_user)
        .users(users)
        .roles(roles)
}

#[inline]
fn attachment(att: Attachment) -> CreateAttachment {
    CreateAttachment::bytes(att.data, att.filename)
}

macro_rules! build_body {
    ($body:expr, $builder:expr, $attach:ident) => {{
        let MessageBody {
            content,
            embeds,
            components,
            attachments,
            mentions,
            tts,
            ephemeral,
        } = $body;

        let builder = $builder
            .fold_opt(content, |b, c| b.content(c))
            .embeds(embeds.into_iter().map(Into::into).collect())
            .fold_opt(components.map(rows).transpose()?, |b, r| b.components(r))
            .fold_opt(mentions, |b, m| b.allowed_mentions(allowed_mentions(m)));
        let builder = attachments
            .into_iter()
            .fold(builder, |b, a| b.$attach(attachment(a)));

        (builder, tts, ephemeral)
    }};
}

fn message(body: MessageBody) -> Result<CreateInteractionResponseMessage, TransportError> {
    let (b, tts, ephemeral) = build_body!(body, CreateInteractionResponseMessage::new(), add_file);
    Ok(b.tts(tts).ephemeral(ephemeral))
}

fn followup(body: MessageBody) -> Result<CreateInteractionResponseFollowup, TransportError> {
    let (b, tts, ephemeral) =
        build_body!(body, CreateInteractionResponseFollowup::new(), add_file);
    Ok(b.tts(tts).ephemeral(ephemeral))
}

fn edit(body: MessageBody) -> Result<EditInteractionResponse, TransportError> {
    let (b, _tts, _ephemeral) = build_body!(body, EditInteractionResponse::new(), new_attachment);
    Ok(b)
}

fn response(res: Response) -> Result<CreateInteractionResponse, TransportError> {
    Ok(match res {
        Response::Message(body) => CreateInteractionResponse::Message(message(body)?),
        Response::Defer { ephemeral } => CreateInteractionResponse::Defer(
            CreateInteractionResponseMessage::new().ephemeral(ephemeral),
        ),
        Response::Update(body) => CreateInteractionResponse::UpdateMessage(message(body)?),
        Response::DeferUpdate => CreateInteractionResponse::Acknowledge,
        Response::Modal(Modal {
            custom_id,
            title,
            components,
        }) => CreateInteractionResponse::Modal(
            CreateModal::new(custom_id, title).components(rows(components)?),
        ),
    })
}

#[inline]
fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        channel_id: msg.channel_id,
        id: msg.id,
    }
}

// ---- inbound conversions ----

fn option_value(value: &CommandDataOptionValue) -> OptionValue {
    match value {
        CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
        CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
        CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
        CommandDataOptionValue::Boolean(b) => OptionValue::Boolean(*b),
        CommandDataOptionValue::User(u) => OptionValue::User(*u),
        CommandDataOptionValue::Channel(c) => OptionValue::Channel(*c),
        CommandDataOptionValue::Role(r) => OptionValue::Role(*r),
        CommandDataOptionValue::Mentionable(m) => OptionValue::Mentionable(m.get()),
        CommandDataOptionValue::Attachment(a) => OptionValue::Attachment(*a),
        CommandDataOptionValue::SubCommand(o) => OptionValue::SubCommand(options(o)),
        CommandDataOptionValue::SubCommandGroup(o) => OptionValue::SubCommandGroup(options(o)),
        CommandDataOptionValue::Autocomplete { value, .. } => OptionValue::Focused(value.clone()),
        _ => OptionValue::Unknown,
    }
}

fn options(opts: &[CommandDataOption]) -> CommandOptions {
    opts.iter()
        .map(|o| CommandOption::new(o.name.clone(), option_value(&o.value)))
        .collect()
}

fn command_data(data: &RawCommandData) -> CommandData {
    CommandData {
        name: data.name.clone(),
        kind: match data.kind {
            CommandType::User => CommandKind::User,
            CommandType::Message => CommandKind::Message,
            _ => CommandKind::Slash,
        },
        options: options(&data.options),
    }
}

fn selected_values(kind: &ComponentInteractionDataKind) -> Vec<String> {
    fn strings<T: ToString>(ids: &[T]) -> Vec<String> { ids.iter().map(ToString::to_string).collect() }

    match kind {
        ComponentInteractionDataKind::StringSelect { values } => values.clone(),
        ComponentInteractionDataKind::UserSelect { values } => strings(values),
        ComponentInteractionDataKind::RoleSelect { values } => strings(values),
        ComponentInteractionDataKind::ChannelSelect { values } => strings(values),
        _ => vec![],
    }
}

fn modal_fields(rows: &[serenity::model::application::ActionRow]) -> Vec<Component> {
    rows.iter()
        .map(|r| {
            Component::Row(ActionRow(
                r.components
                    .iter()
                    .filter_map(|c| match c {
                        ActionRowComponent::InputText(t) => {
                            let value: Option<String> = t.value.clone().into();
                            Some(
                                TextInput {
                                    value,
                                    ..TextInput::short(t.custom_id.clone(), "")
                                }
                                .into(),
                            )
                        },
                        _ => None,
                    })
                    .collect(),
            ))
        })
        .collect()
}

#[inline]
fn user(u: &serenity::model::user::User) -> User {
    User {
        id: u.id,
        name: u.name.clone(),
    }
}

impl Interaction {
    /// Convert an interaction received from the gateway
    ///
    /// Returns `None` for pings and interaction types this crate does not
    /// handle.
    #[must_use]
    pub fn from_serenity(raw: RawInteraction) -> Option<Self> {
        let (id, user, channel_id, guild_id, data) = match raw {
            RawInteraction::Command(ref c) => (
                c.id,
                user(&c.user),
                c.channel_id,
                c.guild_id,
                InteractionData::Command(command_data(&c.data)),
            ),
            RawInteraction::Autocomplete(ref c) => (
                c.id,
                user(&c.user),
                c.channel_id,
                c.guild_id,
                InteractionData::Autocomplete(command_data(&c.data)),
            ),
            RawInteraction::Component(ref c) => (
                c.id,
                user(&c.user),
                c.channel_id,
                c.guild_id,
                InteractionData::Component(ComponentData {
                    custom_id: c.data.custom_id.clone(),
                    values: selected_values(&c.data.kind),
                    message: message_ref(&c.message),
                }),
            ),
            RawInteraction::Modal(ref m) => (
                m.id,
                user(&m.user),
                m.channel_id,
                m.guild_id,
                InteractionData::Modal(ModalData {
                    custom_id: m.data.custom_id.clone(),
                    components: modal_fields(&m.data.components),
                }),
            ),
            _ => return None,
        };

        Some(Self {
            id,
            user,
            channel_id,
            guild_id,
            data,
            raw: Some(Arc::new(raw)),
        })
    }
}

// ---- transport ----

/// A [`Transport`] and [`StateLookup`] talking to Discord over Serenity's
/// HTTP client
///
/// The transport is unusable until [`bind`](Self::bind) is called, which
/// [`GatewayHandler`] does on the first gateway event.
pub struct SerenityTransport {
    http: OnceLock<Arc<Http>>,
    timeout: Duration,
}

impl fmt::Debug for SerenityTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerenityTransport")
            .field("bound", &self.http.get().is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SerenityTransport {
    fn default() -> Self { Self::new(DEFAULT_TIMEOUT) }
}

impl SerenityTransport {
    /// Construct an unbound transport whose requests time out after
    /// `timeout`
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: OnceLock::new(),
            timeout,
        }
    }

    /// Bind this transport to an HTTP client
    ///
    /// Only the first call has any effect.
    pub fn bind(&self, http: &Arc<Http>) {
        if self.http.set(Arc::clone(http)).is_ok() {
            debug!("Transport bound to HTTP client");
        }
    }

    fn http(&self) -> Result<&Http, TransportError> {
        self.http.get().map(|h| &**h).ok_or(TransportError::Unbound)
    }

    async fn run<T>(
        &self,
        fut: impl Future<Output = Result<T, serenity::Error>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(Into::into)
    }
}

fn raw(int: &Interaction) -> Result<&dyn RawResponder, TransportError> {
    match int.raw.as_deref() {
        Some(RawInteraction::Command(c) | RawInteraction::Autocomplete(c)) => Ok(c),
        Some(RawInteraction::Component(c)) => Ok(c),
        Some(RawInteraction::Modal(m)) => Ok(m),
        _ => Err(TransportError::Detached),
    }
}

#[async_trait::async_trait]
impl Transport for SerenityTransport {
    async fn create_response(&self, int: &Interaction, res: Response) -> Result<(), TransportError> {
        let http = self.http()?;
        let res = response(res)?;
        self.run(raw(int)?.create_response(http, res)).await
    }

    async fn edit_response(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        let http = self.http()?;
        let body = edit(body)?;
        let msg = self.run(raw(int)?.edit_response(http, body)).await?;
        Ok(message_ref(&msg))
    }

    async fn delete_response(&self, int: &Interaction) -> Result<(), TransportError> {
        let http = self.http()?;
        self.run(raw(int)?.delete_response(http)).await
    }

    async fn create_followup(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        let http = self.http()?;
        let body = followup(body)?;
        let msg = self.run(raw(int)?.create_followup(http, body)).await?;
        Ok(message_ref(&msg))
    }

    async fn edit_followup(
        &self,
        int: &Interaction,
        id: MessageId,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        let http = self.http()?;
        let body = followup(body)?;
        let msg = self.run(raw(int)?.edit_followup(http, id, body)).await?;
        Ok(message_ref(&msg))
    }

    async fn delete_followup(&self, int: &Interaction, id: MessageId) -> Result<(), TransportError> {
        let http = self.http()?;
        self.run(raw(int)?.delete_followup(http, id)).await
    }

    async fn edit_message_components(
        &self,
        msg: MessageRef,
        components: Vec<Component>,
    ) -> Result<(), TransportError> {
        let http = self.http()?;
        let edit = EditMessage::new().components(rows(components)?);
        self.run(msg.channel_id.edit_message(http, msg.id, edit))
            .await
            .map(|_| ())
    }

    async fn autocomplete(
        &self,
        int: &Interaction,
        choices: Vec<Completion>,
    ) -> Result<(), TransportError> {
        let http = self.http()?;
        let res = CreateInteractionResponse::Autocomplete(completion::build(choices));
        self.run(raw(int)?.create_response(http, res)).await
    }
}

#[async_trait::async_trait]
impl StateLookup for SerenityTransport {
    async fn channel(&self, id: ChannelId) -> Result<ChannelInfo, TransportError> {
        let http = self.http()?;
        let info = match self.run(id.to_channel(http)).await? {
            Channel::Guild(c) => ChannelInfo {
                id,
                name: Some(c.name),
                kind: ChannelKind::Guild,
            },
            Channel::Private(_) => ChannelInfo {
                id,
                name: None,
                kind: ChannelKind::Dm,
            },
            _ => ChannelInfo {
                id,
                name: None,
                kind: ChannelKind::Other,
            },
        };
        Ok(info)
    }

    async fn guild(&self, id: GuildId) -> Result<GuildInfo, TransportError> {
        let http = self.http()?;
        let guild = self.run(id.to_partial_guild(http)).await?;
        Ok(GuildInfo {
            id,
            name: guild.name,
        })
    }
}

// ---- event handler ----

/// Forwards gateway events to a [`Dispatcher`]
#[derive(Debug)]
pub struct GatewayHandler {
    dispatcher: Arc<Dispatcher>,
    transport: Arc<SerenityTransport>,
}

impl GatewayHandler {
    /// Construct a handler forwarding to `dispatcher`, binding `transport` to
    /// the client it is registered with
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, transport: Arc<SerenityTransport>) -> Self {
        Self {
            dispatcher,
            transport,
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for GatewayHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.transport.bind(&ctx.http);
        info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Gateway session ready"
        );
    }

    async fn interaction_create(&self, ctx: Context, int: RawInteraction) {
        self.transport.bind(&ctx.http);

        let Some(int) = Interaction::from_serenity(int) else {
            debug!("Ignoring unsupported interaction");
            return;
        };
        self.dispatcher.on_event(int).await;
    }
}
