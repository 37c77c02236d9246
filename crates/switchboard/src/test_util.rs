//! Recording fakes for the transport boundary

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use hashbrown::HashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, InteractionId, MessageId, UserId};

use crate::{
    completion::Completion,
    component::ComponentContext,
    dispatch::{Core, Dispatcher, DispatcherBuilder, ErrorSink},
    interaction::{
        CommandData, CommandKind, CommandOption, CommandOptions, ComponentData, Interaction,
        InteractionData, ModalData, User,
    },
    modal::ModalContext,
    response::{Component, MessageBody, MessageRef, Parts, Responder, Response, ResponseState},
    transport::{
        ChannelInfo, ChannelKind, GuildInfo, StateLookup, Transport, TransportError,
    },
};

/// A transport request recorded by [`MockTransport`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateResponse(Response),
    EditResponse(MessageBody),
    DeleteResponse,
    CreateFollowup(MessageBody),
    EditFollowup(MessageId, MessageBody),
    DeleteFollowup(MessageId),
    EditComponents(MessageRef, Vec<Component>),
    Autocomplete(Vec<Completion>),
}

#[derive(Debug)]
pub(crate) struct MockTransport {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<VecDeque<TransportError>>,
    channels: Mutex<HashMap<ChannelId, ChannelKind>>,
    next_id: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            failures: Mutex::default(),
            channels: Mutex::default(),
            next_id: AtomicU64::new(1000),
        }
    }
}

impl MockTransport {
    pub(crate) fn calls(&self) -> Vec<Call> { self.calls.lock().clone() }

    /// Make the next transport request fail with `err` without recording it
    pub(crate) fn fail_next(&self, err: TransportError) { self.failures.lock().push_back(err); }

    pub(crate) fn set_channel(&self, id: ChannelId, kind: ChannelKind) {
        self.channels.lock().insert(id, kind);
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        if let Some(err) = self.failures.lock().pop_front() {
            return Err(err);
        }
        self.calls.lock().push(call);
        Ok(())
    }

    fn message(&self, int: &Interaction) -> MessageRef {
        MessageRef {
            channel_id: int.channel_id,
            id: MessageId::new(self.next_id.fetch_add(1, Ordering::Relaxed)),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn create_response(&self, _: &Interaction, res: Response) -> Result<(), TransportError> {
        self.record(Call::CreateResponse(res))
    }

    async fn edit_response(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        self.record(Call::EditResponse(body))?;
        Ok(self.message(int))
    }

    async fn delete_response(&self, _: &Interaction) -> Result<(), TransportError> {
        self.record(Call::DeleteResponse)
    }

    async fn create_followup(
        &self,
        int: &Interaction,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        self.record(Call::CreateFollowup(body))?;
        Ok(self.message(int))
    }

    async fn edit_followup(
        &self,
        int: &Interaction,
        id: MessageId,
        body: MessageBody,
    ) -> Result<MessageRef, TransportError> {
        self.record(Call::EditFollowup(id, body))?;
        Ok(MessageRef {
            channel_id: int.channel_id,
            id,
        })
    }

    async fn delete_followup(&self, _: &Interaction, id: MessageId) -> Result<(), TransportError> {
        self.record(Call::DeleteFollowup(id))
    }

    async fn edit_message_components(
        &self,
        msg: MessageRef,
        components: Vec<Component>,
    ) -> Result<(), TransportError> {
        self.record(Call::EditComponents(msg, components))
    }

    async fn autocomplete(
        &self,
        _: &Interaction,
        choices: Vec<Completion>,
    ) -> Result<(), TransportError> {
        self.record(Call::Autocomplete(choices))
    }
}

#[async_trait::async_trait]
impl StateLookup for MockTransport {
    async fn channel(&self, id: ChannelId) -> Result<ChannelInfo, TransportError> {
        let kind = self
            .channels
            .lock()
            .get(&id)
            .copied()
            .unwrap_or(ChannelKind::Guild);
        Ok(ChannelInfo {
            id,
            name: (kind == ChannelKind::Guild).then(|| "general".into()),
            kind,
        })
    }

    async fn guild(&self, id: GuildId) -> Result<GuildInfo, TransportError> {
        Ok(GuildInfo {
            id,
            name: "Test Guild".into(),
        })
    }
}

/// An error sink that keeps a rendered copy of everything it receives
#[derive(Debug, Default)]
pub(crate) struct RecordingSink(Mutex<Vec<String>>);

impl RecordingSink {
    pub(crate) fn errors(&self) -> Vec<String> { self.0.lock().clone() }
}

impl ErrorSink for RecordingSink {
    fn system_error(&self, err: &anyhow::Error) { self.0.lock().push(format!("system: {err}")); }

    fn command_error(&self, _: &Interaction, command: &str, err: &anyhow::Error) {
        self.0.lock().push(format!("command {command}: {err}"));
    }

    fn event_error(&self, _: &Interaction, err: &anyhow::Error) {
        self.0.lock().push(format!("event: {err}"));
    }
}

const GUILD_CHANNEL: u64 = 20;
const DM_CHANNEL: u64 = 21;

pub(crate) fn user() -> User {
    User {
        id: UserId::new(10),
        name: "tester".into(),
    }
}

fn interaction(guild: bool, data: InteractionData) -> Interaction {
    let (channel, guild) = if guild {
        (GUILD_CHANNEL, Some(GuildId::new(30)))
    } else {
        (DM_CHANNEL, None)
    };
    Interaction::new(
        InteractionId::new(1),
        user(),
        ChannelId::new(channel),
        guild,
        data,
    )
}

fn command_data(name: &str, options: Option<CommandOptions>) -> CommandData {
    CommandData {
        name: name.into(),
        kind: CommandKind::Slash,
        options: options.unwrap_or_default(),
    }
}

pub(crate) fn command(name: &str, options: Option<CommandOptions>) -> Interaction {
    interaction(true, InteractionData::Command(command_data(name, options)))
}

pub(crate) fn dm_command(name: &str) -> Interaction {
    interaction(false, InteractionData::Command(command_data(name, None)))
}

pub(crate) fn autocomplete(name: &str, options: Vec<CommandOption>) -> Interaction {
    interaction(
        true,
        InteractionData::Autocomplete(command_data(name, Some(CommandOptions(options)))),
    )
}

pub(crate) fn message_ref(n: u64) -> MessageRef {
    MessageRef {
        channel_id: ChannelId::new(GUILD_CHANNEL),
        id: MessageId::new(n),
    }
}

pub(crate) fn component_on(custom_id: &str, message: MessageRef) -> Interaction {
    interaction(
        true,
        InteractionData::Component(ComponentData {
            custom_id: custom_id.into(),
            values: vec![],
            message,
        }),
    )
}

pub(crate) fn component(custom_id: &str) -> Interaction { component_on(custom_id, message_ref(1)) }

pub(crate) fn modal_submit(custom_id: &str, components: Vec<Component>) -> Interaction {
    interaction(
        true,
        InteractionData::Modal(ModalData {
            custom_id: custom_id.into(),
            components,
        }),
    )
}

pub(crate) fn core() -> (Arc<Core>, Arc<MockTransport>) {
    let tx = Arc::new(MockTransport::default());
    (DispatcherBuilder::new(Arc::clone(&tx)).core(), tx)
}

pub(crate) fn dispatcher() -> (Dispatcher, Arc<MockTransport>, Arc<RecordingSink>) {
    let tx = Arc::new(MockTransport::default());
    let sink = Arc::new(RecordingSink::default());
    let disp = DispatcherBuilder::new(Arc::clone(&tx))
        .sink(Arc::clone(&sink) as Arc<dyn ErrorSink>)
        .build();
    (disp, tx, sink)
}

pub(crate) fn component_at(core: &Arc<Core>, custom_id: &str, msg: MessageRef) -> ComponentContext {
    ComponentContext::new(Arc::clone(core), Arc::new(component_on(custom_id, msg)))
}

pub(crate) fn modal_context(
    core: &Arc<Core>,
    custom_id: &str,
    components: Vec<Component>,
) -> ModalContext {
    ModalContext::new(
        Arc::clone(core),
        Arc::new(modal_submit(custom_id, components)),
    )
}

/// A bare responder over a command interaction
#[derive(Debug)]
pub(crate) struct TestResponder {
    core: Arc<Core>,
    int: Arc<Interaction>,
    state: ResponseState,
}

impl TestResponder {
    pub(crate) fn command(core: &Arc<Core>, name: &str) -> Self {
        Self {
            core: Arc::clone(core),
            int: Arc::new(command(name, None)),
            state: ResponseState::default(),
        }
    }
}

impl Responder for TestResponder {
    fn parts(&mut self) -> Parts<'_> {
        Parts {
            core: &self.core,
            int: &self.int,
            state: &mut self.state,
        }
    }

    fn state(&self) -> &ResponseState { &self.state }
}
