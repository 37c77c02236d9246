//! Routing of inbound interactions to commands and registered handlers

mod command;
mod middleware;
mod sink;

use std::{
    any::Any,
    fmt::{self, Write},
    panic::AssertUnwindSafe,
    sync::Arc,
};

use futures_util::FutureExt;
use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

pub use command::{Autocomplete, Command, DmCapable, ResponsePolicy};
pub use middleware::{After, Before, Middleware};
pub use sink::{ErrorSink, TracingSink};

use crate::{
    component::{ComponentBuilder, ComponentContext},
    context::{AutocompleteCtx, Ctx, CtxSlot, ObjectMap, ObjectProvider},
    interaction::{CommandData, CommandKind, Interaction, InteractionData, OptionValue},
    modal::ModalContext,
    pool::Pool,
    registry::Registry,
    response::{MessageRef, Respond},
    transport::{StateLookup, Transport, TransportError},
};

const MAX_IDLE_CONTEXTS: usize = 64;
const MAX_COMPLETIONS: usize = 25;

/// An error arising from registering commands or middleware
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A command reported an empty name
    #[error("Command name cannot be empty")]
    EmptyCommandName,
    /// Two commands share a name
    #[error("Duplicate command {0:?}")]
    DuplicateCommand(String),
    /// A middleware exposes neither a before nor an after hook
    #[error("Middleware {0} has no hooks")]
    InvalidMiddleware(String),
}

/// An error raised by the dispatcher itself while handling an event
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// A command without [`DmCapable`] was invoked in direct messages
    #[error("Command {0:?} cannot be run in direct messages")]
    NotDmCapable(String),
    /// The channel of an interaction could not be resolved
    #[error("Error looking up interaction channel")]
    Lookup(#[source] TransportError),
    /// A handler panicked
    #[error("Panic while handling interaction: {0}")]
    Panic(String),
}

/// Colors used for embeds sent by the response helpers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct EmbedColors {
    /// Color of embeds that do not set their own
    pub default: u32,
    /// Color of error embeds
    pub error: u32,
}

impl Default for EmbedColors {
    fn default() -> Self {
        Self {
            default: 0xFD_D8_35,
            error: 0xF4_43_36,
        }
    }
}

/// Optional dispatcher settings
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Embed colors for the response helpers
    pub embed_colors: EmbedColors,
    /// Fallback for context value lookups
    pub dependency_provider: Option<Arc<dyn ObjectProvider>>,
    /// Receiver for handler errors, [`TracingSink`] if unset
    pub error_sink: Option<Arc<dyn ErrorSink>>,
    /// Channel and guild resolver, the transport itself if unset
    pub state: Option<Arc<dyn StateLookup>>,
}

/// Services shared by the dispatcher and every context it creates
#[derive(Debug)]
pub(crate) struct Core {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) state: Arc<dyn StateLookup>,
    pub(crate) components: Arc<Registry<ComponentContext>>,
    pub(crate) modals: Arc<Registry<ModalContext>>,
    pub(crate) colors: EmbedColors,
    pub(crate) deps: Option<Arc<dyn ObjectProvider>>,
    pub(crate) sink: Arc<dyn ErrorSink>,
}

/// Builder for a [`Dispatcher`]
#[derive(Debug)]
pub struct DispatcherBuilder {
    transport: Arc<dyn Transport>,
    state: Arc<dyn StateLookup>,
    opts: Options,
}

impl DispatcherBuilder {
    /// Start building a dispatcher that talks through `transport`
    ///
    /// The transport also resolves channels and guilds unless
    /// [`state`](Self::state) is called.
    #[must_use]
    pub fn new<T: Transport + StateLookup + 'static>(transport: Arc<T>) -> Self {
        Self {
            state: Arc::clone(&transport) as Arc<dyn StateLookup>,
            transport,
            opts: Options::default(),
        }
    }

    /// Replace every optional setting at once
    #[must_use]
    pub fn options(mut self, opts: Options) -> Self {
        if let Some(ref state) = opts.state {
            self.state = Arc::clone(state);
        }
        self.opts = opts;
        self
    }

    /// Use a separate channel and guild resolver
    #[must_use]
    pub fn state(mut self, state: Arc<dyn StateLookup>) -> Self {
        self.state = state;
        self
    }

    /// Set the embed colors used by the response helpers
    #[must_use]
    pub fn colors(mut self, colors: EmbedColors) -> Self {
        self.opts.embed_colors = colors;
        self
    }

    /// Set the fallback for context value lookups
    #[must_use]
    pub fn deps(mut self, deps: Arc<dyn ObjectProvider>) -> Self {
        self.opts.dependency_provider = Some(deps);
        self
    }

    /// Set the receiver for handler errors
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.opts.error_sink = Some(sink);
        self
    }

    pub(crate) fn core(self) -> Arc<Core> {
        let Self {
            transport,
            state,
            opts:
                Options {
                    embed_colors,
                    dependency_provider,
                    error_sink,
                    state: _,
                },
        } = self;

        Arc::new(Core {
            transport,
            state,
            components: Registry::new(),
            modals: Registry::new(),
            colors: embed_colors,
            deps: dependency_provider,
            sink: error_sink.unwrap_or_else(|| Arc::new(TracingSink)),
        })
    }

    /// Construct the dispatcher
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            core: self.core(),
            commands: RwLock::new(HashMap::new()),
            middlewares: RwLock::new(Vec::new().into()),
            ctx_pool: Pool::new(MAX_IDLE_CONTEXTS),
            complete_pool: Pool::new(MAX_IDLE_CONTEXTS),
        }
    }
}

#[inline]
fn write_string(f: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut s = String::new();
    f(&mut s).unwrap_or_else(|e| unreachable!("{e}"));
    s
}

fn write_value(w: &mut impl Write, val: &OptionValue) -> fmt::Result {
    match val {
        OptionValue::String(s) | OptionValue::Focused(s) => write!(w, "{s:?}"),
        OptionValue::Integer(i) => write!(w, "{i}"),
        OptionValue::Number(f) => write!(w, "{f:.2}"),
        OptionValue::Boolean(b) => write!(w, "{b:?}"),
        OptionValue::User(u) => write!(w, "u:<@{u}>"),
        OptionValue::Channel(c) => write!(w, "<#{c}>"),
        OptionValue::Role(r) => write!(w, "r:<@&{r}>"),
        OptionValue::Mentionable(m) => write!(w, "@{m}"),
        OptionValue::Attachment(a) => write!(w, "<{a}>"),
        OptionValue::SubCommand(_) | OptionValue::SubCommandGroup(_) | OptionValue::Unknown => {
            write!(w, "<???>")
        },
    }
}

fn command_name(w: &mut impl Write, data: &CommandData) -> fmt::Result {
    match data.kind {
        CommandKind::Slash => {
            write!(w, "/{}", data.name)?;

            for opt in data.options.walk() {
                match opt.value {
                    OptionValue::SubCommand(_) | OptionValue::SubCommandGroup(_) => {
                        write!(w, " {}", opt.name)
                    },
                    ref val => {
                        if matches!(val, OptionValue::Focused(_)) {
                            write!(w, " !:{}(", opt.name)
                        } else {
                            write!(w, " {}(", opt.name)
                        }?;
                        write_value(w, val)?;
                        write!(w, ")")
                    },
                }?;
            }
            Ok(())
        },
        CommandKind::User => write!(w, "user::{}", data.name),
        CommandKind::Message => write!(w, "message::{}", data.name),
    }
}

fn interaction_name(int: &Interaction) -> String {
    write_string(|s| match int.data {
        InteractionData::Command(ref d) | InteractionData::Autocomplete(ref d) => {
            command_name(s, d)
        },
        InteractionData::Component(ref d) => write!(s, "component {:?}", d.custom_id),
        InteractionData::Modal(ref d) => write!(s, "modal {:?}", d.custom_id),
    })
}

fn interaction_issuer(int: &Interaction) -> String {
    write_string(|s| {
        write!(s, "@{}", int.user.name)?;
        if let Some(gid) = int.guild_id {
            write!(s, " in guild {gid} ")
        } else {
            write!(s, " in DM ")
        }?;
        write!(s, "<#{}>", int.channel_id)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".into()
    }
}

/// Routes interactions to commands and registered handlers
#[derive(Debug)]
pub struct Dispatcher {
    core: Arc<Core>,
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
    middlewares: RwLock<Arc<[Arc<dyn Middleware>]>>,
    ctx_pool: Pool<CtxSlot>,
    complete_pool: Pool<ObjectMap>,
}

impl Dispatcher {
    /// Shorthand for [`DispatcherBuilder::new`]
    #[inline]
    #[must_use]
    pub fn builder<T: Transport + StateLookup + 'static>(transport: Arc<T>) -> DispatcherBuilder {
        DispatcherBuilder::new(transport)
    }

    /// Register a batch of commands
    ///
    /// # Errors
    /// Returns an error without registering anything if a command has an
    /// empty name, or if a name is repeated within the batch or was already
    /// registered.
    pub fn register_commands(
        &self,
        commands: impl IntoIterator<Item = Arc<dyn Command>>,
    ) -> Result<(), ConfigError> {
        let commands: Vec<_> = commands.into_iter().collect();
        let mut map = self.commands.write();

        {
            let mut seen = HashSet::new();
            for cmd in &commands {
                let name = cmd.name();
                if name.is_empty() {
                    return Err(ConfigError::EmptyCommandName);
                }
                if map.contains_key(name) || !seen.insert(name) {
                    return Err(ConfigError::DuplicateCommand(name.into()));
                }
            }
        }

        for cmd in commands {
            debug!(name = cmd.name(), "Registering command");
            map.insert(cmd.name().into(), cmd);
        }

        Ok(())
    }

    /// Append a batch of middleware to the chain
    ///
    /// # Errors
    /// Returns an error without registering anything if a middleware exposes
    /// neither hook.
    pub fn register_middlewares(
        &self,
        middlewares: impl IntoIterator<Item = Arc<dyn Middleware>>,
    ) -> Result<(), ConfigError> {
        let middlewares: Vec<_> = middlewares.into_iter().collect();

        if let Some(bad) = middlewares
            .iter()
            .find(|m| m.as_before().is_none() && m.as_after().is_none())
        {
            return Err(ConfigError::InvalidMiddleware(format!("{bad:?}")));
        }

        let mut chain = self.middlewares.write();
        *chain = chain.iter().cloned().chain(middlewares).collect();
        Ok(())
    }

    /// Look up a registered command by name
    #[must_use]
    pub fn command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().get(name).cloned()
    }

    /// The registry of live component handlers
    #[inline]
    #[must_use]
    pub fn components(&self) -> &Arc<Registry<ComponentContext>> { &self.core.components }

    /// The registry of pending modal handlers
    #[inline]
    #[must_use]
    pub fn modals(&self) -> &Arc<Registry<ModalContext>> { &self.core.modals }

    /// Attach interactive components to an arbitrary message
    #[must_use]
    pub fn component_builder(&self, message: MessageRef) -> ComponentBuilder {
        ComponentBuilder::new(Arc::clone(&self.core), message)
    }

    /// Report an error not tied to any interaction to the error sink
    pub fn system_error(&self, err: &anyhow::Error) { self.core.sink.system_error(err); }

    /// Handle a single inbound interaction
    ///
    /// Panics raised by handlers are caught and reported to the error sink as
    /// [`DispatchError::Panic`].
    pub async fn on_event(&self, int: Interaction) {
        let int = Arc::new(int);
        let (name, id, issuer) = (
            interaction_name(&int),
            int.id.to_string(),
            interaction_issuer(&int),
        );

        let res = AssertUnwindSafe(async {
            match int.data {
                InteractionData::Command(_) => {
                    self.handle_command(Arc::clone(&int), name, id, issuer)
                        .await;
                },
                InteractionData::Autocomplete(_) => {
                    self.handle_autocomplete(Arc::clone(&int), name, id, issuer)
                        .await;
                },
                InteractionData::Component(_) => {
                    self.handle_component(Arc::clone(&int), name, id, issuer)
                        .await;
                },
                InteractionData::Modal(_) => {
                    self.handle_modal(Arc::clone(&int), name, id, issuer).await;
                },
            }
        })
        .catch_unwind()
        .await;

        if let Err(payload) = res {
            let err = anyhow::Error::new(DispatchError::Panic(panic_message(&*payload)));
            self.core.sink.event_error(&int, &err);
        }
    }

    /// Handle an interaction on a new task
    pub fn spawn(self: &Arc<Self>, int: Interaction) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.on_event(int).await })
    }

    fn resolve_command(&self, data: &CommandData) -> Option<Arc<dyn Command>> {
        let cmd = self.commands.read().get(&data.name).cloned();
        if cmd.is_none() {
            debug!("Ignoring unknown command");
        }
        cmd
    }

    async fn refuse_dm(&self, ctx: &mut Ctx<'_>) -> Result<bool, DispatchError> {
        if ctx.command().as_dm_capable().is_some() || ctx.interaction().guild_id.is_some() {
            return Ok(false);
        }

        let chan = ctx.channel().await.map_err(DispatchError::Lookup)?;
        Ok(chan.kind.is_dm())
    }

    #[tracing::instrument(level = "error", name = "handle_command", skip(self, int))]
    async fn handle_command(&self, int: Arc<Interaction>, name: String, id: String, issuer: String) {
        let InteractionData::Command(ref data) = int.data else {
            unreachable!("Command handler called for non-command interaction")
        };
        let Some(cmd) = self.resolve_command(data) else {
            return;
        };
        info!("Handling command");
        debug!(?cmd, "Command handler selected");

        let sink = &self.core.sink;
        let cmd_name = cmd.name().to_owned();
        let mut ctx = Ctx::new(
            &self.core,
            self.ctx_pool.acquire(),
            Arc::clone(&int),
            Arc::clone(&cmd),
        );

        if let Some(policy) = cmd.response_policy() {
            ctx.set_ephemeral(policy.ephemeral);
        }

        match self.refuse_dm(&mut ctx).await {
            Ok(false) => (),
            Ok(true) => {
                let err = anyhow::Error::new(DispatchError::NotDmCapable(cmd_name.clone()));
                sink.command_error(&int, &cmd_name, &err);
                return;
            },
            Err(err) => {
                sink.command_error(&int, &cmd_name, &err.into());
                return;
            },
        }

        let chain = Arc::clone(&self.middlewares.read());

        for mw in chain.iter() {
            let Some(before) = mw.as_before() else {
                continue;
            };

            match before.before(&mut ctx).await {
                Ok(true) => (),
                Ok(false) => {
                    debug!(?mw, "Middleware declined command");
                    return;
                },
                Err(err) => {
                    sink.command_error(&int, &cmd_name, &err);
                    return;
                },
            }
        }

        let res = cmd.run(&mut ctx).await;
        if let Err(ref err) = res {
            sink.command_error(&int, &cmd_name, err);
        }

        for mw in chain.iter() {
            let Some(after) = mw.as_after() else {
                continue;
            };

            if let Err(err) = after.after(&mut ctx, res.as_ref().err()).await {
                sink.command_error(&int, &cmd_name, &err);
            }
        }

        trace!(responded = ctx.responded(), "Command finished");
    }

    #[tracing::instrument(level = "error", name = "handle_autocomplete", skip(self, int))]
    async fn handle_autocomplete(
        &self,
        int: Arc<Interaction>,
        name: String,
        id: String,
        issuer: String,
    ) {
        let InteractionData::Autocomplete(ref data) = int.data else {
            unreachable!("Autocomplete handler called for non-autocomplete interaction")
        };
        let Some(cmd) = self.resolve_command(data) else {
            return;
        };
        let Some(complete) = cmd.as_autocomplete() else {
            debug!("Command does not support autocomplete");
            return;
        };
        trace!("Handling command autocomplete");

        let mut ctx = AutocompleteCtx::new(&self.core, self.complete_pool.acquire(), Arc::clone(&int));
        let res = complete.complete(&mut ctx).await;
        drop(ctx);
        let mut choices = match res {
            Ok(c) => c,
            Err(err) => {
                self.core.sink.event_error(&int, &err);
                return;
            },
        };

        if choices.len() > MAX_COMPLETIONS {
            warn!(len = choices.len(), "Truncating autocomplete choices");
            choices.truncate(MAX_COMPLETIONS);
        }

        if let Err(err) = self.core.transport.autocomplete(&int, choices).await {
            self.core.sink.event_error(&int, &err.into());
        }
    }

    #[tracing::instrument(level = "error", name = "handle_component", skip(self, int))]
    async fn handle_component(
        &self,
        int: Arc<Interaction>,
        name: String,
        id: String,
        issuer: String,
    ) {
        let InteractionData::Component(ref data) = int.data else {
            unreachable!("Component handler called for non-component interaction")
        };
        info!("Handling message component");

        let ctx = ComponentContext::new(Arc::clone(&self.core), Arc::clone(&int));
        match self.core.components.fire(&data.custom_id, ctx).await {
            None => debug!("Ignoring unknown component"),
            Some(Ok(consumed)) => debug!(consumed, "Component handler finished"),
            Some(Err(err)) => self.core.sink.event_error(&int, &err),
        }
    }

    #[tracing::instrument(level = "error", name = "handle_modal", skip(self, int))]
    async fn handle_modal(&self, int: Arc<Interaction>, name: String, id: String, issuer: String) {
        let InteractionData::Modal(ref data) = int.data else {
            unreachable!("Modal handler called for non-modal interaction")
        };
        info!("Handling modal submit");

        let ctx = ModalContext::new(Arc::clone(&self.core), Arc::clone(&int));
        match self.core.modals.fire(&data.custom_id, ctx).await {
            None => debug!("Ignoring unknown or expired modal"),
            Some(Ok(consumed)) => debug!(consumed, "Modal handler finished"),
            Some(Err(err)) => self.core.sink.event_error(&int, &err),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{
        After, Before, Command, ConfigError, DmCapable, Middleware, ResponsePolicy,
    };
    use crate::{
        completion::Completion,
        context::{AutocompleteCtx, Ctx},
        interaction::{CommandOption, OptionValue},
        response::{Button, MessageBody, Respond, Response},
        test_util::{
            autocomplete, command, component, component_on, dispatcher, dm_command, message_ref,
            modal_submit,
            Call,
        },
        transport::{ChannelKind, TransportError},
    };

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct Echo {
        name: &'static str,
        log: Log,
        fail: bool,
        ephemeral: bool,
        dm: bool,
    }

    impl Echo {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: Arc::clone(log),
                fail: false,
                ephemeral: false,
                dm: false,
            }
        }
    }

    impl DmCapable for Echo {}

    #[async_trait::async_trait]
    impl Command for Echo {
        fn name(&self) -> &str { self.name }

        async fn run(&self, ctx: &mut Ctx<'_>) -> Result<(), anyhow::Error> {
            self.log.lock().push(format!("run {}", self.name));
            ctx.reply_message(MessageBody::plain(self.name)).await?;
            if self.fail {
                anyhow::bail!("{} failed", self.name);
            }
            Ok(())
        }

        fn as_dm_capable(&self) -> Option<&dyn DmCapable> { self.dm.then_some(self as &dyn DmCapable) }

        fn response_policy(&self) -> Option<ResponsePolicy> {
            Some(ResponsePolicy {
                ephemeral: self.ephemeral,
            })
        }

        fn as_autocomplete(&self) -> Option<&dyn super::Autocomplete> { Some(self) }
    }

    #[async_trait::async_trait]
    impl super::Autocomplete for Echo {
        async fn complete(
            &self,
            ctx: &mut AutocompleteCtx<'_>,
        ) -> Result<Vec<Completion>, anyhow::Error> {
            if self.fail {
                anyhow::bail!("{} completion failed", self.name);
            }
            let input = ctx.focused().and_then(CommandOption::as_str).unwrap_or("");
            Ok((0..30).map(|i| Completion::plain(format!("{input}{i}"))).collect())
        }
    }

    #[derive(Debug)]
    struct Hook {
        name: &'static str,
        log: Log,
        allow: bool,
        after: bool,
    }

    impl Hook {
        fn new(name: &'static str, log: &Log, allow: bool) -> Arc<dyn Middleware> {
            Arc::new(Self {
                name,
                log: Arc::clone(log),
                allow,
                after: true,
            })
        }
    }

    impl Middleware for Hook {
        fn as_before(&self) -> Option<&dyn Before> { Some(self) }

        fn as_after(&self) -> Option<&dyn After> { self.after.then_some(self as &dyn After) }
    }

    #[async_trait::async_trait]
    impl Before for Hook {
        async fn before(&self, _: &mut Ctx<'_>) -> Result<bool, anyhow::Error> {
            self.log.lock().push(format!("before {}", self.name));
            Ok(self.allow)
        }
    }

    #[async_trait::async_trait]
    impl After for Hook {
        async fn after(
            &self,
            _: &mut Ctx<'_>,
            err: Option<&anyhow::Error>,
        ) -> Result<(), anyhow::Error> {
            self.log
                .lock()
                .push(format!("after {} {}", self.name, err.is_some()));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct NoHooks;

    impl Middleware for NoHooks {}

    #[test]
    fn registration_is_validated() {
        let (disp, _tx, _sink) = dispatcher();
        let log = Log::default();

        let err = disp
            .register_commands([Arc::new(Echo::new("", &log)) as Arc<dyn Command>])
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommandName));

        let err = disp
            .register_commands([
                Arc::new(Echo::new("a", &log)) as Arc<dyn Command>,
                Arc::new(Echo::new("a", &log)),
            ])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCommand(ref n) if n == "a"));
        assert!(disp.command("a").is_none());

        disp.register_commands([Arc::new(Echo::new("a", &log)) as Arc<dyn Command>])
            .unwrap();
        let err = disp
            .register_commands([Arc::new(Echo::new("a", &log)) as Arc<dyn Command>])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCommand(_)));

        disp.register_commands([
            Arc::new(Echo::new("b", &log)) as Arc<dyn Command>,
            Arc::new(Echo::new("c", &log)),
        ])
        .unwrap();
        assert_eq!(disp.command("b").map(|c| c.name().to_owned()).as_deref(), Some("b"));
        assert!(disp.command("c").is_some());

        let err = disp
            .register_middlewares([Arc::new(NoHooks) as Arc<dyn Middleware>])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMiddleware(_)));
    }

    #[tokio::test]
    async fn declining_middleware_short_circuits() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        disp.register_commands([Arc::new(Echo::new("ping", &log)) as Arc<dyn Command>])
            .unwrap();
        disp.register_middlewares([Hook::new("a", &log, false), Hook::new("b", &log, true)])
            .unwrap();

        disp.on_event(command("ping", None)).await;

        assert_eq!(*log.lock(), ["before a"]);
        assert!(tx.calls().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn after_chain_sees_command_error() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        let mut cmd = Echo::new("ping", &log);
        cmd.fail = true;
        disp.register_commands([Arc::new(cmd) as Arc<dyn Command>])
            .unwrap();
        disp.register_middlewares([Hook::new("a", &log, true), Hook::new("b", &log, true)])
            .unwrap();

        disp.on_event(command("ping", None)).await;

        assert_eq!(*log.lock(), [
            "before a",
            "before b",
            "run ping",
            "after a true",
            "after b true",
        ]);
        assert_eq!(tx.calls().len(), 1);
        assert_eq!(sink.errors(), ["command ping: ping failed"]);
    }

    #[tokio::test]
    async fn dm_restriction_stops_dispatch() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        disp.register_commands([Arc::new(Echo::new("ping", &log)) as Arc<dyn Command>])
            .unwrap();
        disp.register_middlewares([Hook::new("a", &log, true)])
            .unwrap();

        let int = dm_command("ping");
        tx.set_channel(int.channel_id, ChannelKind::Dm);
        disp.on_event(int).await;

        assert!(log.lock().is_empty());
        assert_eq!(sink.errors(), [
            "command ping: Command \"ping\" cannot be run in direct messages"
        ]);
        assert!(tx.calls().is_empty());
    }

    #[tokio::test]
    async fn dm_refusal_is_reported_without_replying() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        disp.register_commands([Arc::new(Echo::new("ping", &log)) as Arc<dyn Command>])
            .unwrap();

        let int = dm_command("ping");
        tx.set_channel(int.channel_id, ChannelKind::Dm);
        tx.fail_next(TransportError::Rejected("unused".into()));
        disp.on_event(int).await;

        assert!(log.lock().is_empty());
        assert!(tx.calls().is_empty());
        assert_eq!(sink.errors(), [
            "command ping: Command \"ping\" cannot be run in direct messages"
        ]);
    }

    #[tokio::test]
    async fn dm_capable_commands_run_in_dms() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        let mut cmd = Echo::new("ping", &log);
        cmd.dm = true;
        disp.register_commands([Arc::new(cmd) as Arc<dyn Command>])
            .unwrap();

        let int = dm_command("ping");
        tx.set_channel(int.channel_id, ChannelKind::Dm);
        disp.on_event(int).await;

        assert_eq!(*log.lock(), ["run ping"]);
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn response_policy_applies_before_run() {
        let (disp, tx, _sink) = dispatcher();
        let log = Log::default();
        let mut cmd = Echo::new("ping", &log);
        cmd.ephemeral = true;
        disp.register_commands([Arc::new(cmd) as Arc<dyn Command>])
            .unwrap();

        disp.on_event(command("ping", None)).await;

        assert_eq!(tx.calls(), [Call::CreateResponse(Response::Message(
            MessageBody::plain("ping").ephemeral(true)
        ))]);
    }

    #[tokio::test]
    async fn unknown_events_are_ignored() {
        let (disp, tx, sink) = dispatcher();

        disp.on_event(command("nope", None)).await;
        disp.on_event(component("nope")).await;
        disp.on_event(modal_submit("nope", vec![])).await;

        assert!(tx.calls().is_empty());
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn panics_are_contained() {
        #[derive(Debug)]
        struct Boom;

        #[async_trait::async_trait]
        impl Command for Boom {
            fn name(&self) -> &str { "boom" }

            async fn run(&self, ctx: &mut Ctx<'_>) -> Result<(), anyhow::Error> {
                ctx.set("scratch", 1_u8);
                panic!("kaboom");
            }
        }

        let (disp, _tx, sink) = dispatcher();
        disp.register_commands([Arc::new(Boom) as Arc<dyn Command>])
            .unwrap();

        disp.on_event(command("boom", None)).await;

        assert_eq!(sink.errors(), ["event: Panic while handling interaction: kaboom"]);
        assert_eq!(disp.ctx_pool.idle(), 1);
    }

    #[tokio::test]
    async fn autocomplete_is_capped() {
        let (disp, tx, _sink) = dispatcher();
        let log = Log::default();
        disp.register_commands([Arc::new(Echo::new("search", &log)) as Arc<dyn Command>])
            .unwrap();

        disp.on_event(autocomplete("search", vec![CommandOption::new(
            "q",
            OptionValue::Focused("x".into()),
        )]))
        .await;

        let calls = tx.calls();
        let [Call::Autocomplete(choices)] = calls.as_slice() else {
            panic!("unexpected calls: {calls:?}");
        };
        assert_eq!(choices.len(), 25);
        assert_eq!(choices[0], Completion::plain("x0"));
    }

    #[tokio::test]
    async fn failed_autocomplete_sends_nothing() {
        let (disp, tx, sink) = dispatcher();
        let log = Log::default();
        let mut cmd = Echo::new("search", &log);
        cmd.fail = true;
        disp.register_commands([Arc::new(cmd) as Arc<dyn Command>])
            .unwrap();

        disp.on_event(autocomplete("search", vec![CommandOption::new(
            "q",
            OptionValue::Focused("x".into()),
        )]))
        .await;

        assert!(tx.calls().is_empty());
        assert_eq!(sink.errors(), ["event: search completion failed"]);
        assert_eq!(disp.complete_pool.idle(), 1);
    }

    #[tokio::test]
    async fn components_route_through_registry() {
        let (disp, tx, sink) = dispatcher();
        let msg = message_ref(7);

        let _disposer = disp
            .component_builder(msg)
            .add(Button::new("go", "Go"), true, |mut ctx| async move {
                ctx.reply(Response::DeferUpdate).await?;
                Ok(true)
            })
            .build()
            .await
            .unwrap();

        disp.on_event(component_on("go", msg)).await;

        assert!(disp.components().is_empty());
        assert_eq!(&tx.calls()[1..], [
            Call::CreateResponse(Response::DeferUpdate),
            Call::EditComponents(msg, vec![]),
        ]);
        assert!(sink.errors().is_empty());
    }

    #[tokio::test]
    async fn modal_round_trip() {
        #[derive(Debug)]
        struct Form(Log);

        #[async_trait::async_trait]
        impl Command for Form {
            fn name(&self) -> &str { "form" }

            async fn run(&self, ctx: &mut Ctx<'_>) -> Result<(), anyhow::Error> {
                let rx = ctx.open_modal("Form".into(), |_| ()).await?;
                self.0.lock().push(rx.custom_id().to_owned());
                Ok(())
            }
        }

        let (disp, _tx, _sink) = dispatcher();
        let log = Log::default();
        disp.register_commands([Arc::new(Form(Arc::clone(&log))) as Arc<dyn Command>])
            .unwrap();

        disp.on_event(command("form", None)).await;
        let id = log.lock()[0].clone();
        assert!(disp.modals().contains(&id));

        disp.on_event(modal_submit(&id, vec![])).await;
        assert!(disp.modals().is_empty());
    }
}
