//! Contexts handed to command and autocomplete handlers

use std::{any::Any, fmt, sync::Arc};

use hashbrown::HashMap;

use crate::{
    component::ComponentBuilder,
    dispatch::{Command, Core},
    interaction::{
        CommandData, CommandOption, CommandOptions, Interaction, InteractionData, SubCommand, User,
    },
    pool::{Pooled, Reset},
    response::{MessageRef, Parts, Responder, ResponseState},
    transport::{ChannelInfo, GuildInfo, TransportError},
};

/// A string-keyed map of arbitrary values
#[derive(Default)]
pub struct ObjectMap(HashMap<String, Box<dyn Any + Send + Sync>>);

impl fmt::Debug for ObjectMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl ObjectMap {
    /// Get the value stored under `key` if it has type `T`
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> { self.0.get(key)?.downcast_ref() }

    /// Store a value under `key`, replacing any previous value
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.0.insert(key.into(), Box::new(value));
    }

    /// Remove the value stored under `key`, returning true if one existed
    pub fn remove(&mut self, key: &str) -> bool { self.0.remove(key).is_some() }

    /// Remove every value
    pub fn purge(&mut self) { self.0.clear(); }

    /// The number of stored values
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns true if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl Reset for ObjectMap {
    #[inline]
    fn reset(&mut self) { self.purge(); }
}

/// A fallback source of values for context lookups
///
/// Consulted whenever a key is missing from a context's own object map.
pub trait ObjectProvider: fmt::Debug + Send + Sync {
    /// Look up a value by key
    fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)>;
}

impl ObjectProvider for ObjectMap {
    fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> { self.0.get(key).map(|b| &**b) }
}

fn lookup<'a, T: Any>(
    objects: &'a ObjectMap,
    deps: Option<&'a Arc<dyn ObjectProvider>>,
    key: &str,
) -> Option<&'a T> {
    objects
        .get(key)
        .or_else(|| deps?.get(key)?.downcast_ref())
}

fn command_data(int: &Interaction) -> &CommandData {
    match &int.data {
        InteractionData::Command(d) | InteractionData::Autocomplete(d) => d,
        InteractionData::Component(_) | InteractionData::Modal(_) => {
            unreachable!("Command context built from non-command interaction")
        },
    }
}

/// Pooled per-dispatch state of a [`Ctx`]
#[derive(Debug, Default)]
pub(crate) struct CtxSlot {
    objects: ObjectMap,
    response: ResponseState,
}

impl Reset for CtxSlot {
    fn reset(&mut self) {
        self.objects.purge();
        self.response = ResponseState::default();
    }
}

/// Context for a single command invocation
///
/// Lives for exactly one dispatch; its scratch state is recycled once the
/// command and its middleware have finished.
#[derive(Debug)]
pub struct Ctx<'a> {
    core: &'a Arc<Core>,
    slot: Pooled<'a, CtxSlot>,
    int: Arc<Interaction>,
    command: Arc<dyn Command>,
}

impl<'a> Ctx<'a> {
    pub(crate) fn new(
        core: &'a Arc<Core>,
        slot: Pooled<'a, CtxSlot>,
        int: Arc<Interaction>,
        command: Arc<dyn Command>,
    ) -> Self {
        Self {
            core,
            slot,
            int,
            command,
        }
    }

    /// The interaction being handled
    #[inline]
    #[must_use]
    pub fn interaction(&self) -> &Interaction { &self.int }

    /// The invoking user
    #[inline]
    #[must_use]
    pub fn user(&self) -> &User { &self.int.user }

    /// The command being run
    #[inline]
    #[must_use]
    pub fn command(&self) -> &Arc<dyn Command> { &self.command }

    /// The command payload of the interaction
    #[inline]
    #[must_use]
    pub fn data(&self) -> &CommandData { command_data(&self.int) }

    /// The options passed to the command
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CommandOptions { &self.data().options }

    /// Look up the channel the command was run in
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    pub async fn channel(&self) -> Result<ChannelInfo, TransportError> {
        self.core.state.channel(self.int.channel_id).await
    }

    /// Look up the guild the command was run in, if any
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    pub async fn guild(&self) -> Result<Option<GuildInfo>, TransportError> {
        match self.int.guild_id {
            Some(id) => self.core.state.guild(id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Get a value stored on this context, falling back to the dispatcher's
    /// dependency provider
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        lookup(&self.slot.objects, self.core.deps.as_ref(), key)
    }

    /// Store a value on this context for the remainder of the dispatch
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.slot.objects.set(key, value);
    }

    /// Remove a value stored on this context
    pub fn remove(&mut self, key: &str) -> bool { self.slot.objects.remove(key) }

    /// Scope this context to the invoked sub-command, if there is one
    pub fn sub_command(&mut self) -> Option<SubCommandCtx<'_, 'a>> {
        self.options().sub_command()?;
        Some(SubCommandCtx { ctx: self })
    }

    /// Attach interactive components to a message
    #[must_use]
    pub fn components(&self, message: MessageRef) -> ComponentBuilder {
        ComponentBuilder::new(Arc::clone(self.core), message)
    }
}

impl<'a> Responder for Ctx<'a> {
    fn parts(&mut self) -> Parts<'_> {
        Parts {
            core: self.core,
            int: &self.int,
            state: &mut self.slot.response,
        }
    }

    #[inline]
    fn state(&self) -> &ResponseState { &self.slot.response }
}

/// A command context scoped to the invoked sub-command
#[derive(Debug)]
pub struct SubCommandCtx<'c, 'a> {
    ctx: &'c mut Ctx<'a>,
}

impl<'c, 'a> SubCommandCtx<'c, 'a> {
    fn sub(&self) -> SubCommand<'_> {
        self.ctx
            .options()
            .sub_command()
            .unwrap_or_else(|| unreachable!("Sub-command context without a sub-command"))
    }

    /// The name of the sub-command
    #[must_use]
    pub fn name(&self) -> &str { self.sub().name }

    /// The group containing the sub-command, if any
    #[must_use]
    pub fn group(&self) -> Option<&str> { self.sub().group }

    /// The options passed to the sub-command
    #[must_use]
    pub fn options(&self) -> &CommandOptions { self.sub().options }

    /// The unscoped command context
    #[inline]
    #[must_use]
    pub fn parent(&self) -> &Ctx<'a> { self.ctx }

    /// The unscoped command context
    #[inline]
    pub fn parent_mut(&mut self) -> &mut Ctx<'a> { self.ctx }
}

impl<'c, 'a> Responder for SubCommandCtx<'c, 'a> {
    #[inline]
    fn parts(&mut self) -> Parts<'_> { self.ctx.parts() }

    #[inline]
    fn state(&self) -> &ResponseState { self.ctx.state() }
}

/// Context for a single autocomplete request
#[derive(Debug)]
pub struct AutocompleteCtx<'a> {
    core: &'a Arc<Core>,
    objects: Pooled<'a, ObjectMap>,
    int: Arc<Interaction>,
}

impl<'a> AutocompleteCtx<'a> {
    pub(crate) fn new(core: &'a Arc<Core>, objects: Pooled<'a, ObjectMap>, int: Arc<Interaction>) -> Self {
        Self { core, objects, int }
    }

    /// The interaction being handled
    #[inline]
    #[must_use]
    pub fn interaction(&self) -> &Interaction { &self.int }

    /// The invoking user
    #[inline]
    #[must_use]
    pub fn user(&self) -> &User { &self.int.user }

    /// The options typed so far
    #[inline]
    #[must_use]
    pub fn options(&self) -> &CommandOptions { &command_data(&self.int).options }

    /// The option currently being typed
    #[must_use]
    pub fn focused(&self) -> Option<&CommandOption> { self.options().focused() }

    /// The string input of the named option, searching sub-commands
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&str> {
        self.options()
            .walk()
            .find(|o| o.name == name)
            .and_then(CommandOption::as_str)
    }

    /// The input of the first named option that has one
    #[must_use]
    pub fn input_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|n| self.input(n))
    }

    /// Look up the channel the request came from
    ///
    /// # Errors
    /// Returns an error if the lookup fails.
    pub async fn channel(&self) -> Result<ChannelInfo, TransportError> {
        self.core.state.channel(self.int.channel_id).await
    }

    /// Get a value stored on this context, falling back to the dispatcher's
    /// dependency provider
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        lookup(&self.objects, self.core.deps.as_ref(), key)
    }

    /// Store a value on this context for the remainder of the request
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.objects.set(key, value);
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::{ObjectMap, ObjectProvider};

    #[test]
    fn object_map_is_typed() {
        let mut map = ObjectMap::default();
        map.set("n", 3_u32);
        map.set("s", "hi".to_owned());

        assert_eq!(map.get::<u32>("n"), Some(&3));
        assert_eq!(map.get::<i64>("n"), None);
        assert_eq!(map.get::<String>("s").map(String::as_str), Some("hi"));

        map.set("n", 4_u32);
        assert_eq!(map.get::<u32>("n"), Some(&4));
        assert!(map.remove("n"));
        assert!(!map.remove("n"));

        map.purge();
        assert!(map.is_empty());
    }

    #[test]
    fn provider_fallback() {
        let mut deps = ObjectMap::default();
        deps.set("db", 7_u8);
        let deps: Arc<dyn ObjectProvider> = Arc::new(deps);

        let mut local = ObjectMap::default();
        assert_eq!(super::lookup::<u8>(&local, Some(&deps), "db"), Some(&7));

        local.set("db", 9_u8);
        assert_eq!(super::lookup::<u8>(&local, Some(&deps), "db"), Some(&9));
        assert_eq!(super::lookup::<u8>(&local, None, "missing"), None);
    }
}
