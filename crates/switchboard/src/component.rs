//! Attaching interactive components to live messages
//!
//! An [`Assembler`] collects a component tree together with the handlers for
//! its leaves.  A [`ComponentBuilder`] attaches the tree to a message and
//! registers the handlers; the returned [`Disposer`] detaches both again.
//!
//! Handlers added with `once` (or inside a row added with `once`) are
//! removed after they first consume an event, and their components are
//! pruned from the message.  A once-row is retired as a whole as soon as any
//! of its members fires.

use std::{
    fmt,
    future::Future,
    mem,
    sync::{Arc, Weak},
};

use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    dispatch::Core,
    interaction::{ComponentData, Interaction, InteractionData, User},
    registry::{self, Disposition, HandlerFn, HandlerResult, Registry},
    response::{
        remove_components, ActionRow, Component, MessageRef, Parts, Responder,
        ResponseError, ResponseState,
    },
    transport::Transport,
};

struct Pending {
    id: String,
    handler: HandlerFn<ComponentContext>,
    once: bool,
    group: Option<Arc<[String]>>,
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("id", &self.id)
            .field("once", &self.once)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

/// Collects a component tree and the handlers for its leaves
#[derive(Debug, Default)]
pub struct Assembler {
    components: Vec<Component>,
    handlers: Vec<Pending>,
}

impl Assembler {
    fn push_handler(&mut self, pending: Pending) {
        if let Some(old) = self.handlers.iter_mut().find(|p| p.id == pending.id) {
            *old = pending;
        } else {
            self.handlers.push(pending);
        }
    }

    /// Add a component with a handler for its events
    ///
    /// The handler is dropped if the component has no custom ID.  Adding a
    /// second handler for the same ID replaces the first.
    pub fn add<F, R>(&mut self, component: impl Into<Component>, once: bool, f: F) -> &mut Self
    where
        F: Fn(ComponentContext) -> R + Send + Sync + 'static,
        R: Future<Output = HandlerResult> + Send + 'static,
    {
        let component = component.into();
        if let Some(id) = component.custom_id() {
            self.push_handler(Pending {
                id: id.to_owned(),
                handler: registry::handler(f),
                once,
                group: None,
            });
        }
        self.components.push(component);
        self
    }

    /// Add a component with no handler, such as a link button or a modal
    /// field
    pub fn push(&mut self, component: impl Into<Component>) -> &mut Self {
        self.components.push(component.into());
        self
    }

    /// Add an action row built by the given closure
    ///
    /// If `once` is set, the first handler in the row to consume an event
    /// retires the whole row.
    pub fn add_row(&mut self, once: bool, build: impl FnOnce(&mut Assembler)) -> &mut Self {
        let mut row = Assembler::default();
        build(&mut row);
        let Assembler {
            components,
            handlers,
        } = row;

        let group: Option<Arc<[String]>> =
            once.then(|| handlers.iter().map(|p| p.id.clone()).collect());
        for mut pending in handlers {
            if let Some(ref group) = group {
                pending.group = Some(Arc::clone(group));
            }
            self.push_handler(pending);
        }

        self.components.push(Component::Row(ActionRow(components)));
        self
    }

    /// The components added so far
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[Component] { &self.components }

    pub(crate) fn into_parts(self) -> (Vec<Component>, usize) {
        (self.components, self.handlers.len())
    }
}

type Condition = Arc<dyn Fn(&ComponentContext) -> bool + Send + Sync>;

/// Attaches components and their handlers to a message
pub struct ComponentBuilder {
    core: Arc<Core>,
    message: MessageRef,
    condition: Option<Condition>,
    assembler: Assembler,
}

impl fmt::Debug for ComponentBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBuilder")
            .field("message", &self.message)
            .field("condition", &self.condition.is_some())
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

/// The runtime state shared by the handlers of one attached tree
struct Attached {
    transport: Arc<dyn Transport>,
    registry: Weak<Registry<ComponentContext>>,
    message: MessageRef,
    tree: Mutex<Vec<Component>>,
}

impl Attached {
    /// Retire `ids` and prune them from the message
    async fn prune(&self, ids: &[String]) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };

        let snapshot = registry.retire_with(ids, || {
            let mut tree = self.tree.lock();
            *tree = remove_components(mem::take(&mut *tree), ids);
            tree.clone()
        });

        if let Err(err) = self.transport.edit_message_components(self.message, snapshot).await {
            warn!(%err, message = %self.message.id, "Error re-rendering pruned components");
        }
    }
}

impl ComponentBuilder {
    pub(crate) fn new(core: Arc<Core>, message: MessageRef) -> Self {
        Self {
            core,
            message,
            condition: None,
            assembler: Assembler::default(),
        }
    }

    /// Add a component with a handler for its events
    ///
    /// See [`Assembler::add`].
    #[must_use]
    pub fn add<F, R>(mut self, component: impl Into<Component>, once: bool, f: F) -> Self
    where
        F: Fn(ComponentContext) -> R + Send + Sync + 'static,
        R: Future<Output = HandlerResult> + Send + 'static,
    {
        self.assembler.add(component, once, f);
        self
    }

    /// Add a component with no handler
    #[must_use]
    pub fn push(mut self, component: impl Into<Component>) -> Self {
        self.assembler.push(component);
        self
    }

    /// Add an action row built by the given closure
    ///
    /// See [`Assembler::add_row`].
    #[must_use]
    pub fn add_row(mut self, once: bool, build: impl FnOnce(&mut Assembler)) -> Self {
        self.assembler.add_row(once, build);
        self
    }

    /// Only run handlers for events that satisfy `cond`
    ///
    /// Events failing the condition are declined, so one-shot handlers stay
    /// registered.
    #[must_use]
    pub fn condition(mut self, cond: impl Fn(&ComponentContext) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(cond));
        self
    }

    /// Attach the components to the message and register their handlers
    ///
    /// # Errors
    /// Returns an error if the message could not be edited, in which case no
    /// handlers are registered.
    pub async fn build(self) -> Result<Disposer, ResponseError> {
        let Self {
            core,
            message,
            condition,
            assembler: Assembler {
                components,
                handlers,
            },
        } = self;

        core.transport.edit_message_components(message, components.clone()).await?;

        let attached = Arc::new(Attached {
            transport: Arc::clone(&core.transport),
            registry: Arc::downgrade(&core.components),
            message,
            tree: Mutex::new(components),
        });
        let ids: Arc<[String]> = handlers.iter().map(|p| p.id.clone()).collect();

        core.components.register_all(handlers.into_iter().map(|p| {
            let Pending {
                id,
                handler,
                once,
                group,
            } = p;
            let (disposition, retire) = match (group, once) {
                (Some(g), _) => (Disposition::OneShotGroup(Arc::clone(&g)), Some(g)),
                (None, true) => (Disposition::OneShot, Some(Arc::from(vec![id.clone()]))),
                (None, false) => (Disposition::Persistent, None),
            };
            let handler = wrap(handler, condition.clone(), retire.map(|r| (Arc::clone(&attached), r)));
            (id, handler, disposition)
        }));

        debug!(message = %message.id, handlers = ids.len(), "Attached components");

        Ok(Disposer {
            core,
            attached,
            ids,
        })
    }
}

fn wrap(
    handler: HandlerFn<ComponentContext>,
    condition: Option<Condition>,
    retire: Option<(Arc<Attached>, Arc<[String]>)>,
) -> HandlerFn<ComponentContext> {
    Arc::new(move |ctx: ComponentContext| {
        let handler = Arc::clone(&handler);
        let condition = condition.clone();
        let retire = retire.clone();
        async move {
            if condition.is_some_and(|c| !c(&ctx)) {
                return Ok(false);
            }

            if !handler(ctx).await? {
                return Ok(false);
            }

            if let Some((attached, ids)) = retire {
                attached.prune(&ids).await;
            }

            Ok(true)
        }
        .boxed()
    })
}

/// Detaches components attached by a [`ComponentBuilder`]
#[derive(Debug)]
#[must_use = "dropping a Disposer leaves the components attached"]
pub struct Disposer {
    core: Arc<Core>,
    attached: Arc<Attached>,
    ids: Arc<[String]>,
}

impl fmt::Debug for Attached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attached")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl Disposer {
    /// The message the components are attached to
    #[inline]
    #[must_use]
    pub fn message(&self) -> MessageRef { self.attached.message }

    /// Remove every component from the message and unregister all of their
    /// handlers
    ///
    /// # Errors
    /// Returns an error if the message could not be edited, in which case the
    /// handlers stay registered.
    pub async fn dispose(self) -> Result<(), ResponseError> {
        self.core
            .transport
            .edit_message_components(self.attached.message, vec![])
            .await?;
        self.core
            .components
            .retire_with(&self.ids, || self.attached.tree.lock().clear());
        Ok(())
    }
}

/// Context for a single component interaction
#[derive(Debug)]
pub struct ComponentContext {
    core: Arc<Core>,
    int: Arc<Interaction>,
    state: ResponseState,
}

impl ComponentContext {
    pub(crate) fn new(core: Arc<Core>, int: Arc<Interaction>) -> Self {
        Self {
            core,
            int,
            state: ResponseState::default(),
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

    /// The component payload of the interaction
    #[must_use]
    pub fn data(&self) -> &ComponentData {
        match &self.int.data {
            InteractionData::Component(d) => d,
            _ => unreachable!("Component context built from non-component interaction"),
        }
    }

    /// The custom ID of the component interacted with
    #[inline]
    #[must_use]
    pub fn custom_id(&self) -> &str { &self.data().custom_id }

    /// Selected values, for select menus
    #[inline]
    #[must_use]
    pub fn values(&self) -> &[String] { &self.data().values }

    /// The message the component is attached to
    #[inline]
    #[must_use]
    pub fn message(&self) -> MessageRef { self.data().message }

    /// Attach interactive components to a message
    #[must_use]
    pub fn components(&self, message: MessageRef) -> ComponentBuilder {
        ComponentBuilder::new(Arc::clone(&self.core), message)
    }
}

impl Responder for ComponentContext {
    fn parts(&mut self) -> Parts<'_> {
        Parts {
            core: &self.core,
            int: &self.int,
            state: &mut self.state,
        }
    }

    #[inline]
    fn state(&self) -> &ResponseState { &self.state }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::Assembler;
    use crate::{
        response::{ActionRow, Button, Component},
        test_util::{component_at, core, message_ref, Call},
    };

    fn btn(id: &str) -> Button { Button::new(id, id) }

    type Ready = futures_util::future::Ready<crate::registry::HandlerResult>;

    fn counting(
        hits: &Arc<AtomicUsize>,
    ) -> impl Fn(super::ComponentContext) -> Ready + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(true))
        }
    }

    #[test]
    fn assembler_groups_rows() {
        let mut asm = Assembler::default();
        asm.add_row(true, |r| {
            r.add(btn("a"), false, |_| async { Ok(true) })
                .add(btn("b"), false, |_| async { Ok(true) });
        })
        .add(btn("c"), true, |_| async { Ok(true) });

        assert_eq!(asm.components(), &[
            Component::Row(ActionRow::new([btn("a"), btn("b")])),
            Component::Button(btn("c")),
        ]);
        let groups: Vec<_> = asm
            .handlers
            .iter()
            .map(|p| (p.id.as_str(), p.once, p.group.as_ref().map(|g| g.len())))
            .collect();
        assert_eq!(groups, [("a", false, Some(2)), ("b", false, Some(2)), ("c", true, None)]);
    }

    #[tokio::test]
    async fn build_attaches_then_registers() {
        let (core, tx) = core();
        let msg = message_ref(1);
        let hits = Arc::new(AtomicUsize::new(0));

        let _disposer = super::ComponentBuilder::new(Arc::clone(&core), msg)
            .add(btn("keep"), false, counting(&hits))
            .build()
            .await
            .unwrap();

        assert_eq!(tx.calls(), vec![Call::EditComponents(msg, vec![btn("keep").into()])]);
        assert!(core.components.contains("keep"));

        for _ in 0..2 {
            let res = core
                .components
                .fire("keep", component_at(&core, "keep", msg))
                .await;
            assert!(matches!(res, Some(Ok(true))));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_attach_registers_nothing() {
        let (core, tx) = core();
        tx.fail_next(crate::transport::TransportError::Rejected("no".into()));

        let res = super::ComponentBuilder::new(Arc::clone(&core), message_ref(1))
            .add(btn("a"), false, |_| async { Ok(true) })
            .build()
            .await;

        assert!(res.is_err());
        assert!(core.components.is_empty());
    }

    #[tokio::test]
    async fn once_row_retires_and_prunes() {
        let (core, tx) = core();
        let msg = message_ref(1);
        let hits = Arc::new(AtomicUsize::new(0));

        let _disposer = super::ComponentBuilder::new(Arc::clone(&core), msg)
            .add_row(true, |r| {
                r.add(btn("yes"), false, counting(&hits))
                    .add(btn("no"), false, counting(&hits));
            })
            .add(btn("other"), false, counting(&hits))
            .build()
            .await
            .unwrap();

        let res = core
            .components
            .fire("no", component_at(&core, "no", msg))
            .await;
        assert!(matches!(res, Some(Ok(true))));
        assert!(!core.components.contains("yes"));
        assert!(!core.components.contains("no"));
        assert!(core.components.contains("other"));

        let res = core
            .components
            .fire("yes", component_at(&core, "yes", msg))
            .await;
        assert!(res.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(
            tx.calls().last(),
            Some(&Call::EditComponents(msg, vec![btn("other").into()]))
        );
    }

    #[tokio::test]
    async fn once_leaf_leaves_siblings() {
        let (core, tx) = core();
        let msg = message_ref(1);
        let hits = Arc::new(AtomicUsize::new(0));

        let _disposer = super::ComponentBuilder::new(Arc::clone(&core), msg)
            .add_row(false, |r| {
                r.add(btn("once"), true, counting(&hits))
                    .add(btn("stay"), false, counting(&hits));
            })
            .build()
            .await
            .unwrap();

        let res = core
            .components
            .fire("once", component_at(&core, "once", msg))
            .await;
        assert!(matches!(res, Some(Ok(true))));
        assert!(!core.components.contains("once"));
        assert!(core.components.contains("stay"));
        assert_eq!(
            tx.calls().last(),
            Some(&Call::EditComponents(msg, vec![ActionRow::new([btn("stay")]).into()]))
        );
    }

    #[tokio::test]
    async fn declined_once_stays_registered() {
        let (core, tx) = core();
        let msg = message_ref(1);

        let _disposer = super::ComponentBuilder::new(Arc::clone(&core), msg)
            .add(btn("a"), true, |_| async { Ok(true) })
            .condition(|ctx| ctx.user().name == "allowed")
            .build()
            .await
            .unwrap();

        let res = core
            .components
            .fire("a", component_at(&core, "a", msg))
            .await;
        assert!(matches!(res, Some(Ok(false))));
        assert!(core.components.contains("a"));
        assert_eq!(tx.calls().len(), 1);
    }

    #[tokio::test]
    async fn dispose_clears_everything() {
        let (core, tx) = core();
        let msg = message_ref(1);

        let disposer = super::ComponentBuilder::new(Arc::clone(&core), msg)
            .add(btn("a"), false, |_| async { Ok(true) })
            .add(btn("b"), true, |_| async { Ok(true) })
            .build()
            .await
            .unwrap();

        disposer.dispose().await.unwrap();
        assert!(core.components.is_empty());
        assert_eq!(tx.calls().last(), Some(&Call::EditComponents(msg, vec![])));
    }
}
