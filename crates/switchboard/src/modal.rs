//! Opening modal dialogs and receiving their submissions

use std::{sync::Arc, time::Duration};

use futures_util::future;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    component::Assembler,
    dispatch::Core,
    interaction::{Interaction, InteractionData, InteractionKind, ModalData, User},
    registry::{self, Disposition, Unregister},
    response::{
        find_component, Component, Modal, Parts, Responder, Response, ResponseError,
        ResponseState,
    },
};

/// Context for a single modal submission
#[derive(Debug)]
pub struct ModalContext {
    core: Arc<Core>,
    int: Arc<Interaction>,
    state: ResponseState,
}

impl ModalContext {
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

    /// The submitting user
    #[inline]
    #[must_use]
    pub fn user(&self) -> &User { &self.int.user }

    /// The modal payload of the interaction
    #[must_use]
    pub fn data(&self) -> &ModalData {
        match &self.int.data {
            InteractionData::Modal(d) => d,
            _ => unreachable!("Modal context built from non-modal interaction"),
        }
    }

    /// Find a submitted field by custom ID, searching inside rows
    #[must_use]
    pub fn component(&self, id: &str) -> Option<&Component> {
        find_component(&self.data().components, id)
    }

    /// The submitted text of the field with the given custom ID
    #[must_use]
    pub fn value(&self, id: &str) -> Option<&str> {
        match self.component(id)? {
            Component::TextInput(t) => t.value.as_deref(),
            _ => None,
        }
    }
}

impl Responder for ModalContext {
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

/// Receives the submission of an opened modal
///
/// The submission never arrives if the user dismisses the dialog, so callers
/// that cannot wait forever should use [`recv_timeout`](Self::recv_timeout).
#[derive(Debug)]
pub struct ModalReceiver {
    custom_id: String,
    rx: oneshot::Receiver<ModalContext>,
    unreg: Unregister<ModalContext>,
}

impl ModalReceiver {
    /// The generated custom ID of the modal
    #[inline]
    #[must_use]
    pub fn custom_id(&self) -> &str { &self.custom_id }

    /// Wait for the submission
    ///
    /// Returns `None` if the modal handler was unregistered without firing.
    pub async fn recv(self) -> Option<ModalContext> { self.rx.await.ok() }

    /// Wait up to `timeout` for the submission, unregistering the modal if
    /// it does not arrive in time
    pub async fn recv_timeout(self, timeout: Duration) -> Option<ModalContext> {
        let Self { custom_id, rx, unreg } = self;
        if let Ok(res) = tokio::time::timeout(timeout, rx).await {
            return res.ok();
        }

        debug!(%custom_id, "Modal submission timed out");
        unreg.unregister();
        None
    }
}

pub(crate) async fn open<F: FnOnce(&mut Assembler)>(
    parts: Parts<'_>,
    title: String,
    build: F,
) -> Result<ModalReceiver, ResponseError> {
    let Parts { core, int, state } = parts;

    if state.responded() {
        return Err(ResponseError::AlreadyResponded);
    }
    if int.kind() == InteractionKind::Modal {
        return Err(ResponseError::Unsupported(InteractionKind::Modal));
    }

    let mut asm = Assembler::default();
    build(&mut asm);
    let (components, handlers) = asm.into_parts();
    if handlers > 0 {
        warn!(handlers, "Ignoring handlers attached to modal fields");
    }

    let custom_id = Uuid::new_v4().to_string();
    let (tx, rx) = oneshot::channel::<ModalContext>();
    let tx = Mutex::new(Some(tx));
    let handler = registry::handler(move |ctx: ModalContext| {
        let consumed = match tx.lock().take() {
            Some(tx) => {
                if tx.send(ctx).is_err() {
                    debug!("Modal receiver dropped before submission");
                }
                true
            },
            None => false,
        };
        future::ready(Ok(consumed))
    });
    let unreg = core
        .modals
        .register(custom_id.clone(), handler, Disposition::OneShot);

    let modal = Modal {
        custom_id: custom_id.clone(),
        title,
        components,
    };
    if let Err(err) = state.reply(&*core.transport, int, Response::Modal(modal)).await {
        unreg.unregister();
        return Err(err);
    }

    Ok(ModalReceiver {
        custom_id,
        rx,
        unreg,
    })
}
