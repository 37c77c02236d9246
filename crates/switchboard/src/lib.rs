//! Interaction dispatch for Serenity bots
//!
//! `switchboard` routes inbound interactions (commands, autocomplete
//! requests, component clicks and modal submissions) to their handlers.  It
//! keeps track of whether an interaction has already been acknowledged, runs
//! a before/after middleware chain around every command, and manages the
//! lifetime of component and modal handlers attached to live messages.
//!
//! The network side is abstracted behind [`Transport`](transport::Transport)
//! and [`StateLookup`](transport::StateLookup); the [`gateway`] module
//! provides implementations of both on top of [`serenity`].

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr
)]
#![warn(
    clippy::pedantic,
    missing_docs,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![allow(clippy::module_name_repetitions)]

pub mod completion;
pub mod component;
pub mod context;
pub mod dispatch;
pub mod gateway;
pub mod help;
pub mod interaction;
pub mod modal;
pub mod pool;
pub mod ratelimit;
pub mod registry;
pub mod response;
pub mod transport;

#[cfg(test)]
mod test_util;

pub use dispatch::{Dispatcher, DispatcherBuilder};

/// Common imports for writing commands, middleware and component handlers
pub mod prelude {
    pub use super::{
        completion::Completion,
        component::{Assembler, ComponentBuilder, ComponentContext},
        context::{AutocompleteCtx, Ctx, SubCommandCtx},
        dispatch::{
            After, Autocomplete, Before, Command, DmCapable, Middleware, ResponsePolicy,
        },
        help::HelpProvider,
        modal::{ModalContext, ModalReceiver},
        ratelimit::LimitedCommand,
        response::{
            prelude::*, ActionRow, Button, ButtonStyle, Component, Embed, MessageBody, MessageRef,
            Response, SelectMenu, TextInput,
        },
    };
}
