//! Entry point for switchboard-bot

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod entry;

mod prelude {
    #![expect(unused_imports, reason = "Some exports may not yet be used")]

    pub use std::{fmt, sync::Arc, time::Duration};

    pub use anyhow::{anyhow, bail, Context as _, Error};
    pub use futures_util::StreamExt;
    pub use tracing::{debug, error, error_span, info, instrument, trace, warn};
    pub use tracing_subscriber::prelude::*;

    pub type Result<T = (), E = Error> = std::result::Result<T, E>;
}

fn main() { entry::main(); }
