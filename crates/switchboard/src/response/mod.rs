//! Outgoing interaction responses and the component trees they carry

mod component;
mod embed;
mod message;
mod responder;

pub use component::*;
pub use embed::*;
pub use message::*;
pub(crate) use responder::{Parts, Responder};
pub use responder::{Followup, Respond, ResponseError, ResponseState};

/// Helper traits for responding to interactions
pub mod prelude {
    pub use super::responder::Respond as _;
}
