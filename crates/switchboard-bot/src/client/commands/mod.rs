use serenity::builder::CreateCommand;
use switchboard::dispatch::Command;

use crate::prelude::*;

mod feedback;
mod ping;
mod roll;

mod prelude {
    pub use serenity::{
        builder::{CreateCommand, CreateCommandOption},
        model::application::CommandOptionType,
    };
    pub use switchboard::prelude::*;

    pub use crate::prelude::*;
}

/// Every command this bot serves, paired with the definition uploaded to
/// Discord for it
pub fn list() -> Vec<(Arc<dyn Command>, CreateCommand)> {
    vec![
        (Arc::new(ping::Ping), ping::Ping::define()),
        (Arc::new(feedback::Feedback), feedback::Feedback::define()),
        (Arc::new(roll::Roll), roll::Roll::define()),
    ]
}
