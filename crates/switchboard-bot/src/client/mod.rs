use serenity::{
    model::{gateway::GatewayIntents, id::GuildId},
    Client,
};
use switchboard::{
    dispatch::{EmbedColors, Middleware},
    gateway::{GatewayHandler, SerenityTransport},
    help::Help,
    ratelimit::RateLimit,
    Dispatcher,
};

use crate::prelude::*;

mod commands;
mod handler;

#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct DebugShim<T>(pub T);

impl<T> fmt::Debug for DebugShim<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> From<T> for DebugShim<T> {
    fn from(val: T) -> Self { Self(val) }
}

fn parse_color(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches('#'), 16)
}

#[derive(Debug, clap::Args)]
pub struct ClientOpts {
    /// The Discord API token to use
    #[arg(long, env)]
    discord_token: DebugShim<String>,

    /// Register commands in this guild only, rather than globally
    #[arg(long, env)]
    command_guild: Option<u64>,

    /// Hex color of ordinary embeds
    #[arg(long, env, value_parser = parse_color, default_value = "FDD835")]
    embed_color: u32,

    /// Hex color of error embeds
    #[arg(long, env, value_parser = parse_color, default_value = "F44336")]
    error_color: u32,

    /// Timeout for Discord API requests, in seconds
    #[arg(long, env, default_value_t = 10)]
    request_timeout: u64,
}

pub async fn build(opts: ClientOpts) -> Result<Client> {
    let ClientOpts {
        discord_token,
        command_guild,
        embed_color,
        error_color,
        request_timeout,
    } = opts;

    let transport = Arc::new(SerenityTransport::new(Duration::from_secs(
        request_timeout,
    )));
    let dispatcher = Arc::new(
        Dispatcher::builder(Arc::clone(&transport))
            .colors(EmbedColors {
                default: embed_color,
                error: error_color,
            })
            .build(),
    );

    let (commands, definitions): (Vec<_>, Vec<_>) = commands::list().into_iter().unzip();
    dispatcher
        .register_commands(commands)
        .context("Error registering commands")?;
    dispatcher
        .register_middlewares([
            Arc::new(Help::default()) as Arc<dyn Middleware>,
            Arc::new(RateLimit::default()),
        ])
        .context("Error registering middleware")?;

    let handler = handler::Handler::new(
        GatewayHandler::new(dispatcher, transport),
        definitions,
        command_guild.map(GuildId::new),
    );

    Client::builder(discord_token.0, GatewayIntents::non_privileged())
        .event_handler(handler)
        .await
        .context("Error constructing Serenity client")
}
