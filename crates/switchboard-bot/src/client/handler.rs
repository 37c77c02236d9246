use serenity::{
    builder::CreateCommand,
    client::{Context, EventHandler},
    http::Http,
    model::{
        application::{Command, Interaction},
        gateway::Ready,
        id::GuildId,
    },
};
use switchboard::gateway::GatewayHandler;

use crate::prelude::*;

/// Uploads the command list once connected, and forwards everything else to
/// the dispatcher
#[derive(Debug)]
pub struct Handler {
    gateway: GatewayHandler,
    definitions: Vec<CreateCommand>,
    guild: Option<GuildId>,
}

impl Handler {
    pub fn new(
        gateway: GatewayHandler,
        definitions: Vec<CreateCommand>,
        guild: Option<GuildId>,
    ) -> Self {
        Self {
            gateway,
            definitions,
            guild,
        }
    }

    #[instrument(level = "error", skip(self, http))]
    async fn upload_commands(&self, http: &Http) -> Result {
        let defs = self.definitions.clone();
        let cmds = match self.guild {
            Some(guild) => guild.set_commands(http, defs).await,
            None => Command::set_global_commands(http, defs).await,
        }
        .context("Error uploading command list")?;

        info!(count = cmds.len(), "Commands uploaded");
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        let http = Arc::clone(&ctx.http);
        self.gateway.ready(ctx, ready).await;

        if let Err(e) = self.upload_commands(&http).await {
            error!("{e:?}");
        }
    }

    async fn interaction_create(&self, ctx: Context, int: Interaction) {
        self.gateway.interaction_create(ctx, int).await;
    }
}
