use std::time::Instant;

use super::prelude::*;

#[derive(Debug)]
pub struct Ping;

impl Ping {
    pub fn define() -> CreateCommand {
        CreateCommand::new("ping").description("Check that the bot is listening")
    }
}

impl DmCapable for Ping {}

#[async_trait::async_trait]
impl Command for Ping {
    fn name(&self) -> &str { "ping" }

    fn description(&self) -> &str { "Check that the bot is listening" }

    fn as_dm_capable(&self) -> Option<&dyn DmCapable> { Some(self) }

    async fn run(&self, ctx: &mut Ctx<'_>) -> Result {
        let start = Instant::now();
        ctx.reply_message(MessageBody::plain("Pong!"))
            .await
            .context("Error sending pong")?;
        let elapsed = start.elapsed();

        let followup = ctx
            .follow_up(MessageBody::plain(format!(
                "Round trip took {}ms.",
                elapsed.as_millis()
            )))
            .await
            .context("Error sending latency")?;

        let msg = followup.message().id;
        // The buttons stay attached until the once-row is used
        let _disposer = followup
            .components()
            .add_row(true, |row| {
                row.add(
                    Button::new(format!("ping.again.{msg}"), "Again").style(ButtonStyle::Primary),
                    false,
                    |mut c: ComponentContext| async move {
                        c.reply_message(MessageBody::plain("Pong!").ephemeral(true))
                            .await?;
                        Ok::<_, Error>(true)
                    },
                )
                .add(
                    Button::new(format!("ping.dismiss.{msg}"), "Dismiss"),
                    false,
                    |mut c: ComponentContext| async move {
                        c.reply(Response::DeferUpdate).await?;
                        Ok::<_, Error>(true)
                    },
                );
            })
            .build()
            .await
            .context("Error attaching buttons")?;

        Ok(())
    }
}
