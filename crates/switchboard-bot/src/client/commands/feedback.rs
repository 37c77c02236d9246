use super::prelude::*;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
pub struct Feedback;

impl Feedback {
    pub fn define() -> CreateCommand {
        CreateCommand::new("feedback").description("Tell us what you think")
    }
}

async fn acknowledge(mut modal: ModalContext) -> Result {
    let subject = modal
        .value("subject")
        .filter(|s| !s.is_empty())
        .unwrap_or("Feedback")
        .to_owned();
    let body = modal.value("body").unwrap_or_default().to_owned();
    info!(user = %modal.user().id, %subject, "Feedback received");

    modal.set_ephemeral(true);
    modal
        .respond_embed(
            Embed::default()
                .title(subject)
                .desc_plain(body)
                .footer("Thanks for the feedback!"),
        )
        .await?;
    Ok(())
}

#[async_trait::async_trait]
impl Command for Feedback {
    fn name(&self) -> &str { "feedback" }

    fn description(&self) -> &str { "Tell us what you think" }

    async fn run(&self, ctx: &mut Ctx<'_>) -> Result {
        let rx = ctx
            .open_modal("Send feedback".into(), |m| {
                m.push(
                    TextInput::short("subject", "Subject")
                        .len(None, Some(100))
                        .required(false),
                )
                .push(TextInput::long("body", "What's on your mind?").len(Some(1), Some(2000)));
            })
            .await
            .context("Error opening feedback form")?;

        tokio::spawn(async move {
            let Some(modal) = rx.recv_timeout(SUBMIT_TIMEOUT).await else {
                return;
            };

            if let Err(e) = acknowledge(modal).await {
                warn!("Error acknowledging feedback: {e:?}");
            }
        });

        Ok(())
    }
}
