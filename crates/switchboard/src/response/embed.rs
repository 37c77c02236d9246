use serenity::{builder::CreateEmbed, builder::CreateEmbedFooter, utils::MessageBuilder};
use url::Url;

/// A message rich content embed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embed {
    /// Bold header text
    pub title: Option<String>,
    /// Body text
    pub desc: Option<String>,
    /// Link opened by clicking the title
    pub url: Option<Url>,
    /// Sidebar color as `0xRRGGBB`
    pub color: Option<u32>,
    /// Small text below the body
    pub footer: Option<String>,
    /// Name/value pairs shown below the body
    pub fields: Vec<EmbedField>,
}

/// A single name/value pair in an [`Embed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    /// Field heading
    pub name: String,
    /// Field contents
    pub value: String,
    /// Whether the field may share a line with its neighbors
    pub inline: bool,
}

impl Embed {
    /// Set the title of this embed
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description of this embed using the given closure
    #[must_use]
    pub fn desc_rich(mut self, f: impl FnOnce(&mut MessageBuilder) -> &mut MessageBuilder) -> Self {
        let mut desc = MessageBuilder::new();
        f(&mut desc);
        self.desc = Some(desc.build());
        self
    }

    /// Set the description of this embed to a simple string
    #[must_use]
    pub fn desc_plain(self, c: impl Into<serenity::utils::Content>) -> Self {
        self.desc_rich(|mb| mb.push_safe(c))
    }

    /// Set the URL of this embed
    #[must_use]
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Set the primary color of this embed
    #[must_use]
    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the footer text of this embed
    #[must_use]
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    /// Add a field to this embed
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

impl From<Embed> for CreateEmbed {
    fn from(embed: Embed) -> Self {
        let Embed {
            title,
            desc,
            url,
            color,
            footer,
            fields,
        } = embed;
        let mut b = CreateEmbed::new();
        if let Some(title) = title {
            b = b.title(title);
        }
        if let Some(desc) = desc {
            b = b.description(desc);
        }
        if let Some(url) = url {
            b = b.url(url);
        }
        if let Some(color) = color {
            b = b.color(color);
        }
        if let Some(footer) = footer {
            b = b.footer(CreateEmbedFooter::new(footer));
        }
        b.fields(fields.into_iter().map(|f| (f.name, f.value, f.inline)))
    }
}
