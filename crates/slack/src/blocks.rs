use serde::Serialize;

use coverquote_core::ports::{SlackPost, SlackSeverity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        block_id: String,
        text: TextObject,
    },
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Divider,
}

/// Legacy attachment wrapper; Slack only renders the colour bar through it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub blocks: Vec<Block>,
}

/// Incoming-webhook payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub channel: String,
    /// Notification and accessibility fallback.
    pub text: String,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

pub struct MessageBuilder {
    channel: String,
    fallback_text: String,
    blocks: Vec<Block>,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    pub fn new(channel: impl Into<String>, fallback_text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            fallback_text: fallback_text.into(),
            blocks: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build(block_id.into()));
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn divider(mut self) -> Self {
        self.blocks.push(Block::Divider);
        self
    }

    pub fn attachment(mut self, color: impl Into<String>, blocks: Vec<Block>) -> Self {
        self.attachments.push(Attachment { color: color.into(), blocks });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            channel: self.channel,
            text: self.fallback_text,
            blocks: self.blocks,
            attachments: self.attachments,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(format!("*{label}*\n{value}")));
        self
    }

    fn build(self, block_id: String) -> Block {
        let text = match (self.text, self.fields.is_empty()) {
            (None, true) => Some(TextObject::plain(" ")),
            (text, _) => text,
        };
        Block::Section { block_id, text, fields: self.fields }
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn severity_emoji(severity: SlackSeverity) -> &'static str {
    match severity {
        SlackSeverity::Celebrate => ":tada:",
        SlackSeverity::Ok => ":white_check_mark:",
        SlackSeverity::Warning => ":warning:",
        SlackSeverity::Error => ":rotating_light:",
    }
}

pub fn severity_color(severity: SlackSeverity) -> &'static str {
    match severity {
        SlackSeverity::Celebrate => "#7b3fe4",
        SlackSeverity::Ok => "#2eb886",
        SlackSeverity::Warning => "#daa038",
        SlackSeverity::Error => "#d40e0d",
    }
}

/// Section blocks hold at most ten fields.
const MAX_SECTION_FIELDS: usize = 10;

pub fn notification_message(post: &SlackPost) -> MessageTemplate {
    let emoji = severity_emoji(post.severity);
    let builder = MessageBuilder::new(&post.channel, format!("{emoji} {}", post.message))
        .section("notification.message.v1", |section| {
            section.mrkdwn(format!("{emoji} {}", post.message));
        });

    let Some(attachment) = post.attachment.as_ref() else {
        return builder.build();
    };

    let mut blocks = Vec::new();
    if !attachment.title.is_empty() {
        blocks.push(Block::Section {
            block_id: "notification.attachment.title.v1".to_owned(),
            text: Some(TextObject::mrkdwn(format!("*{}*", attachment.title))),
            fields: Vec::new(),
        });
    }
    for (index, chunk) in attachment.fields.chunks(MAX_SECTION_FIELDS).enumerate() {
        let mut section = SectionBuilder::default();
        for (label, value) in chunk {
            section.field(label, value);
        }
        blocks.push(section.build(format!("notification.attachment.fields.{index}.v1")));
    }

    builder.attachment(severity_color(post.severity), blocks).build()
}
