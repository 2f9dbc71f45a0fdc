use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardButton {
    pub title: String,
    pub url: String,
}

impl CardButton {
    pub fn open_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { title: title.into(), url: url.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Card {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<CardButton>,
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }

    pub fn button(mut self, button: CardButton) -> Self {
        self.buttons.push(button);
        self
    }

    /// Plain-text rendering for channels without rich attachments.
    pub fn summary(&self) -> String {
        [Some(self.title.as_str()), self.subtitle.as_deref(), self.text.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentLayout {
    #[default]
    List,
    Carousel,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Card>,
    pub layout: AttachmentLayout,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        ReplyBuilder::new().text(text).build()
    }

    pub fn card(card: Card) -> Self {
        ReplyBuilder::new().attachment(card).build()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attachments.is_empty()
    }

    /// Everything the reply says, flattened to text.
    pub fn fallback_text(&self) -> String {
        self.text
            .iter()
            .cloned()
            .chain(self.attachments.iter().map(Card::summary))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Default)]
pub struct ReplyBuilder {
    text: Option<String>,
    attachments: Vec<Card>,
    layout: AttachmentLayout,
}

impl ReplyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attachment(mut self, card: Card) -> Self {
        self.attachments.push(card);
        self
    }

    pub fn carousel(mut self) -> Self {
        self.layout = AttachmentLayout::Carousel;
        self
    }

    pub fn build(self) -> Reply {
        Reply { text: self.text, attachments: self.attachments, layout: self.layout }
    }
}

#[cfg(test)]
mod tests {
    use super::{AttachmentLayout, Card, CardButton, Reply, ReplyBuilder};

    #[test]
    fn fallback_text_includes_card_summaries() {
        let reply = ReplyBuilder::new()
            .text("I found 2 books")
            .attachment(Card::new("Drama Book 1").subtitle("4 stars"))
            .attachment(Card::new("Drama Book 2"))
            .carousel()
            .build();

        assert_eq!(reply.layout, AttachmentLayout::Carousel);
        assert_eq!(reply.fallback_text(), "I found 2 books\n\nDrama Book 1\n4 stars\n\nDrama Book 2");
    }

    #[test]
    fn card_serialization_skips_empty_parts() {
        let reply = Reply::card(
            Card::new("Order number 12345")
                .button(CardButton::open_url("Track", "https://example.com/12345")),
        );
        let json = serde_json::to_value(&reply).expect("reply serializes");

        assert!(json.get("text").is_none());
        assert_eq!(json["attachments"][0]["title"], "Order number 12345");
        assert!(json["attachments"][0].get("images").is_none());
    }

    #[test]
    fn empty_reply_is_detected() {
        assert!(Reply::default().is_empty());
        assert!(!Reply::text("hi").is_empty());
    }
}
