//! Attachment payloads: the channel contract is plain replies plus lists of
//! `{text, color, mrkdwn}` attachments.

use serde::Serialize;

use deadliner_core::digest::{DigestEntry, Urgency};
use deadliner_core::engine::HELP_TEXT;

pub const COLOR_WARNING: &str = "#ffff00";
pub const COLOR_CRITICAL: &str = "#ff0000";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub mrkdwn_in: Vec<String>,
}

impl Attachment {
    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self { text: text.into(), color: None, mrkdwn_in: vec!["text".to_string()] }
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }
}

pub fn color_for(urgency: Urgency) -> Option<&'static str> {
    match urgency {
        Urgency::Normal => None,
        Urgency::Warning => Some(COLOR_WARNING),
        Urgency::Critical => Some(COLOR_CRITICAL),
    }
}

pub fn from_digest(entries: &[DigestEntry]) -> Vec<Attachment> {
    entries
        .iter()
        .map(|entry| {
            let mut attachment = Attachment::mrkdwn(&entry.text);
            attachment.color = color_for(entry.urgency).map(str::to_string);
            attachment
        })
        .collect()
}

pub fn help_attachment() -> Attachment {
    Attachment::mrkdwn(HELP_TEXT)
}

#[cfg(test)]
mod tests {
    use deadliner_core::digest::{DigestEntry, Urgency};

    use super::{from_digest, help_attachment, Attachment, COLOR_CRITICAL, COLOR_WARNING};

    #[test]
    fn urgency_maps_to_the_expected_colors() {
        let entries = vec![
            DigestEntry { days: 0, text: "*CHI TODAY!*".to_string(), urgency: Urgency::Critical },
            DigestEntry { days: 3, text: "3 days until X".to_string(), urgency: Urgency::Warning },
            DigestEntry { days: 30, text: "30 days until Y".to_string(), urgency: Urgency::Normal },
        ];

        let attachments = from_digest(&entries);
        assert_eq!(attachments[0].color.as_deref(), Some(COLOR_CRITICAL));
        assert_eq!(attachments[1].color.as_deref(), Some(COLOR_WARNING));
        assert_eq!(attachments[2].color, None);
    }

    #[test]
    fn serialized_shape_matches_the_channel_contract() {
        let attachment = Attachment::mrkdwn("*X TODAY!*").with_color(COLOR_CRITICAL);
        let json = serde_json::to_value(&attachment).expect("serialize");

        assert_eq!(json["text"], "*X TODAY!*");
        assert_eq!(json["color"], "#ff0000");
        assert_eq!(json["mrkdwn_in"][0], "text");

        let plain = serde_json::to_value(Attachment::mrkdwn("hi")).expect("serialize");
        assert!(plain.get("color").is_none(), "unset color is omitted");
    }

    #[test]
    fn help_attachment_lists_the_command_vocabulary() {
        let help = help_attachment();
        assert!(help.text.contains("forget about conference"));
        assert!(help.text.contains("when does conference come back?"));
    }
}
