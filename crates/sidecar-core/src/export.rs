//! Markdown transcript export.

use chrono::{DateTime, Local};

use crate::session::{Message, Role};

/// Render `messages` as a Markdown document stamped with `generated_at`.
pub fn generate_markdown(messages: &[Message], generated_at: DateTime<Local>) -> String {
    let mut markdown = format!(
        "# Chat History - Gemini Code Sidecar\n**Date:** {}\n\n---\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    for message in messages {
        let title = match message.role {
            Role::System => {
                markdown.push_str(&format!("> **System**: {}\n\n", message.content));
                continue;
            }
            Role::User => "👤 User",
            Role::Model => "🤖 Model",
        };

        markdown.push_str(&format!("## {}\n\n", title));

        if !message.attachments().is_empty() {
            markdown.push_str("**Attachments:**\n");
            for attachment in message.attachments() {
                markdown.push_str(&format!(
                    "- [Attachment: {}] ({})\n",
                    attachment.name, attachment.mime_type
                ));
            }
            markdown.push('\n');
        }

        markdown.push_str(&format!("{}\n\n", message.content));

        let links: Vec<String> = message
            .grounding_metadata
            .iter()
            .flat_map(|metadata| metadata.web_sources())
            .map(|web| {
                let title = if web.title.is_empty() { "Source" } else { web.title.as_str() };
                format!("- [{}]({})", title, web.uri)
            })
            .collect();
        if !links.is_empty() {
            markdown.push_str(&format!("**Sources:**\n{}\n\n", links.join("\n")));
        }

        markdown.push_str("---\n\n");
    }

    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Attachment, GroundingChunk, GroundingMetadata, WebSource};
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn renders_header_and_roles() {
        let messages = vec![
            Message::system("✅ Settings saved."),
            Message::user("How?", vec![Attachment::new("diagram.png", "image/png", "QUJD")]),
            Message::model("Like this."),
        ];

        let markdown = generate_markdown(&messages, fixed_time());

        assert!(markdown.starts_with("# Chat History - Gemini Code Sidecar\n**Date:** 2024-05-01 09:30:00\n\n---\n\n"));
        assert!(markdown.contains("> **System**: ✅ Settings saved.\n\n"));
        assert!(markdown.contains("## 👤 User\n\n**Attachments:**\n- [Attachment: diagram.png] (image/png)\n\nHow?\n\n---\n\n"));
        assert!(markdown.contains("## 🤖 Model\n\nLike this.\n\n---\n\n"));
    }

    #[test]
    fn lists_grounding_sources_with_uri() {
        let mut model = Message::model("Answer");
        model.grounding_metadata = Some(GroundingMetadata {
            grounding_chunks: Some(vec![
                GroundingChunk {
                    web: Some(WebSource {
                        uri: "https://docs.rs".into(),
                        title: String::new(),
                    }),
                },
                GroundingChunk {
                    web: Some(WebSource {
                        uri: String::new(),
                        title: "No link".into(),
                    }),
                },
                GroundingChunk { web: None },
            ]),
            ..GroundingMetadata::default()
        });

        let markdown = generate_markdown(&[model], fixed_time());
        assert!(markdown.contains("**Sources:**\n- [Source](https://docs.rs)\n\n"));
        assert!(!markdown.contains("No link"));
    }

    #[test]
    fn empty_transcript_is_header_only() {
        let markdown = generate_markdown(&[], fixed_time());
        assert!(markdown.ends_with("---\n\n"));
        assert!(!markdown.contains("##"));
    }
}
