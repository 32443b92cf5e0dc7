use mail_parser::{Addr, MessageParser, MessagePart, MimeHeaders, PartType};

/// Normalized view of one fetched message, reduced to the fields the
/// matching rule and the alert need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMessage {
    /// Decoded subject with all CR/LF stripped (header values must not
    /// carry raw line breaks). Empty when the message has no subject.
    pub subject: String,
    /// Decoded text body, empty when no decodable text part exists.
    pub body: String,
    /// Text subtype of the body ("plain", "html", ...), `None` when no
    /// text part was found.
    pub body_kind: Option<String>,
    /// Decoded From header, or the literal "None" when absent.
    pub sender: String,
}

/// Decode a raw RFC 822 blob into a `NormalizedMessage`.
///
/// Multipart messages are walked in document order and every text part
/// overwrites the body, so the last text part wins. A message that fails
/// to parse degrades to empty fields rather than an error; one malformed
/// message must never take down a whole pass.
pub fn decode_message(raw: &[u8]) -> NormalizedMessage {
    let parsed = match MessageParser::default().parse(raw) {
        Some(parsed) => parsed,
        None => {
            log::warn!("Message could not be parsed, treating as empty");
            return NormalizedMessage {
                sender: "None".to_string(),
                ..Default::default()
            };
        }
    };

    let subject = parsed
        .subject()
        .map(|s| s.replace(['\r', '\n'], "").trim().to_string())
        .unwrap_or_default();

    let sender = parsed
        .from()
        .and_then(|address| address.first())
        .map(format_addr)
        .unwrap_or_else(|| "None".to_string());

    let mut body = String::new();
    let mut body_kind = None;
    for part in &parsed.parts {
        match &part.body {
            PartType::Text(text) => {
                body = text.to_string();
                body_kind = Some(text_subtype(part).unwrap_or("plain").to_string());
            }
            PartType::Html(html) => {
                body = html.to_string();
                body_kind = Some("html".to_string());
            }
            _ => {}
        }
    }

    NormalizedMessage {
        subject,
        body,
        body_kind,
        sender,
    }
}

fn format_addr(addr: &Addr) -> String {
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(address)) => format!("{name} <{address}>"),
        (None, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => "None".to_string(),
    }
}

fn text_subtype<'a>(part: &'a MessagePart<'a>) -> Option<&'a str> {
    part.content_type().and_then(|ct| ct.subtype())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_part_plain_text() {
        let raw = b"From: Alice <alice@example.com>\r\n\
Subject: Disk alert\r\n\
Content-Type: text/plain\r\n\
\r\n\
disk usage above threshold\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.subject, "Disk alert");
        assert_eq!(msg.sender, "Alice <alice@example.com>");
        assert_eq!(msg.body.trim_end(), "disk usage above threshold");
        assert_eq!(msg.body_kind.as_deref(), Some("plain"));
    }

    #[test]
    fn test_multipart_last_text_part_wins() {
        let raw = b"From: a@example.com\r\n\
Subject: Two parts\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"sep\"\r\n\
\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
first\r\n\
--sep\r\n\
Content-Type: text/plain\r\n\
\r\n\
second\r\n\
--sep--\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.body.trim_end(), "second");
    }

    #[test]
    fn test_html_part_sets_body_kind() {
        let raw = b"From: a@example.com\r\n\
Subject: Markup\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>hello</p>\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.body_kind.as_deref(), Some("html"));
        assert!(msg.body.contains("hello"));
    }

    #[test]
    fn test_non_text_single_part_leaves_body_empty() {
        let raw = b"From: a@example.com\r\n\
Subject: Binary only\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAECAwQ=\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.body, "");
        assert!(msg.body_kind.is_none());
    }

    #[test]
    fn test_subject_line_breaks_are_stripped() {
        // base64 of "Alert\nwith\rbreaks"
        let raw = b"From: a@example.com\r\n\
Subject: =?utf-8?B?QWxlcnQKd2l0aA1icmVha3M=?=\r\n\
Content-Type: text/plain\r\n\
\r\n\
body\r\n";
        let msg = decode_message(raw);
        assert!(!msg.subject.contains('\n'));
        assert!(!msg.subject.contains('\r'));
        assert_eq!(msg.subject, "Alertwithbreaks");
    }

    #[test]
    fn test_missing_sender_becomes_none_literal() {
        let raw = b"Subject: Orphan\r\n\
Content-Type: text/plain\r\n\
\r\n\
body\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.sender, "None");
    }

    #[test]
    fn test_missing_subject_becomes_empty() {
        let raw = b"From: a@example.com\r\n\
Content-Type: text/plain\r\n\
\r\n\
body\r\n";
        let msg = decode_message(raw);
        assert_eq!(msg.subject, "");
    }

    #[test]
    fn test_garbage_input_does_not_panic() {
        let msg = decode_message(&[0xff, 0xfe, 0x00, 0x01]);
        assert_eq!(msg.sender, "None");
        assert_eq!(msg.subject, "");
    }
}
