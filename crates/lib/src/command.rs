//! Command grammar and intent parser: raw chat text -> [`ParsedCommand`].
//!
//! The grammar is an ordered table of rules. Each rule either extracts a command from the
//! trimmed input or declines; the first rule that matches wins and anything no rule accepts
//! is plain chat, so parsing never fails.
//!
//! Keywords match case-insensitively on whole words. Slot values (recipient, subject, body,
//! query, message id) are sliced from the original text: casing and inner whitespace are kept,
//! only outer whitespace is trimmed.

use serde::{Deserialize, Serialize};

use crate::llm::Provider;

/// Classified intent of one chat message with its extracted slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedCommand {
    SendEmail {
        recipient: String,
        subject: String,
        body: String,
    },
    DeleteEmail {
        message_id: String,
    },
    ListEmails {
        query: String,
    },
    PlainChat {
        text: String,
        provider: Provider,
    },
}

impl ParsedCommand {
    /// Intent name, as used in logs and the `action.type` field.
    pub fn intent(&self) -> &'static str {
        match self {
            ParsedCommand::SendEmail { .. } => "send_email",
            ParsedCommand::DeleteEmail { .. } => "delete_email",
            ParsedCommand::ListEmails { .. } => "list_emails",
            ParsedCommand::PlainChat { .. } => "plain_chat",
        }
    }
}

/// One grammar rule: a name for logs and a pure extraction function.
struct Rule {
    name: &'static str,
    extract: fn(&str) -> Option<ParsedCommand>,
}

/// Email command shapes, most specific first.
const GRAMMAR: &[Rule] = &[
    Rule {
        name: "send_with_subject_and_body",
        extract: send_with_subject_and_body,
    },
    Rule {
        name: "send_with_body",
        extract: send_with_body,
    },
    Rule {
        name: "send_with_message",
        extract: send_with_message,
    },
    Rule {
        name: "send_with_trailing_text",
        extract: send_with_trailing_text,
    },
    Rule {
        name: "send_without_recipient",
        extract: send_without_recipient,
    },
    Rule {
        name: "delete_email",
        extract: delete_email,
    },
    Rule {
        name: "list_emails",
        extract: list_emails,
    },
];

/// Parse with the default chat provider for the plain-chat fallback.
pub fn parse(raw: &str) -> ParsedCommand {
    parse_for(raw, Provider::default())
}

/// Parse a raw chat message. Text no rule accepts becomes `PlainChat` carrying `provider`.
pub fn parse_for(raw: &str, provider: Provider) -> ParsedCommand {
    match match_rule(raw) {
        Some((rule, command)) => {
            log::debug!("command: matched rule {}", rule);
            command
        }
        None => ParsedCommand::PlainChat {
            text: raw.to_string(),
            provider,
        },
    }
}

/// First matching rule and its command, or None for plain chat.
fn match_rule(raw: &str) -> Option<(&'static str, ParsedCommand)> {
    let input = raw.trim();
    GRAMMAR
        .iter()
        .find_map(|rule| (rule.extract)(input).map(|cmd| (rule.name, cmd)))
}

/// `send email to <recipient> subject <subject> body <body>`
fn send_with_subject_and_body(input: &str) -> Option<ParsedCommand> {
    let (recipient, rest) = send_recipient(input)?;
    let after_subject = strip_keyword(rest, "subject")?;
    let (subject, body) = split_at_keyword(after_subject, "body")?;
    Some(send(recipient, subject, body))
}

/// `send email to <recipient> body <body>`
fn send_with_body(input: &str) -> Option<ParsedCommand> {
    let (recipient, rest) = send_recipient(input)?;
    let body = strip_keyword(rest, "body")?;
    Some(send(recipient, "", body))
}

/// `send email to <recipient> message <body>`
fn send_with_message(input: &str) -> Option<ParsedCommand> {
    let (recipient, rest) = send_recipient(input)?;
    let body = strip_keyword(rest, "message")?;
    Some(send(recipient, "", body))
}

/// `send email to <recipient> <body>`: whatever follows the recipient is the body.
fn send_with_trailing_text(input: &str) -> Option<ParsedCommand> {
    let (recipient, rest) = send_recipient(input)?;
    Some(send(recipient, "", rest))
}

/// `send email` or `send email to` with nothing after: recognized but incomplete.
fn send_without_recipient(input: &str) -> Option<ParsedCommand> {
    let rest = strip_keyword(input, "send email")?;
    let rest = strip_keyword(rest, "to").unwrap_or(rest);
    if !rest.trim().is_empty() {
        return None;
    }
    Some(send("", "", ""))
}

/// `delete email <messageId>`; the id may be empty.
fn delete_email(input: &str) -> Option<ParsedCommand> {
    let rest = strip_keyword(input, "delete email")?;
    Some(ParsedCommand::DeleteEmail {
        message_id: rest.trim().to_string(),
    })
}

/// `list emails [query]`
fn list_emails(input: &str) -> Option<ParsedCommand> {
    let rest = strip_keyword(input, "list emails")?;
    Some(ParsedCommand::ListEmails {
        query: rest.trim().to_string(),
    })
}

fn send(recipient: &str, subject: &str, body: &str) -> ParsedCommand {
    ParsedCommand::SendEmail {
        recipient: recipient.trim().to_string(),
        subject: subject.trim().to_string(),
        body: body.trim().to_string(),
    }
}

/// After `send email to`, the first word is the recipient. Returns (recipient, rest).
fn send_recipient(input: &str) -> Option<(&str, &str)> {
    let rest = strip_keyword(input, "send email to")?;
    split_first_word(rest)
}

/// Match a (possibly multi-word) keyword at the start of `text`, ignoring ASCII case and
/// leading whitespace. Each word must end at whitespace or end of input. Returns the remainder.
fn strip_keyword<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let mut rest = text;
    for word in keyword.split_whitespace() {
        rest = rest.trim_start();
        let head = rest.get(..word.len())?;
        if !head.eq_ignore_ascii_case(word) {
            return None;
        }
        rest = &rest[word.len()..];
        if !starts_at_boundary(rest) {
            return None;
        }
    }
    Some(rest)
}

/// First whitespace-delimited word and the text after it. None when `text` is blank.
fn split_first_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(i) => Some((&text[..i], &text[i..])),
        None => Some((text, "")),
    }
}

/// Split at the first standalone occurrence of `keyword` (whitespace before it, whitespace or
/// end after it). Returns (before, after).
fn split_at_keyword<'a>(text: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let folded = text.to_ascii_lowercase();
    let keyword = keyword.to_ascii_lowercase();
    folded.match_indices(&keyword).find_map(|(i, _)| {
        let before = &text[..i];
        let after = &text[i + keyword.len()..];
        let bounded_before = before.chars().next_back().is_some_and(char::is_whitespace);
        (bounded_before && starts_at_boundary(after)).then_some((before, after))
    })
}

fn starts_at_boundary(rest: &str) -> bool {
    rest.chars().next().map_or(true, char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send_cmd(recipient: &str, subject: &str, body: &str) -> ParsedCommand {
        ParsedCommand::SendEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn subject_and_body_win_over_looser_rules() {
        assert_eq!(
            parse("send email to a@b.com subject S body B"),
            send_cmd("a@b.com", "S", "B")
        );
        assert_eq!(
            match_rule("send email to a@b.com subject S body B").map(|(r, _)| r),
            Some("send_with_subject_and_body")
        );
    }

    #[test]
    fn slots_keep_casing_and_inner_whitespace() {
        assert_eq!(
            parse("  SEND Email TO Bob@Example.com Subject  Quarterly   Report  BODY Hello  There,\n  Bob  "),
            send_cmd("Bob@Example.com", "Quarterly   Report", "Hello  There,\n  Bob")
        );
    }

    #[test]
    fn body_keyword_only() {
        assert_eq!(
            parse("send email to a@b.com body see you at 5"),
            send_cmd("a@b.com", "", "see you at 5")
        );
    }

    #[test]
    fn message_keyword() {
        assert_eq!(
            parse("send email to a@b.com message running late"),
            send_cmd("a@b.com", "", "running late")
        );
    }

    #[test]
    fn trailing_text_is_body() {
        assert_eq!(
            parse("send email to a@b.com just text"),
            send_cmd("a@b.com", "", "just text")
        );
        assert_eq!(parse("send email to a@b.com"), send_cmd("a@b.com", "", ""));
    }

    #[test]
    fn subject_without_body_keyword_falls_to_trailing_text() {
        assert_eq!(
            parse("send email to a@b.com subject Hi there"),
            send_cmd("a@b.com", "", "subject Hi there")
        );
    }

    #[test]
    fn body_keyword_must_be_a_whole_word() {
        assert_eq!(
            parse("send email to a@b.com subject Somebody body hi"),
            send_cmd("a@b.com", "Somebody", "hi")
        );
        assert_eq!(
            parse("send email to a@b.com bodyguard needed"),
            send_cmd("a@b.com", "", "bodyguard needed")
        );
    }

    #[test]
    fn body_may_contain_keywords() {
        assert_eq!(
            parse("send email to a@b.com subject S body the body of the message"),
            send_cmd("a@b.com", "S", "the body of the message")
        );
    }

    #[test]
    fn malformed_recipient_passes_through() {
        assert_eq!(parse("send email to not-an-address hi"), send_cmd("not-an-address", "", "hi"));
    }

    #[test]
    fn missing_recipient_is_incomplete_send() {
        assert_eq!(parse("send email"), send_cmd("", "", ""));
        assert_eq!(parse("Send Email To   "), send_cmd("", "", ""));
    }

    #[test]
    fn send_email_needs_word_boundaries() {
        assert!(matches!(parse("send emails to everyone"), ParsedCommand::PlainChat { .. }));
        assert!(matches!(parse("send email templates please"), ParsedCommand::PlainChat { .. }));
        assert!(matches!(parse("send email tomorrow"), ParsedCommand::PlainChat { .. }));
    }

    #[test]
    fn delete_with_and_without_id() {
        assert_eq!(
            parse("delete email abc123"),
            ParsedCommand::DeleteEmail {
                message_id: "abc123".to_string()
            }
        );
        assert_eq!(
            parse("DELETE EMAIL   18c2F0a  "),
            ParsedCommand::DeleteEmail {
                message_id: "18c2F0a".to_string()
            }
        );
        assert_eq!(
            parse("delete email"),
            ParsedCommand::DeleteEmail {
                message_id: String::new()
            }
        );
    }

    #[test]
    fn list_with_and_without_query() {
        assert_eq!(
            parse("list emails from:me"),
            ParsedCommand::ListEmails {
                query: "from:me".to_string()
            }
        );
        assert_eq!(
            parse("List Emails"),
            ParsedCommand::ListEmails {
                query: String::new()
            }
        );
        assert_eq!(
            parse("list emails is:unread  subject:Invoice"),
            ParsedCommand::ListEmails {
                query: "is:unread  subject:Invoice".to_string()
            }
        );
    }

    #[test]
    fn everything_else_is_plain_chat() {
        for raw in [
            "hello there",
            "",
            "   ",
            "please send email to bob",
            "list email",
            "deleted emails",
            "ünïcödé ✉",
        ] {
            let cmd = parse_for(raw, Provider::Gemini);
            assert_eq!(
                cmd,
                ParsedCommand::PlainChat {
                    text: raw.to_string(),
                    provider: Provider::Gemini
                },
                "input {:?}",
                raw
            );
            assert_eq!(cmd.intent(), "plain_chat");
        }
    }

    #[test]
    fn non_ascii_input_never_panics() {
        for raw in ["s", "sé", "send émail to x", "delete emaïl", "send email to ä subject ö body ü"] {
            let _ = parse(raw);
        }
        assert_eq!(parse("send email to ä subject ö body ü"), send_cmd("ä", "ö", "ü"));
    }

    #[test]
    fn action_serializes_with_type_tag() {
        let v = serde_json::to_value(parse("delete email x1")).unwrap();
        assert_eq!(v["type"], "delete_email");
        assert_eq!(v["message_id"], "x1");
        let v = serde_json::to_value(parse("hi")).unwrap();
        assert_eq!(v["type"], "plain_chat");
        assert_eq!(v["provider"], "openai");
    }
}
