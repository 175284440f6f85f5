//! Handler types, dependencies, and message addressing helpers

use std::sync::Arc;

use teloxide::types::{ChatKind, Message, MessageEntityKind, UserId};

use crate::download::Pipeline;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub pipeline: Arc<Pipeline>,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
}

impl HandlerDeps {
    pub fn new(pipeline: Arc<Pipeline>, bot_username: Option<String>, bot_id: UserId) -> Self {
        Self {
            pipeline,
            bot_username,
            bot_id,
        }
    }
}

/// Checks if a message is addressed to the bot
///
/// True in private chats, for replies to the bot, and for messages that
/// mention the bot by username.
pub fn is_message_addressed_to_bot(msg: &Message, bot_username: Option<&str>, bot_id: UserId) -> bool {
    if matches!(msg.chat.kind, ChatKind::Private(_)) {
        return true;
    }

    if let Some(from) = msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
        if from.id == bot_id {
            return true;
        }
    }

    let (Some(text), Some(username)) = (msg.text(), bot_username) else {
        return false;
    };

    let mentioned = msg
        .parse_entities()
        .unwrap_or_default()
        .iter()
        .filter(|entity| matches!(entity.kind(), MessageEntityKind::Mention))
        .any(|entity| {
            entity
                .text()
                .strip_prefix('@')
                .is_some_and(|name| name.eq_ignore_ascii_case(username))
        });

    mentioned || text.contains(&format!("@{}", username))
}

/// Removes `@botname` from group messages so it does not end up in the query.
pub fn strip_bot_mention(text: &str, bot_username: Option<&str>) -> String {
    match bot_username {
        Some(username) => {
            let mention = format!("@{}", username);
            text.split_whitespace()
                .filter(|word| !word.eq_ignore_ascii_case(&mention))
                .collect::<Vec<_>>()
                .join(" ")
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bot_mention() {
        assert_eq!(
            strip_bot_mention("@TuneFetch_Bot tarkan kuzu kuzu", Some("tunefetch_bot")),
            "tarkan kuzu kuzu"
        );
        assert_eq!(strip_bot_mention("tarkan @someone", Some("tunefetch_bot")), "tarkan @someone");
        assert_eq!(strip_bot_mention("  as is ", None), "  as is ");
    }
}
