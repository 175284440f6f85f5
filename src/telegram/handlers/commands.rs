//! Command and text handler implementations

use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::Instrument;

use super::types::{strip_bot_mention, HandlerDeps, HandlerError};
use crate::core::types::SongRequest;
use crate::telegram::bot::{help_text, Command, START_TEXT};
use crate::telegram::transport::TelegramTransport;

fn requester_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(msg.chat.id.0)
}

/// Handle a parsed bot command
pub(super) async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: HandlerDeps) -> Result<(), HandlerError> {
    log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);

    match cmd.song_query() {
        Some(query) => {
            let args: Vec<&str> = query.split_whitespace().collect();
            let request = SongRequest::from_command_args(&args, requester_id(&msg));
            run_song_request(bot, &msg, request, &deps).await;
        }
        None if cmd == Command::Start => {
            bot.send_message(msg.chat.id, START_TEXT).await?;
        }
        None => {
            bot.send_message(msg.chat.id, help_text()).await?;
        }
    }
    Ok(())
}

/// Handle a plain text message as a song query
pub(super) async fn handle_text(bot: Bot, msg: Message, deps: HandlerDeps) -> Result<(), HandlerError> {
    let text = msg.text().unwrap_or_default();
    let query = strip_bot_mention(text, deps.bot_username.as_deref());
    let request = SongRequest::new(query, requester_id(&msg));
    run_song_request(bot, &msg, request, &deps).await;
    Ok(())
}

async fn run_song_request(bot: Bot, msg: &Message, request: SongRequest, deps: &HandlerDeps) {
    let transport = TelegramTransport::new(bot, msg.chat.id);
    let span = tracing::info_span!("song_request", chat_id = msg.chat.id.0, requester = request.requester_id);
    let outcome = deps.pipeline.handle(&request, &transport).instrument(span).await;
    log::info!("Request in chat {} finished: {}", msg.chat.id, outcome);
}
