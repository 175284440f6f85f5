//! Bot initialization and command definitions

use reqwest::ClientBuilder;
use secrecy::{ExposeSecret, SecretString};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config::Config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Send me a song name, or use:")]
pub enum Command {
    #[command(description = "what this bot does")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "search a song and send it as MP3, e.g. /song tarkan kuzu kuzu")]
    Song(String),
    // Turkish "şarkı", kept for existing users
    #[command(hide)]
    Sarki(String),
}

impl Command {
    /// Query text of a song command, `None` for the informational ones.
    pub fn song_query(&self) -> Option<&str> {
        match self {
            Command::Song(query) | Command::Sarki(query) => Some(query),
            Command::Start | Command::Help => None,
        }
    }
}

pub const START_TEXT: &str = "🎵 Hi! Send me a song name and I'll send it back as MP3.\n\nExample: tarkan kuzu kuzu";

/// Help text listing the visible commands.
pub fn help_text() -> String {
    format!(
        "{}\n\nPlain text works too: just write the song name.",
        Command::descriptions()
    )
}

/// Creates a Bot instance with custom or default API URL
///
/// The HTTP client timeout covers whole uploads, so it is taken from
/// `upload_timeout_secs`.
pub fn create_bot(token: &SecretString, config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config.upload_timeout()).build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    let bot = match &config.bot_api_url {
        Some(api_url) => {
            log::info!("Using custom Bot API URL: {}", api_url);
            let url = url::Url::parse(api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
