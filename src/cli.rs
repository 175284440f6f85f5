use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tunefetch")]
#[command(author, version, about = "Telegram bot that turns a song name into an MP3 attachment", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file (defaults to ./tunefetch.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the bot (default)
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Print search candidates and the one that would be picked
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Run the whole pipeline without Telegram and save the MP3 locally
    Fetch {
        #[arg(required = true)]
        query: Vec<String>,

        /// Directory the audio file is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_no_subcommand() {
        let cli = Cli::try_parse_from(["tunefetch"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_run_webhook_with_config() {
        let cli = Cli::try_parse_from(["tunefetch", "run", "--webhook", "--config", "bot.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Run { webhook: true }));
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::try_parse_from(["tunefetch", "fetch", "tarkan", "kuzu", "kuzu", "-o", "/tmp/out"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Fetch {
                query: vec!["tarkan".into(), "kuzu".into(), "kuzu".into()],
                output: PathBuf::from("/tmp/out"),
            })
        );
        assert!(Cli::try_parse_from(["tunefetch", "search"]).is_err());
    }
}
