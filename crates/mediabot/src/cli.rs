use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mediabot")]
#[command(author, version, about = "Telegram bot that renames, trims, compresses and merges media files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Verify that ffmpeg and ffprobe are on PATH
    CheckTools,

    /// Create or migrate the settings database and exit
    Migrate {
        /// Database file, defaults to DATABASE_PATH
        #[arg(short, long)]
        database: Option<String>,
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
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::try_parse_from(["mediabot"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["mediabot", "check-tools"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckTools));

        let cli = Cli::try_parse_from(["mediabot", "migrate", "--database", "/tmp/x.sqlite"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Migrate {
                database: Some("/tmp/x.sqlite".to_string())
            })
        );
    }
}
