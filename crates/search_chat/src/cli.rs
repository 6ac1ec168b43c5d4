use clap::{Parser, Subcommand};
use llm::ProviderId;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Mode {
    /// Interactive chat (default)
    Chat,

    /// Send one prompt and stream the answer to stdout
    Ask {
        prompt: String,

        /// Ground the answer in web search results
        #[arg(long)]
        search: bool,
    },

    /// Inspect or change the stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Call the relay endpoint directly
    Relay {
        #[command(subcommand)]
        action: RelayAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum SettingsAction {
    /// Print all settings, credentials masked
    Show,
    /// Save one setting
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RelayAction {
    /// Check that the relay answers
    Test,
    /// Fetch a page through the relay
    Scrape { url: String },
    /// Send an email through the relay
    Email {
        to: String,
        subject: String,
        body: String,
    },
}

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Option<Mode>,

    /// Model to chat with
    #[arg(short = 'p', long, default_value = "gemini")]
    pub provider: ProviderId,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Directory holding settings and saved conversations
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl Args {
    pub fn parse() -> Self {
        <Args as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_args_parsing() {
        let args = Args::try_parse_from(["test"]).expect("Failed to parse default args");

        assert_eq!(args.mode, None);
        assert_eq!(args.provider, ProviderId::Gemini);
        assert_eq!(args.verbose, 0);
        assert_eq!(args.data_dir, None);
    }

    #[test]
    fn test_verbose_flag_counting() {
        let args = Args::try_parse_from(["test", "-vv"]).expect("Failed to parse verbose args");
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_provider_selection() {
        let args = Args::try_parse_from(["test", "-p", "openrouter"])
            .expect("Failed to parse provider");
        assert_eq!(args.provider, ProviderId::OpenRouter);

        assert!(Args::try_parse_from(["test", "--provider", "claude"]).is_err());
    }

    #[test]
    fn test_ask_mode() {
        let args = Args::try_parse_from(["test", "ask", "capital of Mongolia", "--search"])
            .expect("Failed to parse ask args");

        assert_eq!(
            args.mode,
            Some(Mode::Ask {
                prompt: "capital of Mongolia".to_string(),
                search: true,
            })
        );
    }

    #[test]
    fn test_settings_set_mode() {
        let args = Args::try_parse_from([
            "test",
            "--data-dir",
            "/tmp/chat",
            "settings",
            "set",
            "relay_url",
            "https://script.example.com/exec",
        ])
        .expect("Failed to parse settings args");

        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/chat")));
        match args.mode {
            Some(Mode::Settings {
                action: SettingsAction::Set { key, value },
            }) => {
                assert_eq!(key, "relay_url");
                assert_eq!(value, "https://script.example.com/exec");
            }
            other => panic!("Expected settings set, got {other:?}"),
        }
    }

    #[test]
    fn test_relay_email_mode() {
        let args = Args::try_parse_from([
            "test", "relay", "email", "ana@example.com", "Hola", "<p>Hola</p>",
        ])
        .expect("Failed to parse relay args");

        assert!(matches!(
            args.mode,
            Some(Mode::Relay {
                action: RelayAction::Email { .. }
            })
        ));
    }
}
