use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "service-scaffold", version, about = "Minimal HTTP service scaffold")]
pub struct Cli {
    /// Dotenv file loaded before reading the environment
    #[arg(short, long, default_value = ".env", global = true)]
    pub env_file: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Load and validate the configuration without starting the server
    Test,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Display the effective configuration (with secrets masked)
    Show,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_start() {
        let cli = Cli::try_parse_from(["service-scaffold"]).unwrap();

        assert!(matches!(cli.get_command(), Commands::Start));
        assert_eq!(cli.env_file, PathBuf::from(".env"));
    }

    #[test]
    fn test_cli_parsing_env_file_is_global() {
        let args = vec!["service-scaffold", "test", "--env-file", "conf/dev.env"];
        let cli = Cli::try_parse_from(args).unwrap();

        assert!(matches!(cli.get_command(), Commands::Test));
        assert_eq!(cli.env_file, PathBuf::from("conf/dev.env"));
    }

    #[test]
    fn test_cli_parsing_config_show() {
        let args = vec!["service-scaffold", "config", "show"];
        let cli = Cli::try_parse_from(args).unwrap();

        match cli.get_command() {
            Commands::Config { action } => {
                assert!(matches!(action, ConfigCommands::Show));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["service-scaffold", "stop"]).is_err());
    }
}
