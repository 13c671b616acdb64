//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for chatwire
#[derive(Parser, Debug)]
#[command(name = "chatwire")]
#[command(author, version, about = "Chat with coding agents, including Aider, from the terminal")]
#[command(long_about = r#"
chatwire routes each chat message to an agent and streams its answer.

Agents:
  @Coding     answers coding questions with a language model
  @Command    finds the editor command matching a request
  @Aider      edits files in the workspace through Aider
  @Delegator  picks one of the above (used when no agent is mentioned)

Configuration files are loaded from (in priority order):
1. CHATWIRE_* environment variables (CHATWIRE_AIDER__COMMAND=...)
2. --config <path>     Explicit config file
3. ./chatwire.toml     Project-level config
4. ~/.config/chatwire/config.toml   Global config

Example:
  chatwire "@Coding how do I read a file line by line in Rust?"
  chatwire --agent Aider "add a --quiet flag to main.rs"
  chatwire
"#)]
pub struct Cli {
    /// Message to send; starts the interactive chat when omitted
    pub message: Option<String>,

    /// Agent to use when the message mentions none
    #[arg(short, long, value_name = "ID")]
    pub agent: Option<String>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Do not start the Aider agent
    #[arg(long)]
    pub no_aider: bool,

    /// List the registered agents and exit
    #[arg(long)]
    pub list_agents: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_one_shot_with_agent() {
        let cli = Cli::parse_from(["chatwire", "-vv", "--agent", "Aider", "fix it"]);
        assert_eq!(cli.message.as_deref(), Some("fix it"));
        assert_eq!(cli.agent.as_deref(), Some("Aider"));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.no_aider);
    }

    #[test]
    fn test_no_message_means_chat() {
        let cli = Cli::parse_from(["chatwire", "--no-config", "--log-file", "/tmp/chatwire.log"]);
        assert!(cli.message.is_none());
        assert!(cli.no_config);
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/chatwire.log")));
    }
}
