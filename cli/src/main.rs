//! CLI entrypoint for chatwire
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Result, anyhow};
use chatwire_application::{
    AiderChatAgent, ChatAgent, ChatAgentService, ChatService, CodingChatAgent, CommandChatAgent,
    ConversationLogger, DelegatingChatAgent, LanguageModelRegistry, NoConversationLogger,
    StaticPreferences,
};
use chatwire_infrastructure::{
    AiderConnectorImpl, ConfigLoader, FileConfig, JsonlConversationLogger, PurposeRouter,
    StaticCommandRegistry,
};
use chatwire_presentation::{ChatRepl, Cli, ConsoleFormatter};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("{}", e))?
    };

    let log_file = cli
        .log_file
        .as_deref()
        .or(config.logging.log_file.as_deref().map(Path::new));
    let _log_guard = init_tracing(cli.verbose, log_file)?;

    config.validate()?;
    info!("Starting chatwire");

    // === Dependency Injection ===
    let logger: Arc<dyn ConversationLogger> = match &config.logging.conversation_log {
        Some(path) => match JsonlConversationLogger::open(path) {
            Ok(logger) => Arc::new(logger),
            Err(e) => {
                warn!(path = %path, error = %e, "Conversation log disabled");
                Arc::new(NoConversationLogger)
            }
        },
        None => Arc::new(NoConversationLogger),
    };
    let models = language_models(&config);
    let commands = Arc::new(StaticCommandRegistry::from_config(&config.commands));

    let agents = Arc::new(ChatAgentService::new());
    agents.register(Arc::new(CodingChatAgent::new(Arc::clone(&models))));
    agents.register(Arc::new(CommandChatAgent::new(Arc::clone(&models), commands)));

    let aider = if config.aider.enabled && !cli.no_aider {
        let connector = AiderConnectorImpl::new(config.aider.to_process_config())
            .with_start_timeout(config.aider.start_timeout());
        let agent = Arc::new(AiderChatAgent::new(Arc::new(connector)));
        agents.register(Arc::clone(&agent) as Arc<dyn ChatAgent>);
        Some(agent)
    } else {
        None
    };

    agents.register(Arc::new(DelegatingChatAgent::new(
        Arc::clone(&models),
        &agents,
        Arc::clone(&logger),
    )));

    if cli.list_agents {
        print!("{}", ConsoleFormatter::format_agents(&agents.descriptors()));
        return Ok(());
    }

    let preferences = StaticPreferences::new(cli.agent.or(config.chat.default_agent.clone()));
    let mut service = ChatService::new(agents, Arc::new(preferences)).with_conversation_logger(logger);
    if let Some(fallback) = &config.chat.fallback_agent {
        service = service.with_fallback_agent(fallback.clone());
    }

    let mut repl = ChatRepl::new(Arc::new(service));
    if let Some(agent) = aider {
        repl = repl.with_aider(agent);
    }

    match cli.message {
        Some(message) => repl.send(&message).await?,
        None => repl.run().await?,
    }

    Ok(())
}

/// Initialize logging based on verbosity level, to stderr and optionally
/// to a file. The returned guard flushes the file writer on drop.
fn init_tracing(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(guard)
}

/// Language models for the configured provider. Agents that need a model
/// report the missing capability when none is available.
fn language_models(config: &FileConfig) -> Arc<dyn LanguageModelRegistry> {
    #[cfg(feature = "openai")]
    {
        match chatwire_infrastructure::providers::routing::openai_router(&config.openai) {
            Ok(router) => return Arc::new(router),
            Err(e) => warn!(error = %e, "OpenAI models unavailable"),
        }
    }
    #[cfg(not(feature = "openai"))]
    {
        let _ = config;
        warn!("Built without a language model provider");
    }
    Arc::new(PurposeRouter::new())
}
