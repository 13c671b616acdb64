//! REPL (Read-Eval-Print Loop) for interactive chat

use super::stream::ResponseView;
use crate::ConsoleFormatter;
use chatwire_application::{AiderChatAgent, ChatError, ChatInvocation, ChatService};
use chatwire_domain::chat::content::QuestionContent;
use chatwire_domain::{QuestionOption, ResponseChange, ResponseContent};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Interactive chat REPL
pub struct ChatRepl {
    service: Arc<ChatService>,
    session_id: String,
    aider: Option<Arc<AiderChatAgent>>,
}

impl ChatRepl {
    /// Create a new ChatRepl with a fresh session
    pub fn new(service: Arc<ChatService>) -> Self {
        let session_id = service.create_session().id().to_string();
        Self {
            service,
            session_id,
            aider: None,
        }
    }

    /// Enable `/add` through the Aider agent
    pub fn with_aider(mut self, agent: Arc<AiderChatAgent>) -> Self {
        self.aider = Some(agent);
        self
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> RlResult<()> {
        let mut rl = DefaultEditor::new()?;

        let history_path = dirs::data_dir().map(|p| p.join("chatwire").join("history.txt"));

        if let Some(ref path) = history_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(path);
        }

        self.print_welcome();

        loop {
            let readline = rl.readline(">>> ");

            match readline {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let _ = rl.add_history_entry(line);

                    if line.starts_with('/') {
                        if self.handle_command(line).await {
                            break;
                        }
                        continue;
                    }

                    if let Err(e) = self.send(line).await {
                        eprintln!("{} {}", "Error:".red().bold(), e);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(ref path) = history_path {
            let _ = rl.save_history(path);
        }

        Ok(())
    }

    /// Send one message and stream the answer to stdout until the response
    /// settles. Ctrl-C cancels the running request. When the response ends
    /// on a question, the user's answer is sent on and streamed in turn.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        let mut invocation = self.service.send_request(&self.session_id, text)?;
        loop {
            let request_id = invocation.request.id().to_string();
            let response = Arc::clone(invocation.request.response());
            self.stream(invocation).await;

            if response.is_canceled() {
                return Ok(());
            }
            let content = response.content();
            let Some(question) = pending_question(&content) else {
                return Ok(());
            };
            let Some(option) = prompt_answer(question).await else {
                return Ok(());
            };
            invocation = self
                .service
                .answer_question(&self.session_id, &request_id, option)?;
        }
    }

    /// Print a response as it grows until it completes or is canceled.
    async fn stream(&self, invocation: ChatInvocation) {
        let request_id = invocation.request.id().to_string();
        let response = Arc::clone(invocation.request.response());
        println!("{}", ConsoleFormatter::agent_header(&invocation.agent_id));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = response.on_change(move |change| {
            let _ = tx.send(change);
        });

        let mut view = ResponseView::new();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        // the agent may already be done before the listener was attached
        let mut settled = response.state().is_terminal();
        while !settled {
            tokio::select! {
                change = rx.recv() => {
                    let Some(change) = change else { break };
                    settled = matches!(change, ResponseChange::Completed | ResponseChange::Canceled);
                }
                _ = &mut ctrl_c, if !interrupted => {
                    interrupted = true;
                    debug!(request_id = %request_id, "Interrupted, cancelling request");
                    invocation.cancel();
                    if let Err(e) = self.service.cancel_request(&self.session_id, &request_id) {
                        warn!(error = %e, "Failed to cancel request");
                    }
                    continue;
                }
            }
            print_now(&view.update(&response.content()));
        }

        response.remove_listener(listener);
        print_now(&view.update(&response.content()));
        if response.is_canceled() {
            print!("\n{}", "(canceled)".bright_black());
        }
        println!("\n");
        invocation.wait().await;
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│                chatwire chat                │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        print!(
            "{}",
            ConsoleFormatter::format_agents(&self.service.agents().descriptors())
        );
        println!();
        println!("Mention an agent with @Name to address it directly.");
        println!("Type /help for commands.");
        println!();
    }

    /// Handle slash commands. Returns true if should exit.
    async fn handle_command(&mut self, line: &str) -> bool {
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        match cmd {
            "/quit" | "/exit" | "/q" => {
                println!("Bye!");
                true
            }
            "/help" | "/h" | "/?" => {
                println!();
                println!("Commands:");
                println!("  /help, /h, /?     - Show this help");
                println!("  /agents           - List chat agents");
                println!("  /add <paths...>   - Add files to the Aider chat");
                println!("  /new              - Start a new session");
                println!("  /quit, /exit, /q  - Exit chat");
                println!();
                false
            }
            "/agents" => {
                println!();
                print!(
                    "{}",
                    ConsoleFormatter::format_agents(&self.service.agents().descriptors())
                );
                println!();
                false
            }
            "/add" => {
                let paths: Vec<Option<String>> =
                    rest.split_whitespace().map(|p| Some(p.to_string())).collect();
                match &self.aider {
                    None => println!("Aider is not enabled."),
                    Some(_) if paths.is_empty() => println!("Usage: /add <paths...>"),
                    Some(agent) => match agent.add_files(&paths).await {
                        Ok(()) => println!("Added {} file(s).", paths.len()),
                        Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                    },
                }
                false
            }
            "/new" => {
                let old = std::mem::replace(
                    &mut self.session_id,
                    self.service.create_session().id().to_string(),
                );
                if let Err(e) = self.service.delete_session(&old) {
                    warn!(error = %e, "Failed to delete session");
                }
                println!("Started a new session.");
                false
            }
            _ => {
                println!("Unknown command: {}", cmd);
                println!("Type /help for available commands.");
                false
            }
        }
    }
}

fn print_now(text: &str) {
    if text.is_empty() {
        return;
    }
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

/// The newest question in `content` that has no answer yet.
fn pending_question(content: &[ResponseContent]) -> Option<&QuestionContent> {
    content.iter().rev().find_map(|c| match c {
        ResponseContent::Question(q) if q.selected.is_none() => Some(q),
        _ => None,
    })
}

async fn prompt_answer(question: &QuestionContent) -> Option<QuestionOption> {
    let options = question.options.clone();
    let hint: Vec<&str> = options.iter().map(QuestionOption::as_str).collect();
    loop {
        print_now(&format!("\n{} ", format!("answer [{}]:", hint.join("/")).yellow()));
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await
        .ok()?
        .ok()?;
        if line.is_empty() {
            // stdin closed
            return None;
        }
        match parse_answer(&line, &options) {
            Some(option) => return Some(option),
            None => println!("Please answer one of: {}", hint.join(", ")),
        }
    }
}

/// Match user input against the offered options. Full names and unique
/// prefixes are accepted, case-insensitively.
fn parse_answer(input: &str, options: &[QuestionOption]) -> Option<QuestionOption> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return None;
    }
    if let Some(exact) = options.iter().find(|o| o.as_str() == input) {
        return Some(*exact);
    }
    let mut matches = options.iter().filter(|o| o.as_str().starts_with(&input));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [QuestionOption; 5] = [
        QuestionOption::Yes,
        QuestionOption::No,
        QuestionOption::All,
        QuestionOption::Skip,
        QuestionOption::Dont,
    ];

    #[test]
    fn test_parse_answer_accepts_names_and_prefixes() {
        assert_eq!(parse_answer("yes\n", &ALL), Some(QuestionOption::Yes));
        assert_eq!(parse_answer("Y", &ALL), Some(QuestionOption::Yes));
        assert_eq!(parse_answer(" n ", &ALL), Some(QuestionOption::No));
        assert_eq!(parse_answer("d", &ALL), Some(QuestionOption::Dont));
        assert_eq!(parse_answer("skip", &ALL), Some(QuestionOption::Skip));
    }

    #[test]
    fn test_parse_answer_rejects_unknown_and_unoffered() {
        let yes_no = [QuestionOption::Yes, QuestionOption::No];
        assert_eq!(parse_answer("", &yes_no), None);
        assert_eq!(parse_answer("maybe", &yes_no), None);
        assert_eq!(parse_answer("all", &yes_no), None);
    }

    #[test]
    fn test_pending_question_is_the_newest_unanswered() {
        let question = |text: &str, selected| {
            ResponseContent::Question(QuestionContent {
                question: text.into(),
                options: vec![QuestionOption::Yes, QuestionOption::No],
                session_id: None,
                agent_id: None,
                selected,
            })
        };
        let content = vec![
            question("first", None),
            ResponseContent::markdown("ok"),
            question("second", None),
            question("third", Some(QuestionOption::Yes)),
        ];
        assert_eq!(pending_question(&content).map(|q| q.question.as_str()), Some("second"));
        assert!(pending_question(&content[3..]).is_none());
    }
}
