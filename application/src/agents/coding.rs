//! Language-model backed coding agent.
//!
//! Streams the model's reply into the response. Fenced code blocks become
//! code content, everything else markdown.

use super::{AgentError, AgentRequest, ChatAgent};
use crate::ports::language_model::{
    LanguageModelRegistry, LanguageModelRequest, PURPOSE_CHAT, StreamEvent,
};
use async_trait::async_trait;
use chatwire_domain::{AgentDescriptor, ChatMessage, ChatResponseModel, ResponseContent};
use std::sync::Arc;
use tracing::{debug, info};

pub const CODING_AGENT_ID: &str = "Coding";

const SYSTEM_PROMPT: &str = "You are an AI assistant integrated into an IDE. \
You help the user with programming tasks: explaining code, writing code and fixing bugs. \
Put code in fenced Markdown code blocks annotated with the language.";

/// Splits streamed text into markdown and code fragments at ```` ``` ````
/// fence lines. Text is emitted per complete line; the trailing partial
/// line is kept until more text or [`finish`](FenceSplitter::finish).
#[derive(Debug, Default)]
struct FenceSplitter {
    pending: String,
    /// Language of the open code block (`Some("")` for an unannotated one).
    code_language: Option<String>,
}

impl FenceSplitter {
    fn push(&mut self, delta: &str) -> Vec<ResponseContent> {
        self.pending.push_str(delta);
        let mut out = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.line(&line, &mut out);
        }
        out
    }

    fn finish(&mut self) -> Vec<ResponseContent> {
        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.line(&line, &mut out);
        }
        out
    }

    fn line(&mut self, line: &str, out: &mut Vec<ResponseContent>) {
        let trimmed = line.trim();
        match &self.code_language {
            None => {
                if let Some(language) = trimmed.strip_prefix("```") {
                    self.code_language = Some(language.trim().to_string());
                } else {
                    out.push(ResponseContent::markdown(line));
                }
            }
            Some(language) => {
                if trimmed == "```" {
                    self.code_language = None;
                } else {
                    let language = (!language.is_empty()).then_some(language.as_str());
                    out.push(ResponseContent::code(line, language));
                }
            }
        }
    }
}

pub struct CodingChatAgent {
    descriptor: AgentDescriptor,
    models: Arc<dyn LanguageModelRegistry>,
}

impl CodingChatAgent {
    pub fn new(models: Arc<dyn LanguageModelRegistry>) -> Self {
        Self {
            descriptor: AgentDescriptor::new(
                CODING_AGENT_ID,
                CODING_AGENT_ID,
                "A general purpose programming assistant. Answers coding questions, \
                 explains and writes code.",
            )
            .with_tag("Chat"),
            models,
        }
    }

    fn add_all(response: &ChatResponseModel, items: Vec<ResponseContent>) -> Result<(), AgentError> {
        if items.is_empty() {
            return Ok(());
        }
        response.add_contents(items)?;
        Ok(())
    }
}

#[async_trait]
impl ChatAgent for CodingChatAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: AgentRequest) -> Result<(), AgentError> {
        let model = self
            .models
            .select(PURPOSE_CHAT)
            .ok_or_else(|| AgentError::NoLanguageModel(PURPOSE_CHAT.to_string()))?;
        let response = request.request.response();

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        messages.extend(request.session.history(Some(request.request.id())));
        messages.push(ChatMessage::user(request.prompt_text()));

        info!(model = %model.id(), request = %request.request.id(), "Coding agent sending request");
        let mut stream = model.request(LanguageModelRequest::new(messages)).await?;
        let mut splitter = FenceSplitter::default();
        let mut streamed_any = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = request.cancellation.cancelled() => {
                    debug!(request = %request.request.id(), "Coding agent cancelled");
                    response.cancel();
                    return Ok(());
                }
                event = stream.next() => event,
            };

            match event {
                Some(StreamEvent::Delta(delta)) => {
                    streamed_any = true;
                    Self::add_all(response, splitter.push(&delta))?;
                }
                Some(StreamEvent::Completed(text)) => {
                    if !streamed_any {
                        Self::add_all(response, splitter.push(&text))?;
                    }
                    break;
                }
                Some(StreamEvent::Error(e)) => {
                    return Err(AgentError::Gateway(
                        crate::ports::language_model::GatewayError::RequestFailed(e),
                    ));
                }
                None => break,
            }
        }

        Self::add_all(response, splitter.finish())?;
        response.complete();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Scripted, ScriptedModel, ScriptedRegistry, agent_request};
    use chatwire_domain::ContentKind;

    fn splitter_output(chunks: &[&str]) -> Vec<ResponseContent> {
        let mut splitter = FenceSplitter::default();
        let mut out: Vec<ResponseContent> = Vec::new();
        for chunk in chunks {
            out.extend(splitter.push(chunk));
        }
        out.extend(splitter.finish());
        out
    }

    #[test]
    fn splitter_separates_code_blocks() {
        let out = splitter_output(&["Here:\n```ru", "st\nfn main() {}\n``", "`\nDone"]);
        let kinds: Vec<_> = out.iter().map(ResponseContent::kind).collect();
        assert_eq!(
            kinds,
            vec![ContentKind::Markdown, ContentKind::Code, ContentKind::Markdown]
        );
        assert_eq!(out[1], ResponseContent::code("fn main() {}\n", Some("rust")));
        assert_eq!(out[2], ResponseContent::markdown("Done"));
    }

    #[test]
    fn splitter_handles_unannotated_fence() {
        let out = splitter_output(&["```\nls\n```\n"]);
        assert_eq!(out, vec![ResponseContent::code("ls\n", None)]);
    }

    #[tokio::test]
    async fn streams_reply_into_response() {
        let model = ScriptedModel::new(
            "test/model",
            vec![Scripted::Deltas(vec![
                "Use this:\n".into(),
                "```sh\ncargo test\n```\n".into(),
            ])],
        );
        let agent = CodingChatAgent::new(ScriptedRegistry::with_model(PURPOSE_CHAT, model.clone()));
        let (req, request) = agent_request("@Coding how do I test?");

        agent.invoke(request).await.unwrap();

        let response = req.response();
        assert!(response.is_complete());
        assert_eq!(response.as_string(), "Use this:\n\n\n```sh\ncargo test\n```");

        let sent = model.requests();
        assert_eq!(sent.len(), 1);
        let last = sent[0].messages.last().unwrap();
        assert_eq!(last, &ChatMessage::user("how do I test?"));
    }

    #[tokio::test]
    async fn missing_model_is_fatal() {
        let agent = CodingChatAgent::new(ScriptedRegistry::empty());
        let (req, request) = agent_request("hello");

        let err = agent.invoke(request).await.unwrap_err();
        assert!(matches!(err, AgentError::NoLanguageModel(p) if p == PURPOSE_CHAT));
        assert!(!req.response().is_complete());
    }

    #[tokio::test]
    async fn stream_error_is_returned() {
        let model = ScriptedModel::new("m", vec![Scripted::Error("rate limited".into())]);
        let agent = CodingChatAgent::new(ScriptedRegistry::with_model(PURPOSE_CHAT, model));
        let (_, request) = agent_request("hello");

        assert!(matches!(agent.invoke(request).await, Err(AgentError::Gateway(_))));
    }

    #[tokio::test]
    async fn cancellation_stops_streaming() {
        let model = ScriptedModel::new("m", vec![Scripted::Hang]);
        let agent = CodingChatAgent::new(ScriptedRegistry::with_model(PURPOSE_CHAT, model));
        let (req, request) = agent_request("hello");
        request.cancellation.cancel();

        agent.invoke(request).await.unwrap();
        assert!(req.response().is_canceled());
    }
}
