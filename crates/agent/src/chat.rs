//! The chat pipeline.
//!
//! One request runs through:
//!
//! 1. **Validate** the message and session id
//! 2. **Lock** the session so concurrent requests on it queue up
//! 3. **Load history** (stored, or the client-supplied override)
//! 4. **Match knowledge** against the new message
//! 5. **Assemble** the prompt
//! 6. **Call** the completion provider
//! 7. **Commit** both turns to the session (only on success)
//!
//! [`ChatService::handle`] knows nothing about HTTP, so the gateway and the
//! CLI share it.

use std::sync::Arc;

use chatrelay_core::error::{Error, ValidationError};
use chatrelay_core::knowledge::Retriever;
use chatrelay_core::message::{SessionId, Turn};
use chatrelay_core::persona::Persona;
use chatrelay_core::provider::{CompletionRequest, ModelConfig, Provider, Usage};
use chatrelay_memory::{KeywordMatcher, KnowledgeStore, SessionStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::PromptAssembler;

/// Default number of knowledge fragments injected per request.
pub const DEFAULT_MATCH_LIMIT: usize = 3;

/// A chat request, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: Option<String>,
    pub session_id: Option<String>,
    /// Overrides the stored history for this request when present.
    pub history: Option<Vec<Turn>>,
}

impl ChatInput {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            session_id: Some(session_id.into()),
            history: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = Some(history);
        self
    }
}

/// The result of a successful exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub session_id: SessionId,
    /// How many knowledge fragments went into the prompt.
    pub fragments_used: usize,
    /// Session length after the exchange was committed.
    pub history_len: usize,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

pub struct ChatService {
    provider: Arc<dyn Provider>,
    sessions: Arc<SessionStore>,
    knowledge: Arc<KnowledgeStore>,
    retriever: Arc<dyn Retriever>,
    persona: Persona,
    assembler: PromptAssembler,
    model: ModelConfig,
    match_limit: usize,
}

impl ChatService {
    pub fn new(
        provider: Arc<dyn Provider>,
        sessions: Arc<SessionStore>,
        knowledge: Arc<KnowledgeStore>,
        persona: Persona,
        model: ModelConfig,
    ) -> Self {
        Self {
            provider,
            sessions,
            knowledge,
            retriever: Arc::new(KeywordMatcher::new()),
            persona,
            assembler: PromptAssembler::default(),
            model,
            match_limit: DEFAULT_MATCH_LIMIT,
        }
    }

    /// Swap the relevance algorithm.
    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_match_limit(mut self, limit: usize) -> Self {
        self.match_limit = limit;
        self
    }

    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeStore> {
        &self.knowledge
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Run one exchange.
    ///
    /// On any error the session is left exactly as it was.
    pub async fn handle(&self, input: ChatInput) -> Result<ChatOutcome, Error> {
        let ChatInput {
            message,
            session_id,
            history,
        } = input;
        let (message, session_id) = validate(message.as_deref(), session_id.as_deref())?;
        if let Some(history) = &history {
            validate_history(history)?;
        }
        debug!(session_id, len = message.len(), "Request validated");

        let _guard = self.sessions.lock(session_id).await;

        let client_history = history.map(|h| self.cap_history(h));
        let history = match &client_history {
            Some(history) => history.clone(),
            None => self.sessions.get(session_id).await,
        };
        debug!(
            session_id,
            turns = history.len(),
            client_supplied = client_history.is_some(),
            "History loaded"
        );

        let fragments =
            self.retriever
                .match_fragments(message, self.knowledge.fragments(), self.match_limit);
        debug!(
            session_id,
            retriever = self.retriever.name(),
            fragments = fragments.len(),
            "Knowledge matched"
        );

        let messages = self
            .assembler
            .assemble(&self.persona, &fragments, &history, message);
        debug!(session_id, messages = messages.len(), "Prompt assembled");

        let request = CompletionRequest {
            messages,
            model: self.model.clone(),
        };
        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(session_id, provider = self.provider.name(), error = %e, "Completion failed");
            e
        })?;
        debug!(session_id, reply_len = response.content.len(), "Upstream called");

        let user = Turn::user(message);
        let assistant = Turn::assistant(response.content.clone());
        match client_history {
            Some(mut history) => {
                history.push(user);
                history.push(assistant);
                self.sessions.set(session_id, history).await;
            }
            None => {
                self.sessions
                    .append_exchange(session_id, user, assistant)
                    .await;
            }
        }
        let history_len = (history.len() + 2).min(self.sessions.max_turns());
        debug!(session_id, turns = history_len, "History updated");

        info!(
            session_id,
            fragments = fragments.len(),
            turns = history_len,
            "Chat exchange completed"
        );

        Ok(ChatOutcome {
            reply: response.content,
            session_id: SessionId::from(session_id),
            fragments_used: fragments.len(),
            history_len,
            model: response.model,
            usage: response.usage,
        })
    }

    fn cap_history(&self, mut history: Vec<Turn>) -> Vec<Turn> {
        let max = self.sessions.max_turns();
        if history.len() > max {
            history.drain(..history.len() - max);
        }
        history
    }
}

fn validate<'a>(
    message: Option<&'a str>,
    session_id: Option<&'a str>,
) -> Result<(&'a str, &'a str), ValidationError> {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .ok_or(ValidationError::MissingMessage)?;
    let session_id = session_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(ValidationError::MissingSessionId)?;
    Ok((message, session_id))
}

fn validate_history(history: &[Turn]) -> Result<(), ValidationError> {
    match history.iter().position(|t| t.content.trim().is_empty()) {
        Some(i) => Err(ValidationError::InvalidHistory(format!(
            "turn {i} has empty content"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, ScriptedProvider};
    use chatrelay_core::error::ProviderError;
    use chatrelay_core::knowledge::Fragment;
    use chatrelay_core::message::Role;

    fn service(provider: Arc<dyn Provider>) -> ChatService {
        ChatService::new(
            provider,
            Arc::new(SessionStore::default()),
            Arc::new(KnowledgeStore::empty()),
            Persona::inline("You are a consultant.\n{{knowledge}}"),
            ModelConfig::default(),
        )
    }

    #[tokio::test]
    async fn first_exchange_creates_session() {
        let provider = Arc::new(ScriptedProvider::new(["Здравствуйте! Чем могу помочь?"]));
        let svc = service(provider.clone());

        let out = svc.handle(ChatInput::new("Здравствуйте", "abc")).await.unwrap();
        assert_eq!(out.reply, "Здравствуйте! Чем могу помочь?");
        assert_eq!(out.history_len, 2);

        let history = svc.sessions().get("abc").await;
        assert_eq!(
            history,
            vec![
                Turn::user("Здравствуйте"),
                Turn::assistant("Здравствуйте! Чем могу помочь?")
            ]
        );

        let sent = provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].messages.len(), 2);
        assert_eq!(sent[0].messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn missing_message_is_rejected_without_side_effects() {
        let provider = Arc::new(ScriptedProvider::new(["unused"]));
        let svc = service(provider.clone());

        let input = ChatInput {
            message: Some("   ".into()),
            session_id: Some("abc".into()),
            history: None,
        };
        let err = svc.handle(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingMessage)));
        assert!(err.is_client_error());
        assert!(svc.sessions().is_empty().await);
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn missing_session_id_is_rejected() {
        let svc = service(Arc::new(ScriptedProvider::new(["unused"])));
        let input = ChatInput {
            message: Some("hi".into()),
            session_id: None,
            history: None,
        };
        let err = svc.handle(input).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingSessionId)));
    }

    #[tokio::test]
    async fn blank_client_history_turn_is_rejected() {
        let provider = Arc::new(ScriptedProvider::new(["unused"]));
        let svc = service(provider.clone());

        let input = ChatInput::new("hi", "s")
            .with_history(vec![Turn::user("q"), Turn::assistant("  ")]);
        let err = svc.handle(input).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::InvalidHistory(_))
        ));
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_leaves_history_unchanged() {
        let svc = service(Arc::new(FailingProvider::upstream(
            429,
            r#"{"error":"rate limited"}"#,
        )));
        svc.sessions()
            .append_exchange("abc", Turn::user("q"), Turn::assistant("a"))
            .await;

        let err = svc.handle(ChatInput::new("next", "abc")).await.unwrap_err();
        match err {
            Error::Provider(ProviderError::Upstream { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, r#"{"error":"rate limited"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(svc.sessions().get("abc").await.len(), 2);
    }

    #[tokio::test]
    async fn malformed_response_is_not_committed() {
        let svc = service(Arc::new(FailingProvider::new(
            ProviderError::MalformedResponse("no choices".into()),
        )));
        assert!(svc.handle(ChatInput::new("hi", "s")).await.is_err());
        assert!(!svc.sessions().contains("s").await);
    }

    #[tokio::test]
    async fn history_is_sent_in_order() {
        let provider = Arc::new(ScriptedProvider::new(["a1", "a2"]));
        let svc = service(provider.clone());

        svc.handle(ChatInput::new("q1", "s")).await.unwrap();
        svc.handle(ChatInput::new("q2", "s")).await.unwrap();

        let sent = provider.requests();
        let second = &sent[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].content, "q1");
        assert_eq!(second[2].content, "a1");
        assert_eq!(second[3].content, "q2");
    }

    #[tokio::test]
    async fn window_holds_after_many_exchanges() {
        let replies: Vec<String> = (1..=13).map(|i| format!("a{i}")).collect();
        let provider = Arc::new(ScriptedProvider::new(replies));
        let svc = service(provider.clone());

        for i in 1..=13 {
            let out = svc.handle(ChatInput::new(format!("q{i}"), "s")).await.unwrap();
            assert!(out.history_len <= 20);
        }

        // The 13th request saw the 20 most recent turns of the first 12 exchanges.
        let last = provider.requests().pop().unwrap();
        assert_eq!(last.messages.len(), 22);
        assert_eq!(last.messages[1].content, "q3");

        let history = svc.sessions().get("s").await;
        assert_eq!(history.len(), 20);
        assert_eq!(history[0], Turn::user("q4"));
        assert_eq!(history[19], Turn::assistant("a13"));
    }

    #[tokio::test]
    async fn matched_knowledge_reaches_system_prompt() {
        let provider = Arc::new(ScriptedProvider::new(["ok"]));
        let knowledge = KnowledgeStore::from_fragments(vec![
            Fragment::new("Blackout curtains cost 2000").with_source("catalog"),
            Fragment::new("Office hours 9 to 18"),
        ]);
        let svc = ChatService::new(
            provider.clone(),
            Arc::new(SessionStore::default()),
            Arc::new(knowledge),
            Persona::inline("Persona.\n{{knowledge}}"),
            ModelConfig::default(),
        );

        let out = svc
            .handle(ChatInput::new("how much are blackout curtains?", "s"))
            .await
            .unwrap();
        assert_eq!(out.fragments_used, 1);

        let system = &provider.requests()[0].messages[0].content;
        assert!(system.contains("- [catalog] Blackout curtains cost 2000"));
        assert!(!system.contains("Office hours"));
    }

    /// Ignores the query and always returns one fixed fragment.
    struct PinnedRetriever;

    impl Retriever for PinnedRetriever {
        fn name(&self) -> &str {
            "pinned"
        }

        fn match_fragments(
            &self,
            _query: &str,
            fragments: &[Fragment],
            limit: usize,
        ) -> Vec<Fragment> {
            fragments.iter().rev().take(limit.min(1)).cloned().collect()
        }
    }

    #[tokio::test]
    async fn swapped_retriever_decides_knowledge() {
        let provider = Arc::new(ScriptedProvider::new(["ok"]));
        let knowledge = KnowledgeStore::from_fragments(vec![
            Fragment::new("Blackout curtains cost 2000"),
            Fragment::new("Studio opens at nine").with_source("contacts"),
        ]);
        let svc = ChatService::new(
            provider.clone(),
            Arc::new(SessionStore::default()),
            Arc::new(knowledge),
            Persona::inline("Persona.\n{{knowledge}}"),
            ModelConfig::default(),
        )
        .with_retriever(Arc::new(PinnedRetriever));

        let out = svc
            .handle(ChatInput::new("blackout curtains price", "s"))
            .await
            .unwrap();
        assert_eq!(out.fragments_used, 1);

        let system = &provider.requests()[0].messages[0].content;
        assert!(system.contains("- [contacts] Studio opens at nine"));
        assert!(!system.contains("Blackout"));
    }

    #[tokio::test]
    async fn client_history_overrides_store() {
        let provider = Arc::new(ScriptedProvider::new(["fresh"]));
        let svc = service(provider.clone());
        svc.sessions()
            .append_exchange("s", Turn::user("stored"), Turn::assistant("stored"))
            .await;

        let input = ChatInput::new("q", "s")
            .with_history(vec![Turn::user("client q"), Turn::assistant("client a")]);
        svc.handle(input).await.unwrap();

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent[1].content, "client q");
        let history = svc.sessions().get("s").await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "client q");
        assert_eq!(history[3].content, "fresh");
    }

    #[tokio::test]
    async fn oversized_client_history_is_capped() {
        let provider = Arc::new(ScriptedProvider::new(["r"]));
        let svc = service(provider.clone());
        let long: Vec<Turn> = (0..30).map(|i| Turn::user(format!("h{i}"))).collect();

        svc.handle(ChatInput::new("q", "s").with_history(long)).await.unwrap();

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 22);
        assert_eq!(sent[1].content, "h10");
    }

    #[tokio::test]
    async fn concurrent_requests_on_one_session_lose_nothing() {
        let replies: Vec<String> = (0..5).map(|i| format!("a{i}")).collect();
        let svc = Arc::new(service(Arc::new(ScriptedProvider::new(replies))));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.handle(ChatInput::new(format!("q{i}"), "s")).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(svc.sessions().get("s").await.len(), 10);
    }
}
