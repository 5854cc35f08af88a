//! Scripted providers for pipeline tests.

use chatrelay_core::error::ProviderError;
use chatrelay_core::provider::{CompletionRequest, CompletionResponse, Provider, Usage};
use std::sync::Mutex;

/// Returns the scripted replies in order and records every request.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<Vec<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies: Vec<String> = replies.into_iter().map(Into::into).collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let model = request.model.model.clone();
        self.requests.lock().unwrap().push(request);
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .expect("ScriptedProvider: no more replies");
        Ok(CompletionResponse {
            content,
            model,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        })
    }
}

/// Fails every call with the same error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }

    pub fn upstream(status: u16, body: &str) -> Self {
        Self::new(ProviderError::Upstream {
            status,
            body: body.into(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(self.error.clone())
    }
}
