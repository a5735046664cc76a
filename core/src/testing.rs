//! Test doubles for driving the agent loop without a real model.

use crate::traits::{ChatMessage, Completion, CompletionRequest, Provider};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Script {
    Queue(VecDeque<String>),
    Repeat(String),
    Fail(String),
}

/// Replays canned completions and records every request it receives.
pub struct ScriptedProvider {
    script: Mutex<Script>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Queue(replies.into_iter().map(Into::into).collect()))
    }

    pub fn repeating(reply: impl Into<String>) -> Self {
        Self::with_script(Script::Repeat(reply.into()))
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(error.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> anyhow::Result<Completion> {
        self.requests
            .lock()
            .unwrap()
            .push(request.messages.to_vec());

        match &mut *self.script.lock().unwrap() {
            Script::Queue(replies) => replies
                .pop_front()
                .map(Completion::new)
                .ok_or_else(|| anyhow::anyhow!("no more scripted replies")),
            Script::Repeat(reply) => Ok(Completion::new(reply.clone())),
            Script::Fail(error) => Err(anyhow::anyhow!("{}", error)),
        }
    }
}
