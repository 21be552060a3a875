//! Deterministic summarizer for tests.

use std::sync::Mutex;
use std::time::Duration;

use crate::llm::{Completion, Summarizer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub prefix: String,
    pub text: String,
}

type Responder = Box<dyn Fn(&str, &str, usize) -> Completion + Send + Sync>;

pub(crate) struct ScriptedSummarizer {
    calls: Mutex<Vec<Call>>,
    respond: Responder,
}

impl ScriptedSummarizer {
    /// Respond with `respond(prefix, text, call_index)`.
    pub fn new(respond: impl Fn(&str, &str, usize) -> Completion + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    /// Every call succeeds with `tokens` tokens and one second of latency.
    pub fn fixed(tokens: u64) -> Self {
        Self::new(move |_, _, n| generated(&format!("summary #{n}"), tokens, 1000))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, text: &str, prefix: &str) -> Completion {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                prefix: prefix.to_string(),
                text: text.to_string(),
            });
            calls.len() - 1
        };
        (self.respond)(prefix, text, index)
    }
}

pub(crate) fn generated(text: &str, tokens: u64, millis: u64) -> Completion {
    Completion::Generated {
        text: text.to_string(),
        total_tokens: tokens,
        elapsed: Duration::from_millis(millis),
    }
}
