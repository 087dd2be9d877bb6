//! Test doubles shared by the unit tests of several modules.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::pipeline::{CallError, GenerativeClient};

/// Answers each call from a queue of scripted replies and counts calls.
/// Once the script runs out every call fails.
pub(crate) struct ScriptedClient {
    replies: Mutex<Vec<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub(crate) fn new(replies: Vec<Result<&str, &str>>) -> Self {
        let mut replies: Vec<Result<String, String>> = replies
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeClient for ScriptedClient {
    async fn call(&self, _instructions: &str, _input: &str) -> Result<String, CallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop();
        match next {
            Some(reply) => reply.map_err(CallError::Other),
            None => Err(CallError::Other("no scripted reply".into())),
        }
    }
}
