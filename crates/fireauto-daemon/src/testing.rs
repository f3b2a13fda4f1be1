//! Scripted [`CommandRunner`] for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DaemonError;
use crate::runner::{CommandOutput, CommandRunner};

/// Replays canned outputs and records every invocation.
///
/// Responses are keyed by a command-line prefix such as `"systemctl is-active"`;
/// the longest matching prefix wins. A queue of several responses is consumed
/// in order and its last entry repeats. Unmatched commands succeed silently.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for commands starting with `prefix`.
    pub fn respond(self, prefix: &str, output: CommandOutput) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(prefix.to_string())
            .or_default()
            .push_back(output);
        self
    }

    /// Every command line run so far, program and arguments joined by spaces.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether any recorded command line starts with `prefix`.
    pub fn ran(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn next(&self, program: &str, args: &[&str]) -> CommandOutput {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.clone());

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let key = responses
            .keys()
            .filter(|prefix| line.starts_with(prefix.as_str()))
            .max_by_key(|prefix| prefix.len())
            .cloned();

        match key.and_then(|k| responses.get_mut(&k)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => CommandOutput::default(),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn capture(&self, program: &str, args: &[&str]) -> Result<CommandOutput, DaemonError> {
        Ok(self.next(program, args))
    }

    async fn attach(&self, program: &str, args: &[&str]) -> Result<i32, DaemonError> {
        Ok(self.next(program, args).code)
    }
}
