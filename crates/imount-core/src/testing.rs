//! A scripted [`Executor`] for exercising operations without the real tools.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::commands::CommandLine;
use crate::runner::{CommandResult, Executor};

/// Successful result with the given stdout.
pub fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

/// Failed result with the given exit code and stderr.
pub fn failed(exit_code: i32, stderr: &str) -> CommandResult {
    CommandResult {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_code,
    }
}

/// Answers commands (matched by their displayed form) from a script.
///
/// Each command has a queue of results; the last one repeats once the rest
/// are used up. Unscripted commands fail with exit code 127.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<HashMap<String, VecDeque<CommandResult>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command: &str, result: CommandResult) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(command.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn ok(self, command: &str, stdout: &str) -> Self {
        self.respond(command, ok(stdout))
    }

    pub fn fail(self, command: &str, stderr: &str) -> Self {
        self.respond(command, failed(1, stderr))
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(&self, command: &CommandLine) -> CommandResult {
        let key = command.to_string();
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(key.clone());

        let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| failed(127, "")),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| failed(127, "")),
            None => failed(127, &format!("{}: command not found", command.program())),
        }
    }
}
