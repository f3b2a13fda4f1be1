//! Operator prompts.

use std::io::{self, BufRead, Write};

use crate::error::SetupError;

/// Source of operator answers.
pub trait Prompter: Send {
    /// Whether answers come from a person. Non-interactive runs skip prompts.
    fn is_interactive(&self) -> bool;

    /// Ask for a value; a blank answer keeps `default`.
    fn ask(&mut self, question: &str, default: &str) -> Result<String, SetupError>;

    /// Ask a yes/no question.
    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, SetupError>;
}

/// Reads answers from standard input, writes questions to standard error.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(&self, prompt: &str) -> Result<String, SetupError> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(SetupError::Aborted("standard input closed".to_string()));
        }
        Ok(line.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        true
    }

    fn ask(&mut self, question: &str, default: &str) -> Result<String, SetupError> {
        let answer = if default.is_empty() {
            self.read_line(&format!("{}: ", question))?
        } else {
            self.read_line(&format!("{} [{}]: ", question, default))?
        };
        Ok(if answer.is_empty() {
            default.to_string()
        } else {
            answer
        })
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, SetupError> {
        let hint = if default { "Y/n" } else { "y/N" };
        let answer = self.read_line(&format!("{} [{}]: ", question, hint))?;
        Ok(match answer.to_ascii_lowercase().as_str() {
            "" => default,
            "y" | "yes" => true,
            _ => false,
        })
    }
}

/// Answers every prompt with its default.
#[derive(Debug, Default)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn is_interactive(&self) -> bool {
        false
    }

    fn ask(&mut self, _question: &str, default: &str) -> Result<String, SetupError> {
        Ok(default.to_string())
    }

    fn confirm(&mut self, _question: &str, default: bool) -> Result<bool, SetupError> {
        Ok(default)
    }
}

/// Replays queued answers; an exhausted queue behaves like a blank answer.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: std::collections::VecDeque<String>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        true
    }

    fn ask(&mut self, question: &str, default: &str) -> Result<String, SetupError> {
        self.asked.push(question.to_string());
        match self.answers.pop_front() {
            Some(answer) if !answer.is_empty() => Ok(answer),
            _ => Ok(default.to_string()),
        }
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool, SetupError> {
        self.asked.push(question.to_string());
        Ok(match self.answers.pop_front().as_deref() {
            Some("y") | Some("yes") => true,
            Some("n") | Some("no") => false,
            _ => default,
        })
    }
}
