// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive prompts.
//!
//! The deployment session only asks three kinds of questions: free text with
//! a default, yes or no, and Continue/Redo/Quit. [`Prompter`] abstracts over
//! how they are asked so the session can be driven from a terminal through
//! [`InquirePrompter`], or from a script.

use inquire::{Confirm, InquireError, Text};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Answer to a Continue/Redo/Quit question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Continue,
    Redo,
    Quit,
}

impl Choice {
    /// Interpret user response.
    ///
    /// Accepts the full word or its first letter in any case. Anything else is
    /// treated as [`Choice::Quit`].
    pub fn from_response(response: impl AsRef<str>) -> Self {
        match response.as_ref().trim().to_ascii_lowercase().as_str() {
            "c" | "continue" => Self::Continue,
            "r" | "redo" => Self::Redo,
            _ => Self::Quit,
        }
    }
}

impl Display for Choice {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Continue => fmt.write_str("continue"),
            Self::Redo => fmt.write_str("redo"),
            Self::Quit => fmt.write_str("quit"),
        }
    }
}

/// Ask the user questions.
pub trait Prompter {
    /// Ask for free text, offering a default answer.
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String>;

    /// Ask a yes or no question.
    fn confirm(&mut self, message: &str, default: bool) -> Result<bool>;

    /// Ask whether to continue, redo, or quit.
    fn choose(&mut self, message: &str) -> Result<Choice>;
}

impl<P> Prompter for &mut P
where
    P: Prompter + ?Sized,
{
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        (**self).text(message, default)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        (**self).confirm(message, default)
    }

    fn choose(&mut self, message: &str) -> Result<Choice> {
        (**self).choose(message)
    }
}

/// Terminal prompter through [`inquire`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl InquirePrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for InquirePrompter {
    fn text(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        let mut prompt = Text::new(message);
        if let Some(default) = default {
            prompt = prompt.with_default(default);
        }

        Ok(prompt.prompt()?)
    }

    fn confirm(&mut self, message: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new(message).with_default(default).prompt()?)
    }

    fn choose(&mut self, message: &str) -> Result<Choice> {
        let response = Text::new(message)
            .with_help_message("[C]ontinue, [R]edo, [Q]uit")
            .prompt();

        // INVARIANT: Fail closed, a cancelled choice is a quit.
        match response {
            Ok(response) => Ok(Choice::from_response(response)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Ok(Choice::Quit)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Prompt error types.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// User cancelled or interrupted a question.
    #[error("prompt cancelled by user")]
    Cancelled,

    /// Terminal interaction failed.
    #[error(transparent)]
    Inquire(InquireError),
}

impl From<InquireError> for PromptError {
    fn from(err: InquireError) -> Self {
        match err {
            InquireError::OperationCanceled | InquireError::OperationInterrupted => Self::Cancelled,
            err => Self::Inquire(err),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = PromptError> = std::result::Result<T, E>;
