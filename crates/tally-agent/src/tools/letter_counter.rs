use std::future::ready;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tally_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use thiserror::Error;

/// The letter argument is not exactly one character long.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("The 'letter' parameter must be a single character")]
pub struct LetterCountError;

/// Counts case-insensitive, non-overlapping occurrences of `letter` in
/// `word`.
///
/// `letter` must be exactly one character.
pub fn count_letter(
    word: &str,
    letter: &str,
) -> Result<usize, LetterCountError> {
    if letter.chars().count() != 1 {
        return Err(LetterCountError);
    }
    let word = word.to_lowercase();
    let letter = letter.to_lowercase();
    Ok(word.matches(letter.as_str()).count())
}

/// Like [`count_letter`], but for arguments that arrive as JSON.
///
/// Anything that is not a string counts nothing. This check happens before
/// the length check, so `{"word": 1, "letter": "ab"}` yields `0`.
pub fn count_letter_value(
    word: &Value,
    letter: &Value,
) -> Result<usize, LetterCountError> {
    match (word, letter) {
        (Value::String(word), Value::String(letter)) => {
            count_letter(word, letter)
        }
        _ => Ok(0),
    }
}

/// Arguments of [`LetterCounterTool`].
#[derive(Deserialize, JsonSchema)]
pub struct LetterCounterParameters {
    #[schemars(with = "String", description = "The text to search in.")]
    word: Value,
    #[schemars(
        with = "String",
        description = "The single character to count."
    )]
    letter: Value,
}

/// A tool that counts how often a letter appears in a word.
pub struct LetterCounterTool {
    parameter_schema: Value,
}

impl LetterCounterTool {
    /// Creates a new letter counter tool.
    #[inline]
    pub fn new() -> Self {
        Self {
            parameter_schema: schema_for!(LetterCounterParameters).to_value(),
        }
    }
}

impl Default for LetterCounterTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for LetterCounterTool {
    type Input = LetterCounterParameters;

    fn name(&self) -> &str {
        "letter_counter"
    }

    fn description(&self) -> &str {
        "Counts occurrences of a specific letter in a word, ignoring case."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let result = count_letter_value(&input.word, &input.letter)
            .map(|count| count.to_string())
            .map_err(|err| {
                ToolError::invalid_input().with_reason(err.to_string())
            });
        ready(result)
    }
}
