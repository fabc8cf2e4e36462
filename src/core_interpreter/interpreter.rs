use std::future::Future;
use std::pin::Pin;

use crate::constants::{CMD_MAX_LENGTH, INT_MAX_DIGITS};
use crate::core_error::ClientError;

use super::error::InputError;
use super::token::{ParamType, Parameter, Token, Value};

pub type CommandFuture = Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>;

/// A registered command action. The context (shared client handle) is
/// cloned in at dispatch time, the bound parameters arrive in token
/// order.
pub type CommandAction<C> =
    Box<dyn Fn(C, Vec<Parameter>) -> CommandFuture + Send + Sync>;

/// An ordered token pattern plus the action to run when it matches.
pub struct Command<C> {
    pub tokens: Vec<Token>,
    pub action: CommandAction<C>,
}

/// The command grammar engine: an immutable-after-startup registry of
/// command patterns, matched positionally against tokenized input.
pub struct Interpreter<C> {
    commands: Vec<Command<C>>,
}

impl<C: Clone> Interpreter<C> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Appends a command pattern to the registry. Patterns are tried in
    /// registration order and the first full match wins, so register
    /// the more specific of two overlapping patterns first.
    pub fn add_command(&mut self, tokens: Vec<Token>, action: CommandAction<C>) {
        self.commands.push(Command { tokens, action });
    }

    /// Tokenizes a raw input line and dispatches it. An empty line is a
    /// no-op; a line no pattern accepts is a fatal input error.
    pub async fn execute(&self, line: &str, ctx: C) -> Result<(), ClientError> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(());
        }
        if !self.dispatch(&words, ctx).await? {
            return Err(InputError::UnknownCommand.into());
        }
        Ok(())
    }

    /// Walks the registry in order and runs the first pattern that
    /// fully matches `words`. Returns whether any handler ran. A
    /// parameter that is positionally reached but fails its type check
    /// (bad integer, bad path) aborts the whole dispatch rather than
    /// skipping to the next pattern.
    pub async fn dispatch(&self, words: &[String], ctx: C) -> Result<bool, ClientError> {
        for command in &self.commands {
            if let Some(params) = try_parse_command(&command.tokens, words)? {
                (command.action)(ctx.clone(), params).await?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Matches a word sequence against one pattern. `None` means the
/// pattern does not apply (wrong word count or literal mismatch) and
/// the caller should try the next one; `Err` is a fatal input error.
fn try_parse_command(
    tokens: &[Token],
    words: &[String],
) -> Result<Option<Vec<Parameter>>, InputError> {
    if tokens.len() != words.len() {
        return Ok(None);
    }

    let mut params = Vec::new();
    for (token, word) in tokens.iter().zip(words) {
        match token {
            Token::Literal(literal) => {
                if *literal != word.as_str() {
                    return Ok(None);
                }
            }
            Token::Param(param) => match param.ty {
                ParamType::String => {
                    params.push(Parameter::new(param.name, Value::Str(word.clone())));
                }
                ParamType::Integer => {
                    let n = parse_integer(word)?;
                    params.push(Parameter::new(param.name, Value::Int(n)));
                }
                ParamType::Path => {
                    validate_path(word)?;
                    params.push(Parameter::new(param.name, Value::Path(word.clone())));
                }
            },
        }
    }

    Ok(Some(params))
}

fn is_valid_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '/' || c == '.'
}

/// Splits a raw line into whitespace-delimited words, enforcing the
/// line length cap and the restricted character set.
pub(crate) fn split_words(line: &str) -> Result<Vec<String>, InputError> {
    if line.len() > CMD_MAX_LENGTH {
        return Err(InputError::InputTooLong);
    }

    let mut words = Vec::new();
    let mut word = String::new();
    for c in line.chars() {
        if !is_valid_character(c) {
            return Err(InputError::InvalidCharacter(c));
        }
        if c == ' ' {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
        } else {
            word.push(c);
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    Ok(words)
}

/// Parses a signed decimal integer: optional leading `-`, at most
/// ten digits, value must fit in an `i32`.
pub(crate) fn parse_integer(word: &str) -> Result<i32, InputError> {
    let mut value: i64 = 0;
    let mut negative = false;
    let mut digits = 0usize;

    for (i, c) in word.chars().enumerate() {
        if i == 0 && c == '-' {
            negative = true;
            continue;
        }
        let digit = c
            .to_digit(10)
            .ok_or(InputError::IntegerInvalidCharacter(c))?;
        digits += 1;
        if digits > INT_MAX_DIGITS {
            return Err(InputError::IntegerTooLong);
        }
        value = value * 10 + i64::from(digit);
    }

    if negative {
        value = -value;
    }
    i32::try_from(value).map_err(|_| InputError::IntegerOutOfRange(value))
}

/// Validates a path word: length-capped, no empty directory segments.
/// A single leading `/` is allowed.
pub(crate) fn validate_path(word: &str) -> Result<(), InputError> {
    if word.len() > CMD_MAX_LENGTH {
        return Err(InputError::PathTooLong);
    }

    let mut segment_len = 0usize;
    let mut separators = 0usize;
    for c in word.chars() {
        if c == '/' {
            if segment_len == 0 && separators != 0 {
                return Err(InputError::DuplicatePathSeparator);
            }
            separators += 1;
            segment_len = 0;
        } else {
            segment_len += 1;
        }
    }

    Ok(())
}
