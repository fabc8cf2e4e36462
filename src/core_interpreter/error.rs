use thiserror::Error;

/// Errors raised while tokenizing and matching an operator command
/// line. These never touch the session: the command loop reports them
/// and keeps prompting.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid character: '{0}'")]
    InvalidCharacter(char),

    #[error("Failed to parse command: input too long")]
    InputTooLong,

    #[error("Wrong command")]
    UnknownCommand,

    #[error("Failed to parse integer: invalid character '{0}'")]
    IntegerInvalidCharacter(char),

    #[error("Failed to parse integer: input length exceeded")]
    IntegerTooLong,

    #[error("Argument out of range: {0}")]
    IntegerOutOfRange(i64),

    #[error("Invalid path name: duplicate / separators aren't allowed")]
    DuplicatePathSeparator,

    #[error("Path too long")]
    PathTooLong,

    #[error("Invalid parameter type for '{0}'")]
    ParameterType(&'static str),
}
