use std::fmt;

/// Custom error type for database operations, including specific error codes.
///
/// Each variant represents a distinct error condition with a unique error code for easier debugging
/// and error handling in applications.
#[derive(Debug)]
pub enum Error {
    /// I/O-related error (e.g., file operations).
    /// Error code: 1000
    Io(std::io::Error),
    /// Page or node level inconsistency (e.g., corrupt file, wrong node type).
    /// Error code: 2000
    Storage(String),
    /// Row serialization/deserialization error.
    /// Error code: 3000
    Encoding(String),
    /// The key is already present in the table.
    /// Error code: 4000
    DuplicateKey(u32),
    /// The id is negative, zero or not a number.
    /// Error code: 5000
    NegativeId,
    /// A string column exceeds its maximum width.
    /// Error code: 5001
    StringTooLong,
    /// Statement syntax error.
    /// Error code: 6000
    Syntax(String),
    /// Statement does not start with a known keyword.
    /// Error code: 6001
    UnrecognizedStatement(String),
    /// Unknown meta command.
    /// Error code: 6002
    UnrecognizedCommand(String),
}

impl Error {
    /// Returns the error code associated with this error variant.
    ///
    /// # Examples
    /// ```ignore
    /// let err = Error::Syntax("Missing email".to_string());
    /// assert_eq!(err.code(), 6000);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            Error::Io(_) => 1000,
            Error::Storage(_) => 2000,
            Error::Encoding(_) => 3000,
            Error::DuplicateKey(_) => 4000,
            Error::NegativeId => 5000,
            Error::StringTooLong => 5001,
            Error::Syntax(_) => 6000,
            Error::UnrecognizedStatement(_) => 6001,
            Error::UnrecognizedCommand(_) => 6002,
        }
    }

    /// Returns a human-readable error category for this error variant.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "I/O",
            Error::Storage(_) => "Storage",
            Error::Encoding(_) => "Encoding",
            Error::DuplicateKey(_) => "Duplicate Key",
            Error::NegativeId | Error::StringTooLong => "Validation",
            Error::Syntax(_) | Error::UnrecognizedStatement(_) | Error::UnrecognizedCommand(_) => {
                "Syntax"
            }
        }
    }

    /// Returns the line printed by the shell when a statement fails with this error.
    ///
    /// # Examples
    /// ```ignore
    /// assert_eq!(Error::DuplicateKey(1).user_message(), "Error: Duplicate key.");
    /// ```
    pub fn user_message(&self) -> String {
        match self {
            Error::NegativeId => "ID must be positive.".to_string(),
            Error::StringTooLong => "String is too long.".to_string(),
            Error::DuplicateKey(_) => "Error: Duplicate key.".to_string(),
            Error::Syntax(_) => "syntax error. could not parse statement".to_string(),
            Error::UnrecognizedStatement(line) => {
                format!("Unrecognized keyword at start of '{}'.", line)
            }
            Error::UnrecognizedCommand(line) => format!("Unrecognized command '{}'.", line),
            other => format!("Error: {}", other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} Error: ", self.code(), self.category())?;
        match self {
            Error::Io(e) => write!(f, "{}", e),
            Error::Storage(msg) | Error::Encoding(msg) | Error::Syntax(msg) => write!(f, "{}", msg),
            Error::DuplicateKey(key) => write!(f, "key {}", key),
            Error::NegativeId => write!(f, "id must be positive"),
            Error::StringTooLong => write!(f, "string is too long"),
            Error::UnrecognizedStatement(line) => write!(f, "unrecognized statement '{}'", line),
            Error::UnrecognizedCommand(line) => write!(f, "unrecognized command '{}'", line),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Encoding(format!("UTF-8 conversion error: {}", err))
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(err: bincode::error::EncodeError) -> Self {
        Error::Encoding(format!("Failed to encode row. {}", err))
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(err: bincode::error::DecodeError) -> Self {
        Error::Encoding(format!("Failed to decode row. {}", err))
    }
}

/// Convenience macro to create an `Error` with a formatted message.
///
/// # Examples
/// ```ignore
/// let err = err!(Storage, "Page {} not found", 3);
/// assert_eq!(err.code(), 2000);
/// assert_eq!(err.to_string(), "[2000] Storage Error: Page 3 not found");
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident, $msg:expr) => {
        $crate::errors::Error::$variant($msg.to_string())
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::errors::Error::$variant(format!($fmt, $($arg)*))
    };
}
