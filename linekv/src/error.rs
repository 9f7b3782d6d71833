use thiserror::Error;

/// Crate-wide error type. Every variant corresponds to one row of the error
/// taxonomy: a kind code (the variant name itself), a human message, and,
/// for parser errors, the byte offset where the failure was detected.
#[derive(Error, Debug)]
pub enum LineKvError {
    #[error("invalid key {key:?} at byte {pos}: keys may only contain [A-Za-z0-9_-]")]
    InvalidKey { key: String, pos: usize },

    #[error("malformed record at byte {pos}: {reason}")]
    InvalidFormat { pos: usize, reason: String },

    #[error("unknown type tag {tag:?} at byte {pos}")]
    UnknownType { tag: char, pos: usize },

    #[error("failed to parse {tag:?} value {lexeme:?} at byte {pos}")]
    NumericParse {
        tag: char,
        lexeme: String,
        pos: usize,
    },

    #[error("invalid Z85 payload: byte {byte:#04x} at offset {pos} is outside the alphabet")]
    InvalidZ85 { byte: u8, pos: usize },

    #[error("duplicate key {0:?} in record")]
    DuplicateKey(String),

    #[error("duplicate line index {0}")]
    DuplicateIndex(u64),

    #[error("kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },

    #[error("a worker thread panicked")]
    WorkerPanic,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LineKvError {
    /// A short, stable code identifying the error kind, independent of the
    /// interpolated message. Intended for callers that want to branch on the
    /// taxonomy without matching on the full enum.
    pub fn kind_code(&self) -> &'static str {
        use LineKvError::*;
        match self {
            InvalidKey { .. } => "InvalidKey",
            InvalidFormat { .. } => "InvalidFormat",
            UnknownType { .. } => "UnknownType",
            NumericParse { .. } => "NumericParse",
            InvalidZ85 { .. } => "InvalidZ85",
            DuplicateKey(_) => "DuplicateKey",
            DuplicateIndex(_) => "DuplicateIndex",
            KindMismatch { .. } => "KindMismatch",
            WorkerPanic => "WorkerPanic",
            Io(_) => "Io",
        }
    }

    /// The byte offset at which a parser error was detected, when known.
    pub fn byte_pos(&self) -> Option<usize> {
        use LineKvError::*;
        match self {
            InvalidKey { pos, .. }
            | InvalidFormat { pos, .. }
            | UnknownType { pos, .. }
            | NumericParse { pos, .. } => Some(*pos),
            InvalidZ85 { pos, .. } => Some(*pos),
            _ => None,
        }
    }
}

/// Crate's Result type.
pub type Result<T> = std::result::Result<T, LineKvError>;
