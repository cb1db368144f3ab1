// We want a few things here:
// 1. A stable set of error kinds callers can match on at the public surface
// 2. A backtrace captured at creation, to trap any error in the system fairly
//    soon after it's made
// 3. Every error emitted into the tracing/logging system at creation time

use backtrace_error::DynBacktraceError;
use thiserror::Error as ThisError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// The kinds an [`Error`] can carry. Names are part of the public contract.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("no object at {0}")]
    NoSuchObject(String),
    #[error("not a dataset: {0}")]
    NotADataset(String),
    #[error("not a group: {0}")]
    NotAGroup(String),
    #[error("not a reference: {0}")]
    NotAReference(String),
    #[error("rank mismatch: expected {expected}, got {actual}")]
    RankMismatch { expected: usize, actual: usize },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("incompatible enumeration: {0}")]
    EnumIncompatible(String),
    #[error("ordinal {ordinal} out of range for {cardinality} values")]
    OrdinalOutOfRange { ordinal: i64, cardinality: usize },
    #[error("unknown enumeration value {0}")]
    UnknownEnumValue(String),
    #[error("value {0} does not fit the narrower storage")]
    NarrowingOverflow(i64),
    #[error("unsupported layout: {0}")]
    LayoutUnsupported(String),
    #[error("binding error {major}.{minor}: {message}")]
    Binding {
        major: i32,
        minor: i32,
        message: String,
    },
    #[error("i/o: {0}")]
    Io(String),
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    #[allow(dead_code)] // carried for its Debug rendering
    trace: DynBacktraceError,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        error!(target: "sediment", "{}", kind);
        let trace = DynBacktraceError::from(kind.clone());
        Error { kind, trace }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::new(ErrorKind::Io(e.to_string()))
    }
}

pub fn err(kind: ErrorKind) -> Error {
    Error::new(kind)
}

#[test]
fn test_error_kind_is_matchable() {
    let e = err(ErrorKind::NoSuchObject("/x".into()));
    assert!(matches!(e.kind(), ErrorKind::NoSuchObject(p) if p == "/x"));
    assert_eq!(e.to_string(), "no object at /x");
}
