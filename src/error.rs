use thiserror::Error;

/// The one error kind raised at the database boundary.
///
/// Its `Display` output is the message printed after
/// `Database connection failure: ` when the demonstration aborts.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("unsupported connection target '{0}'")]
    InvalidTarget(String),

    #[error("cannot open {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("schema creation failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("{0}")]
    Sql(#[from] rusqlite::Error),

    #[error("batch entry {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("malformed call escape '{0}'")]
    CallSyntax(String),

    #[error("parameter index {0} is out of range")]
    ParameterIndex(usize),

    #[error("parameter {0} is not bound")]
    UnboundParameter(usize),

    #[error("output parameter {0} is not available")]
    OutputParameter(usize),

    #[error("parameter {index} holds {found}, expected {expected}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot write output: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;
