use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed inbound message on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("no account is available to sign in")]
    NoAccount,
    #[error("not signed in")]
    NotSignedIn,
}
