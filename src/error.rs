#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("plugged cryptography failure")]
    PlugCryptoFailure,
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(String),
    #[error("key wrap failure: {0}")]
    KeyWrap(String),
    #[error("failed to decrypt")]
    DecryptionFailed,
    #[error("failed to parse as JWE")]
    JweParseError,
    #[error("bad SPK format")]
    BadSpkFormat,
    #[error("data not found")]
    DataNotFound,
    #[error("store: {0}")]
    Store(String),
    #[error("failed to resolve DID '{0}'")]
    DidResolveFailed(String),
    #[error("no outbound transport found for serviceEndpoint: {0}")]
    NoOutboundTransport(String),
    #[error("unrecognized msgType: {0}")]
    UnrecognizedMessageType(String),
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("no clients are registered to handle the message")]
    NoClients,
    #[error("protocol instance {0} is awaiting an action")]
    ActionPending(String),
    #[error("cannot execute no-op")]
    CannotExecuteNoOp,
    #[error("{0} is not implemented yet")]
    NotImplemented(String),
    #[error("action was rejected: {0}")]
    Rejected(String),
    #[error("router not registered")]
    RouterNotRegistered,
    #[error("router is already registered")]
    RouterAlreadyRegistered,
    #[error("connection not found")]
    ConnectionNotFound,
    #[error("timeout waiting for {0}")]
    Timeout(String),
    #[error("{0}")]
    Generic(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    RegexError(#[from] regex::Error),
    #[error(transparent)]
    StringConversionError(#[from] std::string::FromUtf8Error),
    #[error("base64 decoding failed: {0}")]
    Base64DecodeError(String),
    #[error("base58 decoding failed: {0}")]
    Base58DecodeError(String),
}

impl Error {
    /// Wraps the error with a description of the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through any [`Error::Context`] layers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// `true` for storage misses.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::DataNotFound)
    }

    /// `true` when the error originates from a user stopping an action.
    pub fn is_rejection(&self) -> bool {
        matches!(self.root(), Error::Rejected(_))
    }
}

/// Adds `.context(..)` to results carrying this crate's [`Error`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context(self, context: impl Into<String>) -> Result<T, Error> {
        self.map_err(|e| e.context(context))
    }
}
