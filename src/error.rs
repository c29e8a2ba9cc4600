use crate::dns::ParseError;
use crate::dynamic_update::UpdateMode;
use crate::dynamic_update::tsig::TsigError;
use crate::record::Record;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid nameserver address: {0}")]
    InvalidNameserver(String),

    #[error("Invalid TSIG algorithm: {0}")]
    InvalidTsigAlgorithm(String),

    #[error("Invalid TSIG secret: {0}")]
    InvalidTsigSecret(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid transport protocol: {0}")]
    InvalidProtocol(String),

    #[error("Invalid owner scope: {0}")]
    InvalidOwnerScope(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rfc2136Error {
    #[error("unsupported record type {0}")]
    UnsupportedRecordType(String),

    #[error("invalid {rtype} record value {value:?}: {reason}")]
    InvalidRecordValue {
        rtype: String,
        value: String,
        reason: String,
    },

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("server replied {rcode}")]
    ServerRejected { rcode: String },

    #[error("nameserver address {0:?} left as given")]
    AddressNormalizationSkipped(String),

    #[error("TSIG error: {0}")]
    Tsig(#[from] TsigError),

    #[error("DNS message error: {0}")]
    Codec(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to {operation} record {name} {rtype}: {source}")]
    Update {
        operation: UpdateMode,
        name: String,
        rtype: String,
        /// Records applied before the failure
        applied: Vec<Record>,
        #[source]
        source: Box<Rfc2136Error>,
    },
}

impl Rfc2136Error {
    /// Records that were successfully applied before a batch operation failed
    pub fn applied(&self) -> &[Record] {
        match self {
            Rfc2136Error::Update { applied, .. } => applied,
            _ => &[],
        }
    }

    /// The underlying cause, looking through the per-record annotation
    pub fn root(&self) -> &Rfc2136Error {
        match self {
            Rfc2136Error::Update { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<ParseError> for Rfc2136Error {
    fn from(err: ParseError) -> Self {
        Rfc2136Error::Codec(err.to_string())
    }
}

impl From<std::io::Error> for Rfc2136Error {
    fn from(err: std::io::Error) -> Self {
        Rfc2136Error::NetworkFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Rfc2136Error>;
