use std::{
    error::Error as StdError,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};

use arrow::error::ArrowError;
use url::Url;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Arrow(ArrowError),
    Config(ConfigError),
    Contract(ContractViolation),
    Decode { partition: usize, source: ArrowError },
    Driver(DriverError),
    InvalidRequest(String),
    Schema(SchemaError),
    Stage(StageError),
}

impl From<ArrowError> for Error {
    fn from(error: ArrowError) -> Self {
        Error::Arrow(error)
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Error::Config(error)
    }
}

impl From<ContractViolation> for Error {
    fn from(error: ContractViolation) -> Self {
        Error::Contract(error)
    }
}

impl From<DriverError> for Error {
    fn from(error: DriverError) -> Self {
        Error::Driver(error)
    }
}

impl From<SchemaError> for Error {
    fn from(error: SchemaError) -> Self {
        Error::Schema(error)
    }
}

impl From<StageError> for Error {
    fn from(error: StageError) -> Self {
        Error::Stage(error)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        use Error::*;
        match self {
            Arrow(e) => e.fmt(f),
            Config(e) => e.fmt(f),
            Contract(e) => e.fmt(f),
            Decode { partition, source } => {
                write!(f, "Failed to decode staged partition {}: {}", partition, source)
            }
            Driver(e) => e.fmt(f),
            InvalidRequest(msg) => write!(f, "Invalid scan request: {}", msg),
            Schema(e) => e.fmt(f),
            Stage(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        use Error::*;
        match self {
            Arrow(e) => e.source(),
            Config(e) => e.source(),
            Contract(e) => e.source(),
            Decode { source, .. } => Some(source),
            Driver(e) => e.source(),
            InvalidRequest(_) => None,
            Schema(e) => e.source(),
            Stage(e) => e.source(),
        }
    }
}

impl Error {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    pub fn decode(partition: usize) -> impl FnOnce(ArrowError) -> Self {
        move |source| Error::Decode { partition, source }
    }
}

/// Warehouse driver failures pass through with their message intact so
/// operators see the remote diagnostics verbatim.
#[derive(Debug)]
pub struct DriverError(pub Box<dyn StdError + Send + Sync>);

impl DriverError {
    pub fn new(error: impl StdError + Send + Sync + 'static) -> Self {
        DriverError(Box::new(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        DriverError(message.into().into())
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        self.0.fmt(f)
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.0)
    }
}

/// A collaborator replied in a shape the coordinator cannot proceed from.
#[derive(Debug, thiserror::Error)]
pub enum ContractViolation {
    #[error("count query returned no row")]
    CountWithoutRow,
    #[error("driver cannot report a row count for the result set, parallelism is undecidable")]
    RowCountUnavailable,
    #[error("driver could not partition a non-empty result set of {rows} rows")]
    Unpartitionable { rows: u64 },
    #[error("count query returned a non-integer column: {datatype}")]
    CountNotInteger { datatype: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("staged file not found at {0}")]
    NotFound(Url),
    #[error("failed to list stage location {location}: {reason}")]
    List { location: Url, reason: String },
    #[error("stage location is not a valid base url: {0}")]
    Location(Url),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value {value:?} for option {key}")]
    InvalidValue { key: String, value: String },
    #[error("the bulk unload strategy requires a stage location")]
    MissingStageLocation,
    #[error("invalid stage location {0:?}: {1}")]
    StageUrl(String, #[source] url::ParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unsupported arrow type for warehouse column {column}: {datatype}")]
    UnsupportedType { column: String, datatype: String },
    #[error("unknown warehouse type annotation {annotation:?} on column {column}")]
    UnknownAnnotation { column: String, annotation: String },
}
