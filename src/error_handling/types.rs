use std::fmt;

use crate::service_management::validation::FieldErrorMap;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    ServicesEmpty(String),
    BadIPFormatting(String),
    BadPort(String),
    UnknownStorageBackend(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::ServicesEmpty(e) => write!(f, "Services configuration error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::BadPort(e) => write!(f, "Port error: {}", e),
            ConfigError::UnknownStorageBackend(e) => write!(f, "Unknown storage backend: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Outcomes of the service control surface that are not a success.
///
/// Each variant maps to exactly one HTTP status in the web interface.
#[derive(Debug)]
pub enum ServiceError {
    /// Required request fields are missing, keyed by field name.
    Validation(FieldErrorMap),
    /// Unknown service type for the given options, or options that do not parse.
    InvalidOptions(String),
    /// The registry could not resolve a location for the service.
    InvalidLocation(String),
    /// A service for the same provider and service type is already running.
    Conflict,
    NotFound,
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Validation(errors) => {
                write!(f, "Validation failed for: {}", errors.fields().join(", "))
            }
            ServiceError::InvalidOptions(e) => write!(f, "{}", e),
            ServiceError::InvalidLocation(e) => write!(f, "{}", e),
            ServiceError::Conflict => write!(f, "Service already running"),
            ServiceError::NotFound => write!(f, "Service not found"),
            ServiceError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Failures reported by a service registry implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    Location(String),
    AlreadyRunning,
    NotFound,
    UnsupportedServiceType(String),
    Failed(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Location(e) => write!(f, "Failed to detect service location: {}", e),
            RegistryError::AlreadyRunning => write!(f, "Service already running"),
            RegistryError::NotFound => write!(f, "Service not found"),
            RegistryError::UnsupportedServiceType(t) => {
                write!(f, "Unsupported service type: {}", t)
            }
            RegistryError::Failed(e) => write!(f, "Service failure: {}", e),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Location(_) => ServiceError::InvalidLocation(err.to_string()),
            RegistryError::AlreadyRunning => ServiceError::Conflict,
            RegistryError::NotFound => ServiceError::NotFound,
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Error raised by the native tunnel engine, carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// Reconnect was requested while no native session is held.
    NoActiveSession,
    CredentialError(String),
    ConfigurationError(String),
    Engine(EngineError),
    UnknownServiceType(String),
    AlreadyConnected,
    NotConnected,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::NoActiveSession => write!(f, "session not created yet"),
            ConnectionError::CredentialError(e) => write!(f, "Credential error: {}", e),
            ConnectionError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ConnectionError::Engine(e) => write!(f, "Engine error: {}", e),
            ConnectionError::UnknownServiceType(t) => {
                write!(f, "No connection factory for service type: {}", t)
            }
            ConnectionError::AlreadyConnected => write!(f, "Already connected"),
            ConnectionError::NotConnected => write!(f, "No active connection"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<EngineError> for ConnectionError {
    fn from(err: EngineError) -> Self {
        ConnectionError::Engine(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    NotFound,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::NotFound => write!(f, "Record not found"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    AlreadyCompleted(String),
    StorageError(StorageError),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::AlreadyCompleted(id) => {
                write!(f, "History of session {} is already completed", id)
            }
            HistoryError::StorageError(e) => write!(f, "History storage error: {}", e),
        }
    }
}

impl std::error::Error for HistoryError {}

impl From<StorageError> for HistoryError {
    fn from(err: StorageError) -> Self {
        HistoryError::StorageError(err)
    }
}

/// Failures of the identity selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    NoIdentity,
    UnlockFailed(String),
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::NoIdentity => write!(f, "No identity configured"),
            IdentityError::UnlockFailed(address) => {
                write!(f, "Failed to unlock identity {}", address)
            }
        }
    }
}

impl std::error::Error for IdentityError {}

#[derive(Debug)]
pub enum WebError {
    BadAddress(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BadAddress(e) => write!(f, "Invalid web server address: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    StorageError(StorageError),
    WebError(WebError),
    ServiceError(RegistryError),
    InitializationFailed(String),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::WebError(e) => write!(f, "Web error: {}", e),
            ControllerError::ServiceError(e) => write!(f, "Service error: {}", e),
            ControllerError::InitializationFailed(e) => write!(f, "Initialization failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::WebError(err)
    }
}
