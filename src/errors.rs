// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera access errors
    Camera(CameraError),
    /// Frame capture and encoding errors
    Capture(CaptureError),
    /// Remote analysis errors
    Analysis(AnalysisError),
    /// History persistence errors
    Persistence(PersistenceError),
    /// Configuration errors
    Config(ConfigError),
    /// Generic error with message
    Other(String),
}

/// Camera access errors (permission, hardware)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Access to the device was refused
    PermissionDenied(String),
    /// Camera is busy or in use by another process
    Busy,
    /// Camera initialization failed
    InitializationFailed(String),
    /// Camera disconnected during operation
    Disconnected,
    /// Backend error
    Backend(String),
}

/// Errors while turning the live preview into a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Frame buffer does not match its declared geometry
    InvalidFrame(String),
    /// JPEG encoding failed
    EncodingFailed(String),
}

/// Errors raised by an analysis endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Endpoint answered with a non-success HTTP status
    Status { endpoint: String, status: u16 },
    /// Endpoint could not be reached (connection, timeout, TLS)
    Transport { endpoint: String, message: String },
    /// Endpoint answered 2xx with a body that is not JSON
    InvalidResponse { endpoint: String, message: String },
}

/// History service errors; never surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Service answered with a non-success HTTP status
    Status(u16),
    /// Service could not be reached
    Transport(String),
}

/// Configuration file errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No configuration directory on this system
    NoConfigDir,
    /// Reading or writing the file failed
    Io(String),
    /// File contents are not a valid configuration
    Parse(String),
}

impl AnalysisError {
    /// Name of the endpoint that produced this error
    pub fn endpoint(&self) -> &str {
        match self {
            AnalysisError::Status { endpoint, .. }
            | AnalysisError::Transport { endpoint, .. }
            | AnalysisError::InvalidResponse { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Capture(e) => write!(f, "Capture error: {}", e),
            AppError::Analysis(e) => write!(f, "Analysis error: {}", e),
            AppError::Persistence(e) => write!(f, "History error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::Busy => write!(f, "Camera is busy"),
            CameraError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            CaptureError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Status { endpoint, status } => {
                write!(f, "{} endpoint returned HTTP {}", endpoint, status)
            }
            AnalysisError::Transport { endpoint, message } => {
                write!(f, "{} endpoint unreachable: {}", endpoint, message)
            }
            AnalysisError::InvalidResponse { endpoint, message } => {
                write!(f, "{} endpoint sent an invalid response: {}", endpoint, message)
            }
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Status(status) => write!(f, "History service returned HTTP {}", status),
            PersistenceError::Transport(msg) => write!(f, "History service unreachable: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigDir => write!(f, "No configuration directory available"),
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for CaptureError {}
impl std::error::Error for AnalysisError {}
impl std::error::Error for PersistenceError {}
impl std::error::Error for ConfigError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<CaptureError> for AppError {
    fn from(err: CaptureError) -> Self {
        AppError::Capture(err)
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        AppError::Analysis(err)
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::Persistence(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => CameraError::NoCameraFound,
            _ if err.raw_os_error() == Some(16) => CameraError::Busy, // EBUSY
            _ => CameraError::Backend(err.to_string()),
        }
    }
}
