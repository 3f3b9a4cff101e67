//! Error types for the weft runtime

use std::path::PathBuf;
use thiserror::Error;
use weft_core::WeftError;
use weft_types::{MethodName, ObjectId, TypeName, Visibility};

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A type with this name already exists
    #[error("Type {0} is already defined")]
    DuplicateType(TypeName),

    /// Type not found
    #[error("Type {0} not found")]
    UnknownType(TypeName),

    /// Object not found
    #[error("Object {0} not found")]
    UnknownObject(ObjectId),

    /// No method with this name for the receiver
    #[error("Undefined method `{method}' for {receiver}")]
    UnknownMethod { receiver: String, method: MethodName },

    /// A non-public method was invoked from outside
    #[error("{visibility} method `{method}' called for {receiver}")]
    NotPublic {
        receiver: String,
        method: MethodName,
        visibility: Visibility,
    },

    /// A positional argument the method reads was not passed
    #[error("Missing argument {index} for `{method}'")]
    MissingArgument { method: MethodName, index: usize },

    /// The method yields but the caller passed no callback
    #[error("No callback given to `{method}'")]
    NoCallback { method: MethodName },

    /// Object state was accessed from a class method
    #[error("`{method}' needs an object receiver, got {receiver}")]
    NotAnObject { receiver: String, method: MethodName },

    /// A chain outlived the runtime that installed it
    #[error("Runtime has been dropped")]
    Detached,

    /// Malformed catalog manifest
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Manifest file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Pointcut, aspect or weaving errors from the core
    #[error(transparent)]
    Weft(#[from] WeftError),
}

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;
