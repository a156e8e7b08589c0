//! Error types shared across the pipeline core

use thiserror::Error;

/// Errors raised while binding a plugin to its configuration node.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory option is absent from the plugin's configuration node.
    #[error("{plugin} is missing required option '{option}'")]
    MissingOption {
        /// Plugin type name
        plugin: String,
        /// Name of the missing option
        option: &'static str,
    },

    /// An option is present but its value cannot be used.
    #[error("{plugin} has invalid {option}: {message}")]
    InvalidOption {
        /// Plugin type name
        plugin: String,
        /// Option name
        option: &'static str,
        /// What went wrong
        message: String,
    },

    /// The plugin node itself is malformed (no usable `Type`, wrong shape).
    #[error("malformed plugin node: {0}")]
    MalformedNode(String),

    /// Failed to read or parse the configuration document.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Create a MissingOption error.
    pub fn missing_option(plugin: impl Into<String>, option: &'static str) -> Self {
        Self::MissingOption {
            plugin: plugin.into(),
            option,
        }
    }

    /// Create an InvalidOption error.
    pub fn invalid_option(
        plugin: impl Into<String>,
        option: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            plugin: plugin.into(),
            option,
            message: message.into(),
        }
    }
}

/// Errors raised by the plugin registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No constructor registered under the requested type name.
    #[error("unknown plugin type '{0}'")]
    UnknownType(String),
}

/// Errors raised by the buffered delimited reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The source reported end of input. Tailing callers treat this as
    /// "no new data yet" and retry.
    #[error("end of input")]
    Eof,

    /// Growing the backing buffer would exceed the configured limit.
    #[error("message buffer would exceed {limit} bytes")]
    Overflow {
        /// Configured maximum buffer size
        limit: usize,
    },

    /// The source failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReaderError {
    /// Whether this is the end-of-input marker rather than a failure.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, ReaderError::Eof)
    }
}

/// Errors raised by producers while shipping batches to their sink.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The sink could not be reached or opened.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// A write to the sink failed.
    #[error("write failed: {0}")]
    Write(String),

    /// I/O error from the sink.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProducerError {
    /// Create an Unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a Write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }
}
