// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types and process exit codes.

use crate::config::ConfigError;
use std::fmt;

/// Result of a provider call.
pub type ProviderResult<T> = core::result::Result<T, ProviderError>;

/// Crate-level result.
pub type Result<T> = core::result::Result<T, Error>;

/// Return codes reported by a [`Provider`](crate::provider::Provider).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No (more) samples match the request. Ends a drain loop; not a failure.
    NoData,
    /// An argument or handle was invalid.
    BadParameter(String),
    /// The call is not allowed in the current entity state.
    PreconditionNotMet(String),
    /// The call is not allowed on this entity at all.
    IllegalOperation(String),
    /// The provider does not implement this capability.
    Unsupported(&'static str),
    /// The entity was already deleted.
    AlreadyDeleted(String),
    /// Any other provider failure.
    Error(String),
}

impl ProviderError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, ProviderError::NoData)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::NoData => write!(f, "no data"),
            ProviderError::BadParameter(msg) => write!(f, "bad parameter: {}", msg),
            ProviderError::PreconditionNotMet(msg) => write!(f, "precondition not met: {}", msg),
            ProviderError::IllegalOperation(msg) => write!(f, "illegal operation: {}", msg),
            ProviderError::Unsupported(what) => write!(f, "unsupported: {}", what),
            ProviderError::AlreadyDeleted(what) => write!(f, "already deleted: {}", what),
            ProviderError::Error(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Failure of a whole run, carrying enough context to choose an exit code.
#[derive(Debug)]
pub enum Error {
    /// Bad command line or failed validation.
    Config(ConfigError),
    /// An entity could not be created during initialization.
    Init {
        step: String,
        source: ProviderError,
    },
    /// A provider call failed while a loop was running.
    Runtime {
        operation: &'static str,
        source: ProviderError,
    },
}

impl Error {
    pub fn init(step: impl Into<String>, source: ProviderError) -> Self {
        Error::Init {
            step: step.into(),
            source,
        }
    }

    pub fn runtime(operation: &'static str, source: ProviderError) -> Self {
        Error::Runtime { operation, source }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Config(ConfigError::HelpRequested(_)) => ExitCode::Ok,
            Error::Config(_) => ExitCode::BadArguments,
            Error::Init { .. } => ExitCode::InitFailure,
            Error::Runtime { .. } => ExitCode::RuntimeFailure,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(err) => write!(f, "{}", err),
            Error::Init { step, source } => write!(f, "failed to create {}: {}", step, source),
            Error::Runtime { operation, source } => write!(f, "{} failed: {}", operation, source),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
            Error::Init { source, .. } | Error::Runtime { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Process exit status of `shape_main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok = 0,
    BadArguments = 1,
    InitFailure = 2,
    RuntimeFailure = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}
