// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the bootstrap engine.
//!
//! # Error Categories
//!
//! - [`ValidationError`]: malformed input, raised before any network activity
//! - [`TransportError`]: failures at the remote shell session boundary
//!
//! A non-zero exit status from a remote command is not an error. It is
//! reported as data on [`crate::executor::ExecutionResult`].
//!
//! No variant here ever carries a command line. Commands may contain a
//! credential secret, so callers log the masked form separately.

use std::io;
use thiserror::Error;

/// Error type for input validation failures.
///
/// # Examples
///
/// ```
/// use fleetboot::error::ValidationError;
///
/// let err = ValidationError::new("script name", "contains a path separator");
/// assert!(err.to_string().contains("script name"));
/// ```
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Validation error for '{field}': {message}")]
pub struct ValidationError {
    /// The field or input that failed validation
    pub field: String,
    /// Description of why validation failed
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an error for an empty field.
    pub fn empty(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} cannot be empty"),
            field,
        }
    }

    /// Create an error for a field that is too long.
    pub fn too_long(field: impl Into<String>, max_length: usize) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} exceeds maximum length of {max_length}"),
            field,
        }
    }

    /// Create an error for invalid characters.
    pub fn invalid_characters(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} contains invalid characters"),
            field,
        }
    }
}

/// Failure originating from the remote shell session mechanism.
///
/// These are never retried by the engine. The fleet executor converts them
/// into per-node failure entries.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a connection to any address of the node
    #[error("could not connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// Connection attempt exceeded the configured timeout
    #[error("connection to {target} timed out after {seconds}s")]
    Timeout { target: String, seconds: u64 },

    /// Server rejected the supplied credentials
    #[error("authentication failed for user '{identity}': {reason}")]
    Authentication { identity: String, reason: String },

    /// Host key did not pass the configured verification policy
    #[error("host key verification failed for {target}")]
    HostKeyRejected { target: String },

    /// Writing the payload to the remote path failed
    #[error("upload to '{path}' failed: {reason}")]
    Upload { path: String, reason: String },

    /// Running a remote command failed before an exit status was reported
    #[error("remote command failed: {reason}")]
    Exec { reason: String },

    /// Channel closed without delivering an exit status
    #[error("channel closed before the remote command reported an exit status")]
    ChannelClosed,

    /// Session was already closed when an operation was attempted
    #[error("session is closed")]
    SessionClosed,

    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    pub fn connect(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upload(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Upload {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn exec(reason: impl ToString) -> Self {
        Self::Exec {
            reason: reason.to_string(),
        }
    }
}
