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

//! Remote shell session contract.
//!
//! The execution engine talks to a node only through [`RemoteShell`], a
//! narrow two-operation contract (`put`, `exec`). Sessions are created by a
//! [`ShellConnector`], one per node, and are never shared.
//!
//! # Implementing a connector
//!
//! ```ignore
//! use async_trait::async_trait;
//! use fleetboot::error::TransportError;
//! use fleetboot::node::Node;
//! use fleetboot::ssh::{ExecResponse, RemoteShell, ShellConnector};
//!
//! struct LocalConnector;
//!
//! #[async_trait]
//! impl ShellConnector for LocalConnector {
//!     async fn open(&self, node: &Node) -> Result<Box<dyn RemoteShell>, TransportError> {
//!         // Establish the session for `node`
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::TransportError;
use crate::node::Node;

/// Result of one remote command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResponse {
    pub exit_status: u32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResponse {
    pub fn new(exit_status: u32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Check if the command execution was successful (exit status 0)
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }
}

/// A connected shell session on one node.
#[async_trait]
pub trait RemoteShell: Send {
    /// Write `payload` to `path` on the remote side, replacing any existing file.
    async fn put(&mut self, path: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Run a literal command and wait for its exit status.
    ///
    /// Make sure the command doesn't read from stdin and exits in bounded time.
    /// Every invocation is a new shell context.
    async fn exec(&mut self, command: &str) -> Result<ExecResponse, TransportError>;

    /// Release the session. The default implementation does nothing.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Factory for [`RemoteShell`] sessions.
///
/// Implementations must be `Send + Sync` so one connector can serve every
/// task of a fleet run.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn open(&self, node: &Node) -> Result<Box<dyn RemoteShell>, TransportError>;
}
