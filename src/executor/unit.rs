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

//! Per-node script execution.
//!
//! A unit drives one node through upload, init and start on a session it
//! owns exclusively. The init exit status is logged and otherwise ignored;
//! the start response becomes the node's [`ExecutionResult`].

use std::sync::Arc;
use thiserror::Error;

use super::phase::ExecutionPhase;
use super::privilege::resolve_start_command;
use super::result_types::ExecutionResult;
use crate::error::TransportError;
use crate::node::Node;
use crate::script::ScriptSpec;
use crate::ssh::RemoteShell;

/// Transport failure raised while a unit was in `phase`.
#[derive(Debug, Error)]
#[error("transport failure while {phase}: {source}")]
pub struct PhaseError {
    pub phase: ExecutionPhase,
    pub source: TransportError,
}

/// Executes one script on one node.
pub struct ScriptExecutionUnit {
    node: Arc<Node>,
    script: Arc<ScriptSpec>,
    run_as_root: bool,
    session: Box<dyn RemoteShell>,
    phase: ExecutionPhase,
}

impl ScriptExecutionUnit {
    pub fn new(
        node: Arc<Node>,
        script: Arc<ScriptSpec>,
        run_as_root: bool,
        session: Box<dyn RemoteShell>,
    ) -> Self {
        Self {
            node,
            script,
            run_as_root,
            session,
            phase: ExecutionPhase::Uploading,
        }
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.phase
    }

    /// Run all phases in order and release the session.
    ///
    /// Transport failures are not retried. A close failure after the phases
    /// have finished is only logged.
    pub async fn execute(mut self) -> Result<ExecutionResult, PhaseError> {
        let outcome = self.run_phases().await;

        if let Err(e) = self.session.close().await {
            tracing::debug!(node = %self.node.id, "Failed to close session: {}", e);
        }

        outcome
    }

    async fn run_phases(&mut self) -> Result<ExecutionResult, PhaseError> {
        let script = Arc::clone(&self.script);
        let name = script.name();

        tracing::debug!(node = %self.node.id, "Uploading {} ({} bytes)", name, script.body().len());
        let uploaded = self.session.put(name, script.body().as_bytes()).await;
        self.check(uploaded)?;

        self.enter(ExecutionPhase::Initializing);
        let chmod = self.session.exec(&format!("chmod 755 {name}")).await;
        let chmod = self.check(chmod)?;
        if !chmod.is_success() {
            tracing::debug!(node = %self.node.id, "chmod exited with {}", chmod.exit_status);
        }
        let init = self.session.exec(&format!("./{name} init")).await;
        let init = self.check(init)?;
        tracing::info!(node = %self.node.id, "<< initialized({})", init.exit_status);

        let start = resolve_start_command(&self.node.credentials, name, self.run_as_root);
        self.enter(start.phase());
        tracing::info!(
            node = %self.node.id,
            ">> running [{}] as {}@{}",
            start.masked(),
            self.node.credentials.identity,
            self.node.primary_address().unwrap_or("-")
        );
        let response = self.session.exec(start.command()).await;
        let response = self.check(response)?;
        tracing::info!(node = %self.node.id, "<< start({})", response.exit_status);

        self.enter(ExecutionPhase::Completed);
        Ok(ExecutionResult {
            node: Arc::clone(&self.node),
            exit_status: response.exit_status,
            stdout: response.stdout,
            stderr: response.stderr,
        })
    }

    fn enter(&mut self, next: ExecutionPhase) {
        tracing::trace!(node = %self.node.id, "{} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Move to `Failed` on a transport error, recording the active phase.
    fn check<T>(&mut self, result: Result<T, TransportError>) -> Result<T, PhaseError> {
        result.map_err(|source| {
            let phase = self.phase;
            tracing::debug!(node = %self.node.id, "Transport failure while {}: {}", phase, source);
            self.phase = ExecutionPhase::Failed;
            PhaseError { phase, source }
        })
    }
}
