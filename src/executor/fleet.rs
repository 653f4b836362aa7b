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

//! Concurrent execution of one script across a set of nodes.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::result_types::{FleetRun, NodeFailure, NodeOutcome};
use super::unit::ScriptExecutionUnit;
use crate::error::ValidationError;
use crate::node::Node;
use crate::script::ScriptSpec;
use crate::security::validate_node_set;
use crate::ssh::ShellConnector;

/// Runs a script on every node of a fleet.
///
/// Each node gets its own task and its own session. A failure on one node
/// is recorded in the [`FleetRun`] and never affects the others.
pub struct FleetExecutor {
    connector: Arc<dyn ShellConnector>,
    max_parallel: usize,
    cancel: CancellationToken,
}

impl FleetExecutor {
    /// Create an executor with no concurrency bound.
    pub fn new(connector: Arc<dyn ShellConnector>) -> Self {
        Self {
            connector,
            max_parallel: Semaphore::MAX_PERMITS,
            cancel: CancellationToken::new(),
        }
    }

    /// Bound the number of sessions in flight at once.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.min(Semaphore::MAX_PERMITS);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels runs of this executor when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Execute `script` on all `nodes` concurrently.
    ///
    /// Input is validated before any session is opened. Once execution
    /// begins this returns one outcome per node and never fails as a whole.
    pub async fn run(
        &self,
        nodes: Vec<Node>,
        script: ScriptSpec,
        run_as_root: bool,
    ) -> Result<FleetRun, ValidationError> {
        if self.max_parallel == 0 {
            return Err(ValidationError::new(
                "max_parallel",
                "parallelism must be at least 1",
            ));
        }
        validate_node_set(&nodes)?;

        tracing::info!(
            "Running {} on {} nodes (run as root: {})",
            script.name(),
            nodes.len(),
            run_as_root
        );

        let script = Arc::new(script);
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let (tx, mut rx) = mpsc::channel::<(String, NodeOutcome)>(nodes.len());

        let handles: Vec<_> = nodes
            .into_iter()
            .map(|node| {
                let node = Arc::new(node);
                let node_id = node.id.clone();
                let task = node_task(
                    node,
                    Arc::clone(&script),
                    run_as_root,
                    Arc::clone(&self.connector),
                    Arc::clone(&semaphore),
                    self.cancel.clone(),
                    tx.clone(),
                );
                (node_id, tokio::spawn(task))
            })
            .collect();
        drop(tx);

        // Senders are dropped when tasks finish, including by panic
        let mut run = FleetRun::new();
        while let Some((node_id, outcome)) = rx.recv().await {
            if !run.record(node_id.clone(), outcome) {
                tracing::warn!("Ignoring duplicate outcome for node {}", node_id);
            }
        }

        let joined = join_all(
            handles
                .into_iter()
                .map(|(node_id, handle)| async move { (node_id, handle.await) }),
        )
        .await;

        for (node_id, result) in joined {
            if let Err(e) = result {
                let reason = describe_join_error(e);
                tracing::error!("Task for node {} aborted: {}", node_id, reason);
                if !run.contains(&node_id) {
                    run.record(node_id, Err(NodeFailure::Aborted(reason)));
                }
            }
        }

        let failed = run.failures().count();
        if failed > 0 {
            tracing::warn!("{} of {} nodes did not complete", failed, run.len());
        }

        Ok(run)
    }
}

async fn node_task(
    node: Arc<Node>,
    script: Arc<ScriptSpec>,
    run_as_root: bool,
    connector: Arc<dyn ShellConnector>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    tx: mpsc::Sender<(String, NodeOutcome)>,
) {
    let node_id = node.id.clone();
    let outcome = execute_on_node(
        node,
        script,
        run_as_root,
        connector.as_ref(),
        &semaphore,
        &cancel,
    )
    .await;
    if tx.send((node_id.clone(), outcome)).await.is_err() {
        tracing::debug!("Result collector gone before node {} reported", node_id);
    }
}

async fn execute_on_node(
    node: Arc<Node>,
    script: Arc<ScriptSpec>,
    run_as_root: bool,
    connector: &dyn ShellConnector,
    semaphore: &Semaphore,
    cancel: &CancellationToken,
) -> NodeOutcome {
    // Held until the unit reaches a terminal state
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(NodeFailure::Cancelled),
        permit = semaphore.acquire() => match permit {
            Ok(permit) => permit,
            Err(e) => return Err(NodeFailure::Aborted(format!("semaphore closed: {e}"))),
        },
    };

    let mut session = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(NodeFailure::Cancelled),
        opened = connector.open(&node) => opened.map_err(NodeFailure::Connect)?,
    };

    if cancel.is_cancelled() {
        if let Err(e) = session.close().await {
            tracing::debug!(node = %node.id, "Failed to close session: {}", e);
        }
        return Err(NodeFailure::Cancelled);
    }

    ScriptExecutionUnit::new(node, script, run_as_root, session)
        .execute()
        .await
        .map_err(NodeFailure::from)
}

fn describe_join_error(e: JoinError) -> String {
    if !e.is_panic() {
        return format!("task failed: {e}");
    }
    let payload = e.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("task panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("task panicked: {msg}")
    } else {
        "task panicked".to_string()
    }
}
