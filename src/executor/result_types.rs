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

//! Result types for fleet execution.

use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::exit_strategy::ExitCodeStrategy;
use super::unit::PhaseError;
use crate::error::TransportError;
use crate::node::Node;

/// Exit code reported for a node whose session failed, matching ssh(1).
pub const TRANSPORT_FAILURE_EXIT_CODE: i32 = 255;

/// Exit code reported for a node that was cancelled before it started.
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Outcome of the start phase on one node.
///
/// A non-zero `exit_status` is data, not an error.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub node: Arc<Node>,
    pub exit_status: u32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    /// Exit status as a process exit code.
    ///
    /// Statuses that do not fit in a process exit code are reported as 1.
    pub fn exit_code(&self) -> i32 {
        match self.exit_status {
            0 => 0,
            status @ 1..=255 => status as i32,
            _ => 1,
        }
    }
}

/// Why a node has no [`ExecutionResult`].
#[derive(Debug, Error)]
pub enum NodeFailure {
    /// The session could not be opened
    #[error("connection failed: {0}")]
    Connect(#[source] TransportError),

    /// A transport failure during one of the phases
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// The run was cancelled before this node's phases began
    #[error("cancelled before execution started")]
    Cancelled,

    /// The node's task panicked or was aborted
    #[error("task aborted: {0}")]
    Aborted(String),
}

impl NodeFailure {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connect(_) | Self::Phase(_) => TRANSPORT_FAILURE_EXIT_CODE,
            Self::Cancelled => CANCELLED_EXIT_CODE,
            Self::Aborted(_) => 1,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type NodeOutcome = Result<ExecutionResult, NodeFailure>;

/// Per-node outcomes of one fleet run, keyed by node id.
#[derive(Debug, Default)]
pub struct FleetRun {
    outcomes: BTreeMap<String, NodeOutcome>,
}

impl FleetRun {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an outcome. Returns `false` if the node already had one.
    pub(crate) fn record(&mut self, node_id: String, outcome: NodeOutcome) -> bool {
        use std::collections::btree_map::Entry;
        match self.outcomes.entry(node_id) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub(crate) fn contains(&self, node_id: &str) -> bool {
        self.outcomes.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeOutcome> {
        self.outcomes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes ordered by node id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeOutcome)> {
        self.outcomes.iter().map(|(id, outcome)| (id.as_str(), outcome))
    }

    /// Nodes that completed all phases, whatever their start exit status.
    pub fn successes(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.outcomes.values().filter_map(|outcome| outcome.as_ref().ok())
    }

    /// Nodes that did not complete, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &NodeFailure)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            Ok(_) => None,
            Err(failure) => Some((id.as_str(), failure)),
        })
    }

    /// True when every node completed and its start command exited 0.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes
            .values()
            .all(|outcome| matches!(outcome, Ok(result) if result.is_success()))
    }

    pub fn exit_code(&self, strategy: ExitCodeStrategy) -> i32 {
        strategy.calculate(self)
    }

    /// Print one status line per node, in node id order.
    pub fn print_summary(&self, verbose: bool) {
        for (id, outcome) in self.iter() {
            match outcome {
                Ok(result) if result.is_success() => {
                    println!(
                        "{} {}: {}",
                        "●".green(),
                        result.node.to_string().bold(),
                        "started (exit 0)".green()
                    );
                    if verbose {
                        print_stream("stdout", &result.stdout);
                        print_stream("stderr", &result.stderr);
                    }
                }
                Ok(result) => {
                    println!(
                        "{} {}: {}",
                        "●".red(),
                        result.node.to_string().bold(),
                        format!("start exited with {}", result.exit_status).red()
                    );
                    print_stream("stdout", &result.stdout);
                    print_stream("stderr", &result.stderr);
                }
                Err(NodeFailure::Cancelled) => {
                    println!("{} {}: {}", "●".yellow(), id.bold(), "cancelled".yellow());
                }
                Err(failure) => {
                    println!("{} {}: {}", "●".red(), id.bold(), "failed".red());
                    // Show full error chain
                    for line in error_chain(failure) {
                        println!("    {}", line.dimmed());
                    }
                }
            }
        }

        let total = self.len();
        let completed = self.successes().filter(|r| r.is_success()).count();
        println!();
        if completed == total {
            println!("{}", format!("All {total} nodes started successfully").green());
        } else {
            println!(
                "{}",
                format!("{completed}/{total} nodes started successfully").yellow()
            );
        }
    }
}

fn print_stream(label: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        return;
    }
    println!("  {}", format!("{label}:").dimmed());
    for line in text.lines() {
        println!("    {line}");
    }
}

/// Render an error and its sources, outermost first.
fn error_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // thiserror #[from] variants repeat their source in Display
        if !lines.iter().any(|line| line.contains(&text)) {
            lines.push(format!("caused by: {text}"));
        }
        source = cause.source();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionPhase;
    use crate::node::Credentials;

    fn completed(id: &str, exit_status: u32) -> NodeOutcome {
        let node = Node::new(
            id,
            vec!["10.0.0.1".to_string()],
            Credentials::with_password("ubuntu", "pw"),
        );
        Ok(ExecutionResult {
            node: Arc::new(node),
            exit_status,
            stdout: "ok\n".to_string(),
            stderr: String::new(),
        })
    }

    #[test]
    fn test_record_rejects_duplicates() {
        let mut run = FleetRun::new();
        assert!(run.record("a".to_string(), completed("a", 0)));
        assert!(!run.record("a".to_string(), Err(NodeFailure::Cancelled)));
        assert_eq!(run.len(), 1);
        assert!(run.get("a").is_some_and(|o| o.is_ok()));
    }

    #[test]
    fn test_iter_is_sorted_by_node_id() {
        let mut run = FleetRun::new();
        run.record("web3".to_string(), completed("web3", 0));
        run.record("db1".to_string(), completed("db1", 0));
        run.record("web1".to_string(), Err(NodeFailure::Cancelled));

        let ids: Vec<_> = run.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["db1", "web1", "web3"]);
    }

    #[test]
    fn test_successes_and_failures() {
        let mut run = FleetRun::new();
        run.record("a".to_string(), completed("a", 0));
        run.record("b".to_string(), completed("b", 2));
        run.record(
            "c".to_string(),
            Err(NodeFailure::Phase(PhaseError {
                phase: ExecutionPhase::Uploading,
                source: TransportError::upload("s.sh", "disk full"),
            })),
        );

        assert_eq!(run.successes().count(), 2);
        let failures: Vec<_> = run.failures().map(|(id, _)| id).collect();
        assert_eq!(failures, vec!["c"]);
        assert!(!run.all_succeeded());
    }

    #[test]
    fn test_all_succeeded_requires_zero_exit() {
        let mut run = FleetRun::new();
        run.record("a".to_string(), completed("a", 0));
        assert!(run.all_succeeded());
        run.record("b".to_string(), completed("b", 1));
        assert!(!run.all_succeeded());
    }

    #[test]
    fn test_error_chain_includes_phase_and_cause() {
        let failure = NodeFailure::Phase(PhaseError {
            phase: ExecutionPhase::Initializing,
            source: TransportError::ChannelClosed,
        });
        let lines = error_chain(&failure);
        assert!(lines[0].contains("initializing"));
        assert!(lines.iter().any(|l| l.contains("channel closed")));
    }

    #[test]
    fn test_failure_exit_codes() {
        assert_eq!(NodeFailure::Cancelled.exit_code(), CANCELLED_EXIT_CODE);
        assert_eq!(
            NodeFailure::Connect(TransportError::SessionClosed).exit_code(),
            TRANSPORT_FAILURE_EXIT_CODE
        );
        assert_eq!(NodeFailure::Aborted("x".into()).exit_code(), 1);
    }
}
