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

//! Exit code calculation for a fleet run.
//!
//! - **FirstFailure** (default): the exit code of the first node, in node id
//!   order, that did not start cleanly. Preserves the script's own exit codes
//!   for diagnostics.
//! - **RequireAllSuccess**: 0 only if every node started cleanly, 1 otherwise.

use super::result_types::{FleetRun, NodeOutcome};

/// Strategy for calculating the process exit code from a fleet run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitCodeStrategy {
    /// Return the first non-zero per-node exit code.
    ///
    /// Start exit statuses are reported as-is. A transport failure counts
    /// as 255 and a cancelled node as 130.
    #[default]
    FirstFailure,

    /// Return 0 only if ALL nodes succeeded, 1 otherwise.
    RequireAllSuccess,
}

impl ExitCodeStrategy {
    pub fn calculate(&self, run: &FleetRun) -> i32 {
        match self {
            Self::FirstFailure => run
                .iter()
                .map(|(_, outcome)| outcome_exit_code(outcome))
                .find(|code| *code != 0)
                .unwrap_or(0),
            Self::RequireAllSuccess => {
                if run.all_succeeded() {
                    0
                } else {
                    1
                }
            }
        }
    }
}

fn outcome_exit_code(outcome: &NodeOutcome) -> i32 {
    match outcome {
        Ok(result) => result.exit_code(),
        Err(failure) => failure.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::executor::result_types::{ExecutionResult, NodeFailure};
    use crate::node::{Credentials, Node};
    use std::sync::Arc;

    fn result(id: &str, exit_status: u32) -> NodeOutcome {
        let node = Node::new(
            id,
            vec![format!("{id}.example.com")],
            Credentials::with_password("ubuntu", "pw"),
        );
        Ok(ExecutionResult {
            node: Arc::new(node),
            exit_status,
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    fn run_of(outcomes: Vec<(&str, NodeOutcome)>) -> FleetRun {
        let mut run = FleetRun::new();
        for (id, outcome) in outcomes {
            run.record(id.to_string(), outcome);
        }
        run
    }

    #[test]
    fn test_default_strategy_is_first_failure() {
        assert_eq!(ExitCodeStrategy::default(), ExitCodeStrategy::FirstFailure);
    }

    #[test]
    fn test_first_failure_all_success() {
        let run = run_of(vec![("a", result("a", 0)), ("b", result("b", 0))]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 0);
    }

    #[test]
    fn test_first_failure_preserves_exit_code() {
        let run = run_of(vec![
            ("a", result("a", 0)),
            ("b", result("b", 139)),
            ("c", result("c", 1)),
        ]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 139);
    }

    #[test]
    fn test_first_failure_uses_node_id_order() {
        let run = run_of(vec![("z", result("z", 3)), ("m", result("m", 7))]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 7);
    }

    #[test]
    fn test_first_failure_transport_and_cancel_codes() {
        let run = run_of(vec![
            ("a", result("a", 0)),
            (
                "b",
                Err(NodeFailure::Connect(TransportError::connect(
                    "10.0.0.2:22",
                    "refused",
                ))),
            ),
        ]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 255);

        let run = run_of(vec![("a", Err(NodeFailure::Cancelled))]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 130);
    }

    #[test]
    fn test_require_all_success() {
        let run = run_of(vec![("a", result("a", 0)), ("b", result("b", 0))]);
        assert_eq!(ExitCodeStrategy::RequireAllSuccess.calculate(&run), 0);

        let run = run_of(vec![("a", result("a", 0)), ("b", result("b", 139))]);
        assert_eq!(ExitCodeStrategy::RequireAllSuccess.calculate(&run), 1);

        let run = run_of(vec![("a", Err(NodeFailure::Aborted("boom".into())))]);
        assert_eq!(ExitCodeStrategy::RequireAllSuccess.calculate(&run), 1);
    }

    #[test]
    fn test_large_exit_status_is_clamped() {
        let run = run_of(vec![("a", result("a", u32::MAX))]);
        assert_eq!(ExitCodeStrategy::FirstFailure.calculate(&run), 1);
    }
}
